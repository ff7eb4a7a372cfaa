use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf};

use crate::core::GatewayError;

/// Largest coil bank a single FC0F request can rewrite.
pub const MAX_COILS: u16 = 1968;

/// TLS material for the broker connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM encoded CA certificate used to verify the broker
    pub ca_cert: PathBuf,
    /// PKCS#12 bundle holding the client certificate and key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_identity: Option<PathBuf>,
    /// Password protecting the PKCS#12 bundle
    #[serde(default)]
    pub identity_password: String,
}

/// Broker connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// `mqtt://host[:port]` or `mqtts://host[:port]`
    pub broker_url: String,
    /// Client id; a random `gateway_<uuid>` is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// First topic segment; the gateway subscribes to `<topic_root>/#`
    #[serde(default = "default_topic_root")]
    pub topic_root: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

/// One field device on a serial line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Second topic segment addressing this device, e.g. `plc1`
    pub id: String,
    pub port_name: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// MODBUS station (slave) address
    pub station_id: u8,
    #[serde(default = "default_num_coils")]
    pub num_coils: u16,
    /// Transport timeout per request, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_topic_root() -> String {
    "test".to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_num_coils() -> u16 {
    4
}

fn default_timeout_ms() -> u64 {
    1000
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub mqtt: MqttConfig,
    pub devices: Vec<DeviceConfig>,
}

impl MqttConfig {
    /// Resolve host and port from the broker URL.
    pub fn endpoint(&self) -> Result<(String, u16, bool)> {
        let url = url::Url::parse(&self.broker_url)
            .map_err(|e| anyhow!("Invalid MQTT URL '{}': {}", self.broker_url, e))?;
        let secure = match url.scheme() {
            "mqtt" | "tcp" => false,
            "mqtts" | "ssl" => true,
            other => return Err(anyhow!("Unsupported MQTT scheme '{other}'")),
        };
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("MQTT URL '{}' has no host", self.broker_url))?
            .to_string();
        let port = url.port().unwrap_or(if secure { 8883 } else { 1883 });
        Ok((host, port, secure))
    }

    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("gateway_{}", uuid::Uuid::new_v4()))
    }
}

impl GatewayConfig {
    /// Parse configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Read and validate configuration from a file
    pub fn from_file(file_path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read config file {file_path}"))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file {file_path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn device(&self, id: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|device| device.id == id)
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        let invalid = |msg: String| GatewayError::Config(msg);

        if self.mqtt.topic_root.is_empty() {
            return Err(invalid("mqtt.topic_root must not be empty".to_string()));
        }
        if self.devices.is_empty() {
            return Err(invalid("at least one device is required".to_string()));
        }

        let mut line_baud: HashMap<&str, u32> = HashMap::new();
        let mut ids = Vec::new();
        for device in &self.devices {
            if device.id.is_empty() || device.id.contains(['/', '+', '#']) {
                return Err(invalid(format!(
                    "device id '{}' must be non-empty and free of '/', '+', '#'",
                    device.id
                )));
            }
            if ids.contains(&device.id.as_str()) {
                return Err(invalid(format!("duplicate device id '{}'", device.id)));
            }
            ids.push(device.id.as_str());

            if !(1..=MAX_COILS).contains(&device.num_coils) {
                return Err(invalid(format!(
                    "device '{}': num_coils {} outside 1..={MAX_COILS}",
                    device.id, device.num_coils
                )));
            }
            if !(1..=247).contains(&device.station_id) {
                return Err(invalid(format!(
                    "device '{}': station_id {} outside 1..=247",
                    device.id, device.station_id
                )));
            }

            let baud = *line_baud
                .entry(device.port_name.as_str())
                .or_insert(device.baud_rate);
            if baud != device.baud_rate {
                return Err(invalid(format!(
                    "device '{}': port {} already configured at {baud} baud",
                    device.id, device.port_name
                )));
            }
        }
        Ok(())
    }
}
