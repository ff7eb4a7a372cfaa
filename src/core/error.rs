use thiserror::Error;

/// Failure kinds raised inside the gateway core.
///
/// None of these is fatal to the process: transport faults are logged and the
/// drain loop moves on, decode and topic errors drop a single event.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A device call failed (timeout, CRC mismatch, exception response, ...).
    #[error("transport fault on {device} during {operation}: {message}")]
    Transport {
        device: String,
        operation: &'static str,
        message: String,
    },

    /// Coil addresses rejected before reaching the device.
    #[error("invalid coil list for {device}: {reason}")]
    InvalidCoils { device: String, reason: String },

    /// Inbound payload does not match the action's schema.
    #[error("malformed '{action}' payload: {message}")]
    Decode { action: String, message: String },

    /// Topic does not have the `<root>/<device>/<action>` shape.
    #[error("unroutable topic '{topic}'")]
    Topic { topic: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GatewayError {
    pub(crate) fn transport(
        device: &str,
        operation: &'static str,
        err: &anyhow::Error,
    ) -> Self {
        Self::Transport {
            device: device.to_string(),
            operation,
            message: format!("{err:#}"),
        }
    }
}
