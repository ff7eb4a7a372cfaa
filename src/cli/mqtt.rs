/// MQTT event source: feeds every publish under `<topic_root>/#` to the dispatcher.
use anyhow::{anyhow, Context, Result};
use rumqttc::{
    Client, Connection, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use super::config::MqttConfig;
use crate::core::{Dispatch, Dispatcher};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub struct MqttSource {
    client: Client,
    connection: Connection,
    subscription: String,
    running: Arc<AtomicBool>,
}

/// Stops a running [`MqttSource`] from another thread (signal handler).
#[derive(Clone)]
pub struct MqttControl {
    client: Client,
    running: Arc<AtomicBool>,
}

impl MqttControl {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Err(e) = self.client.try_disconnect() {
            log::debug!("MQTT disconnect request not sent: {e}");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn tls_transport(tls: &super::config::TlsConfig) -> Result<Transport> {
    let ca = std::fs::read(&tls.ca_cert)
        .with_context(|| format!("Failed to read CA certificate {}", tls.ca_cert.display()))?;
    let client_auth = match &tls.client_identity {
        Some(path) => {
            let der = std::fs::read(path)
                .with_context(|| format!("Failed to read client identity {}", path.display()))?;
            Some((der, tls.identity_password.clone()))
        }
        None => None,
    };
    Ok(Transport::tls_with_config(TlsConfiguration::SimpleNative {
        ca,
        client_auth,
    }))
}

impl MqttSource {
    /// Prepare the client; the network connection is made lazily by [`MqttSource::run`].
    pub fn connect(config: &MqttConfig) -> Result<Self> {
        let (host, port, secure) = config.endpoint()?;
        let client_id = config.client_id();

        let mut options = MqttOptions::new(&client_id, &host, port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        match (&config.tls, secure) {
            (Some(tls), _) => {
                options.set_transport(tls_transport(tls)?);
            }
            (None, true) => {
                return Err(anyhow!(
                    "Broker URL '{}' is TLS but no tls section is configured",
                    config.broker_url
                ))
            }
            (None, false) => {}
        }

        log::info!("MQTT: connecting to {host}:{port} as {client_id}");
        let (client, connection) = Client::new(options, 10);

        Ok(Self {
            client,
            connection,
            subscription: format!("{}/#", config.topic_root),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn control(&self) -> MqttControl {
        MqttControl {
            client: self.client.clone(),
            running: Arc::clone(&self.running),
        }
    }

    /// Deliver events until [`MqttControl::stop`] is called.
    pub fn run(mut self, dispatcher: &Dispatcher) {
        for notification in self.connection.iter() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            match notification {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // Subscriptions do not survive a clean-session reconnect.
                    match self.client.subscribe(&self.subscription, QoS::AtMostOnce) {
                        Ok(()) => log::info!("MQTT: subscribed to '{}'", self.subscription),
                        Err(e) => log::error!("Failed to subscribe to MQTT topic: {e}"),
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Dispatch::Rejected(err) =
                        dispatcher.dispatch(&publish.topic, &publish.payload)
                    {
                        log::debug!("MQTT message on {} rejected: {err}", publish.topic);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    log::error!("MQTT connection error: {e}; retrying");
                    std::thread::sleep(RECONNECT_DELAY);
                }
            }
        }
        log::info!("MQTT: event loop stopped");
    }
}
