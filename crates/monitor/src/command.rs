//! Envio de um comando a um dispositivo (`iot/devices/<id>/commands`).

use relay_core::config::MonitorConfig;
use relay_core::protocol::{Command, ProtocolError, command_topic, encode_command};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Tempo máximo para conectar e receber o PUBACK.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("device_id inválido: '{0}'")]
    InvalidDevice(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("falha no broker: {0}")]
    Broker(String),
    #[error("sem confirmação do broker em {}s", COMMAND_TIMEOUT.as_secs())]
    Timeout,
}

/// Publica o comando com QoS 1 e espera a confirmação do broker.
pub fn send_command(
    config: &MonitorConfig,
    device_id: &str,
    command: Command,
) -> Result<(), CommandError> {
    if device_id.is_empty() || device_id.contains(['/', '+', '#']) {
        return Err(CommandError::InvalidDevice(device_id.to_string()));
    }
    let payload = encode_command(command)?;
    let topic = command_topic(device_id);

    let client_id = format!("{}_cmd", config.client_id);
    let mut options = MqttOptions::new(client_id, &config.broker_host, config.broker_port);
    options.set_keep_alive(Duration::from_secs(10));
    let (client, mut connection) = Client::new(options, 10);

    client
        .publish(&topic, QoS::AtLeastOnce, false, payload)
        .map_err(|e| CommandError::Broker(e.to_string()))?;

    let deadline = Instant::now() + COMMAND_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(CommandError::Timeout);
        }
        match connection.recv_timeout(remaining) {
            Ok(Ok(Event::Incoming(Packet::PubAck(_)))) => {
                info!("Comando '{}' enviado para {topic}", command.as_str());
                let _ = client.disconnect();
                return Ok(());
            }
            Ok(Ok(event)) => debug!("MQTT: {event:?}"),
            Ok(Err(e)) => return Err(CommandError::Broker(e.to_string())),
            Err(_) => return Err(CommandError::Timeout),
        }
    }
}
