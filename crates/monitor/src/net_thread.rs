//! Thread de rede que assina a telemetria no broker e envia leituras para o
//! loop principal via channel.

use crossbeam_channel::{Receiver, Sender, bounded};
use relay_core::config::MonitorConfig;
use relay_core::protocol::{
    TELEMETRY_WILDCARD, decode_telemetry, device_id_from_topic, telemetry_topic,
};
use relay_core::types::Reading;
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Mensagem enviada da thread de rede para o loop principal.
#[derive(Debug, Clone)]
pub struct MonitorMessage {
    pub device_id: String,
    pub reading: Reading,
    pub raw_size: usize,
}

/// Inicia a thread de assinatura. Retorna o receiver do channel.
pub fn spawn_subscriber_thread(config: MonitorConfig) -> Receiver<MonitorMessage> {
    let (tx, rx) = bounded::<MonitorMessage>(64); // Buffer de 64 mensagens

    std::thread::Builder::new()
        .name("mqtt-subscriber".into())
        .spawn(move || subscriber_loop(&tx, &config))
        .expect("Falha ao criar thread de rede");

    rx
}

fn subscriber_loop(tx: &Sender<MonitorMessage>, config: &MonitorConfig) {
    let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
    options.set_keep_alive(Duration::from_secs(30));
    let (client, mut connection) = Client::new(options, 10);

    info!(
        "Monitor assinando {TELEMETRY_WILDCARD} em {}:{}",
        config.broker_host, config.broker_port
    );

    // O iterador reconecta sozinho após um erro
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Conectado ao broker");
                if let Err(e) = client.subscribe(TELEMETRY_WILDCARD, QoS::AtMostOnce) {
                    warn!("Falha ao assinar {TELEMETRY_WILDCARD}: {e}");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match parse_publish(&publish.topic, &publish.payload) {
                    Ok(msg) => {
                        // Non-blocking send: se o loop está lento, descarta
                        if tx.try_send(msg).is_err() {
                            debug!("Channel cheio, descartando mensagem");
                        }
                    }
                    Err(e) => debug!("Mensagem inválida em {}: {e}", publish.topic),
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Erro na conexão MQTT: {e}. Tentando novamente em 2s...");
                std::thread::sleep(Duration::from_secs(2));
            }
        }
    }
}

/// Extrai a leitura de um PUBLISH de telemetria.
///
/// O identificador do tópico prevalece sobre o do corpo.
pub fn parse_publish(topic: &str, payload: &[u8]) -> Result<MonitorMessage, String> {
    let device_id = device_id_from_topic(topic)
        .filter(|id| telemetry_topic(id) == topic)
        .ok_or_else(|| format!("tópico inesperado: {topic}"))?;
    let message = decode_telemetry(payload).map_err(|e| e.to_string())?;
    if message.device_id != device_id {
        debug!(
            "device_id do corpo ({}) difere do tópico ({device_id})",
            message.device_id
        );
    }

    Ok(MonitorMessage {
        device_id: device_id.to_string(),
        reading: message.reading(),
        raw_size: payload.len(),
    })
}
