//! Transporte MQTT sobre o cliente síncrono do `rumqttc`.
//!
//! Cada `connect` cria um cliente novo e uma thread `mqtt-events` que
//! consome a conexão. Até o CONNACK a thread só reporta o resultado da
//! tentativa; depois disso encaminha PUBLISH recebidos e a perda de conexão
//! como [`TransportEvent`].

use crossbeam_channel::{Sender, bounded};
use relay_core::config::NetworkConfig;
use relay_core::transport::{NetworkTransport, TransportError, TransportEvent};
use rumqttc::{Client, ConnectReturnCode, Connection, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Capacidade da fila de requisições do cliente.
const REQUEST_CAPACITY: usize = 16;

#[derive(Debug, Default)]
struct SessionState {
    generation: AtomicU64,
    connected: AtomicBool,
}

impl SessionState {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

pub struct MqttTransport {
    client_id: String,
    host: String,
    port: u16,
    keep_alive: Duration,
    connect_timeout: Duration,
    events: Sender<TransportEvent>,
    client: Option<Client>,
    session: Arc<SessionState>,
}

impl MqttTransport {
    pub fn new(config: &NetworkConfig, client_id: &str, events: Sender<TransportEvent>) -> Self {
        Self {
            client_id: client_id.to_string(),
            host: config.broker_host.clone(),
            port: config.broker_port,
            keep_alive: Duration::from_secs(config.keep_alive_secs),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            events,
            client: None,
            session: Arc::new(SessionState::default()),
        }
    }

    fn drop_client(&mut self) {
        self.session.connected.store(false, Ordering::SeqCst);
        if let Some(client) = self.client.take() {
            let _ = client.disconnect();
        }
    }
}

impl NetworkTransport for MqttTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.drop_client();
        let generation = self.session.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        let (client, connection) = Client::new(options, REQUEST_CAPACITY);

        let (ack_tx, ack_rx) = bounded::<Result<(), String>>(1);
        let events = self.events.clone();
        let session = Arc::clone(&self.session);
        std::thread::Builder::new()
            .name("mqtt-events".into())
            .spawn(move || event_loop(connection, ack_tx, events, session, generation))
            .map_err(|e| TransportError::Connect(format!("thread de eventos: {e}")))?;

        match ack_rx.recv_timeout(self.connect_timeout) {
            Ok(Ok(())) => {
                self.client = Some(client);
                Ok(())
            }
            Ok(Err(reason)) => Err(TransportError::Connect(format!(
                "{}:{} – {reason}",
                self.host, self.port
            ))),
            Err(_) => {
                // Invalida a thread pendente
                self.session.generation.fetch_add(1, Ordering::SeqCst);
                let _ = client.disconnect();
                Err(TransportError::Connect(format!(
                    "{}:{} – sem CONNACK em {} ms",
                    self.host,
                    self.port,
                    self.connect_timeout.as_millis()
                )))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.session.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| TransportError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| TransportError::Publish(e.to_string()))
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.drop_client();
    }
}

fn event_loop(
    mut connection: Connection,
    ack: Sender<Result<(), String>>,
    events: Sender<TransportEvent>,
    session: Arc<SessionState>,
    generation: u64,
) {
    let mut acked = false;

    for notification in connection.iter() {
        if !session.is_current(generation) {
            debug!("Sessão MQTT {generation} substituída, encerrando thread");
            return;
        }

        match notification {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                if connack.code == ConnectReturnCode::Success {
                    acked = true;
                    // Antes do ack: uma queda logo após o CONNACK prevalece
                    session.connected.store(true, Ordering::SeqCst);
                    let _ = ack.try_send(Ok(()));
                } else {
                    let _ = ack.try_send(Err(format!("CONNACK recusado: {:?}", connack.code)));
                    return;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let _ = events.send(TransportEvent::Message {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                });
            }
            Ok(other) => debug!("MQTT: {other:?}"),
            Err(e) => {
                if acked {
                    session.connected.store(false, Ordering::SeqCst);
                    let _ = events.send(TransportEvent::Disconnected(e.to_string()));
                } else {
                    let _ = ack.try_send(Err(e.to_string()));
                }
                return;
            }
        }
    }

    warn!("Loop de eventos MQTT terminou");
}
