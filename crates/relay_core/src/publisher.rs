//! Tarefa de publicação – consumidor destrutivo do canal.
//!
//! Entrega no máximo uma vez: leitura que falha ao publicar é descartada.

use crate::channel::{ChannelError, TelemetryChannel};
use crate::clock::Clock;
use crate::connection::{ConnectionError, ConnectionManager};
use crate::indicator::{self, StatusIndicator};
use crate::lifecycle::Shutdown;
use crate::protocol::{self, ProtocolError};
use crate::transport::NetworkTransport;
use crate::types::Reading;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Erros de entrega.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub struct Publisher<T: NetworkTransport> {
    channel: Arc<TelemetryChannel>,
    manager: Arc<ConnectionManager<T>>,
    indicator: Arc<dyn StatusIndicator>,
    clock: Arc<dyn Clock>,
    topic: String,
    pulse_ms: u64,
}

impl<T: NetworkTransport> Publisher<T> {
    pub fn new(
        channel: Arc<TelemetryChannel>,
        manager: Arc<ConnectionManager<T>>,
        indicator: Arc<dyn StatusIndicator>,
        clock: Arc<dyn Clock>,
        pulse_ms: u64,
    ) -> Self {
        let topic = protocol::telemetry_topic(manager.device_id());
        Self {
            channel,
            manager,
            indicator,
            clock,
            topic,
            pulse_ms,
        }
    }

    /// Conecta se preciso, codifica, publica e pulsa o LED.
    pub fn deliver(&self, reading: &Reading) -> Result<(), PublishError> {
        self.manager.ensure_connected()?;
        let payload = protocol::encode_telemetry(self.manager.device_id(), reading)?;
        self.manager.publish(&self.topic, &payload)?;

        info!(
            "→ {} bytes para {} | {:.1}°C {:.1}% | peso {:.2} | bateria {}%",
            payload.len(),
            self.topic,
            reading.temperature,
            reading.humidity,
            reading.weight,
            reading.battery
        );
        indicator::pulse(self.indicator.as_ref(), self.clock.as_ref(), self.pulse_ms);
        Ok(())
    }

    /// Loop principal: `pop` bloqueante seguido de entrega.
    pub fn run(self, shutdown: &Shutdown) {
        while !shutdown.is_requested() {
            match self.channel.pop(Some(Duration::from_millis(500))) {
                Ok(reading) => {
                    if let Err(e) = self.deliver(&reading) {
                        error!(
                            "Falha ao publicar leitura de {} ms (descartada): {e}",
                            reading.timestamp
                        );
                    }
                }
                Err(ChannelError::Timeout) => {}
                Err(ChannelError::Closed) => break,
                Err(e) => error!("{e}"),
            }
        }
        debug!("Publisher encerrado");
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::OverflowPolicy;
    use crate::clock::testing::ManualClock;
    use crate::connection::testing::{RecordingControl, ScriptedTransport};
    use crate::indicator::StatusLed;
    use crate::transport::TransportError;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// LED que conta pulsos (transições para ON).
    #[derive(Default)]
    struct PulseCounter {
        led: StatusLed,
        pulses: AtomicUsize,
    }

    impl StatusIndicator for PulseCounter {
        fn set(&self, on: bool) {
            if on {
                self.pulses.fetch_add(1, Ordering::SeqCst);
            }
            self.led.set(on);
        }

        fn is_on(&self) -> bool {
            self.led.is_on()
        }
    }

    struct Fixture {
        publisher: Publisher<ScriptedTransport>,
        channel: Arc<TelemetryChannel>,
        manager: Arc<ConnectionManager<ScriptedTransport>>,
        indicator: Arc<PulseCounter>,
        clock: Arc<ManualClock>,
    }

    fn fixture(transport: ScriptedTransport) -> Fixture {
        let clock = Arc::new(ManualClock::starting_at(0));
        let indicator = Arc::new(PulseCounter::default());
        let channel = Arc::new(TelemetryChannel::new(
            10,
            OverflowPolicy::DropOldest,
            Duration::ZERO,
        ));
        let manager = Arc::new(ConnectionManager::new(
            "esp32_001",
            transport,
            5000,
            clock.clone(),
            indicator.clone(),
            Arc::new(RecordingControl::default()),
            Shutdown::new(),
        ));
        let publisher = Publisher::new(
            channel.clone(),
            manager.clone(),
            indicator.clone(),
            clock.clone(),
            100,
        );
        Fixture {
            publisher,
            channel,
            manager,
            indicator,
            clock,
        }
    }

    fn reading(ts: u64) -> Reading {
        Reading {
            temperature: 20.1,
            humidity: 55.0,
            weight: 1.2,
            battery: 90,
            timestamp: ts,
        }
    }

    #[test]
    fn delivers_in_fifo_order_and_pulses() {
        let f = fixture(ScriptedTransport::failing_then_ok(2));
        f.channel.push(reading(1000)).unwrap();
        f.channel.push(reading(6000)).unwrap();
        f.channel.close();

        let Fixture {
            publisher,
            manager,
            indicator,
            clock,
            ..
        } = f;
        publisher.run(&Shutdown::new());

        let sent = manager.with_transport(|t| t.published.clone());
        assert_eq!(sent.len(), 2);
        for ((topic, payload), ts) in sent.iter().zip([1000u64, 6000]) {
            assert_eq!(topic, "iot/devices/esp32_001/telemetry");
            let v: Value = serde_json::from_slice(payload).unwrap();
            assert_eq!(v["timestamp"], ts);
            assert_eq!(v["device_id"], "esp32_001");
        }
        assert_eq!(indicator.pulses.load(Ordering::SeqCst), 2);
        assert!(!indicator.is_on());
        // dois backoffs de conexão + dois pulsos
        assert_eq!(clock.sleeps(), vec![5000, 5000, 100, 100]);
    }

    #[test]
    fn failed_publish_is_dropped_not_retried() {
        let mut transport = ScriptedTransport::failing_then_ok(0);
        transport
            .publish_results
            .push_back(Err(TransportError::Publish("rc=-1".into())));
        let f = fixture(transport);
        f.channel.push(reading(1000)).unwrap();
        f.channel.push(reading(6000)).unwrap();
        f.channel.close();

        let Fixture {
            publisher,
            channel,
            manager,
            indicator,
            ..
        } = f;
        publisher.run(&Shutdown::new());

        let sent = manager.with_transport(|t| t.published.clone());
        assert_eq!(sent.len(), 1);
        let v: Value = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(v["timestamp"], 6000);
        assert_eq!(indicator.pulses.load(Ordering::SeqCst), 1);
        assert!(channel.is_empty());
    }

    #[test]
    fn deliver_reports_shutdown_during_connect() {
        let clock = Arc::new(ManualClock::starting_at(0));
        let shutdown = Shutdown::new();
        let mut transport = ScriptedTransport::default();
        transport
            .connect_results
            .push_back(Err(TransportError::Connect("refused".into())));
        let manager = Arc::new(ConnectionManager::new(
            "esp32_001",
            transport,
            5000,
            clock.clone(),
            Arc::new(StatusLed::new()),
            Arc::new(RecordingControl::default()),
            shutdown.clone(),
        ));
        let channel = Arc::new(TelemetryChannel::new(
            10,
            OverflowPolicy::DropOldest,
            Duration::ZERO,
        ));
        let publisher = Publisher::new(channel, manager, Arc::new(StatusLed::new()), clock, 100);

        shutdown.request();
        assert!(matches!(
            publisher.deliver(&reading(1)),
            Err(PublishError::Connection(ConnectionError::ShuttingDown))
        ));
    }
}
