//! Tarefa de notificação – consumidor não destrutivo para o link de curto alcance.
//!
//! Com [`NotifySource::QueueHead`] a leitura notificada é a mais antiga ainda
//! não consumida pelo Publisher; a mesma leitura pode ser notificada em vários
//! ciclos seguidos. Com [`NotifySource::Latest`] é sempre a última produzida.

use crate::channel::TelemetryChannel;
use crate::clock::Clock;
use crate::lifecycle::Shutdown;
use crate::presence::LinkPresence;
use crate::protocol::{self, ProtocolError};
use crate::transport::{ShortRangeLink, TransportError};
use crate::types::Reading;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Qual leitura o Notifier observa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifySource {
    /// Cabeça da fila (`peek` sem espera)
    #[default]
    QueueHead,
    /// Última leitura aceita pelo canal
    Latest,
}

/// Erros de notificação.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub struct Notifier {
    device_id: String,
    channel: Arc<TelemetryChannel>,
    presence: LinkPresence,
    link: Arc<dyn ShortRangeLink>,
    clock: Arc<dyn Clock>,
    period_ms: u64,
    source: NotifySource,
}

impl Notifier {
    pub fn new(
        device_id: &str,
        channel: Arc<TelemetryChannel>,
        presence: LinkPresence,
        link: Arc<dyn ShortRangeLink>,
        clock: Arc<dyn Clock>,
        period_ms: u64,
        source: NotifySource,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            channel,
            presence,
            link,
            clock,
            period_ms,
            source,
        }
    }

    fn current(&self) -> Option<Reading> {
        match self.source {
            NotifySource::QueueHead => self.channel.peek(Duration::ZERO),
            NotifySource::Latest => self.channel.latest(),
        }
    }

    /// Um ciclo. Retorna a leitura notificada, se houve notificação.
    pub fn notify_once(&self) -> Result<Option<Reading>, NotifyError> {
        if !self.presence.is_active() {
            return Ok(None);
        }
        let Some(reading) = self.current() else {
            return Ok(None);
        };

        let payload = protocol::encode_notification(&self.device_id, &reading)?;
        self.link.notify(&payload)?;
        debug!("Notificação enviada ({} bytes)", payload.len());
        Ok(Some(reading))
    }

    pub fn run(self, shutdown: &Shutdown) {
        while !shutdown.is_requested() {
            if let Err(e) = self.notify_once() {
                warn!("Falha na notificação: {e}");
            }
            self.clock.sleep_ms(self.period_ms);
        }
        debug!("Notifier encerrado");
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
    use crate::presence::LinkEvent;
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLink {
        sent: Mutex<Vec<Vec<u8>>>,
        fail: bool,
    }

    impl ShortRangeLink for RecordingLink {
        fn notify(&self, payload: &[u8]) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Notify("peer sumiu".into()));
            }
            self.sent.lock().unwrap().push(payload.to_vec());
            Ok(())
        }

        fn start_advertising(&self) {}
    }

    fn reading(ts: u64, temperature: f32) -> Reading {
        Reading {
            temperature,
            humidity: 55.0,
            weight: 1.2,
            battery: 90,
            timestamp: ts,
        }
    }

    fn setup(
        source: NotifySource,
    ) -> (Notifier, Arc<TelemetryChannel>, LinkPresence, Arc<RecordingLink>) {
        let channel = Arc::new(TelemetryChannel::new(
            10,
            OverflowPolicy::DropOldest,
            Duration::ZERO,
        ));
        let presence = LinkPresence::new();
        let link = Arc::new(RecordingLink::default());
        let notifier = Notifier::new(
            "esp32_001",
            channel.clone(),
            presence.clone(),
            link.clone(),
            Arc::new(ManualClock::starting_at(0)),
            1000,
            source,
        );
        (notifier, channel, presence, link)
    }

    #[test]
    fn inactive_link_is_noop() {
        let (notifier, channel, _presence, link) = setup(NotifySource::QueueHead);
        channel.push(reading(1000, 20.1)).unwrap();
        assert!(notifier.notify_once().unwrap().is_none());
        assert!(link.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_channel_is_noop() {
        let (notifier, _channel, presence, link) = setup(NotifySource::QueueHead);
        presence.apply(LinkEvent::Connected);
        assert!(notifier.notify_once().unwrap().is_none());
        assert!(link.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn head_is_renotified_until_consumed() {
        let (notifier, channel, presence, link) = setup(NotifySource::QueueHead);
        presence.apply(LinkEvent::Connected);
        channel.push(reading(1000, 20.1)).unwrap();
        channel.push(reading(6000, 20.3)).unwrap();

        let a = notifier.notify_once().unwrap();
        let b = notifier.notify_once().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.map(|r| r.timestamp), Some(1000));
        assert_eq!(channel.len(), 2);

        channel.pop(None).unwrap();
        let c = notifier.notify_once().unwrap();
        assert_eq!(c.map(|r| r.timestamp), Some(6000));

        let sent = link.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], sent[1]);
        let v: Value = serde_json::from_slice(&sent[0]).unwrap();
        assert_eq!(v["device_id"], "esp32_001");
        assert!(v.get("timestamp").is_none());
    }

    #[test]
    fn latest_source_follows_newest_sample() {
        let (notifier, channel, presence, _link) = setup(NotifySource::Latest);
        presence.apply(LinkEvent::Connected);
        channel.push(reading(1000, 20.1)).unwrap();
        channel.push(reading(6000, 20.3)).unwrap();
        assert_eq!(
            notifier.notify_once().unwrap().map(|r| r.timestamp),
            Some(6000)
        );

        // Continua disponível depois do Publisher consumir tudo
        channel.pop(None).unwrap();
        channel.pop(None).unwrap();
        assert_eq!(
            notifier.notify_once().unwrap().map(|r| r.timestamp),
            Some(6000)
        );
    }

    #[test]
    fn disconnect_stops_notifications() {
        let (notifier, channel, presence, link) = setup(NotifySource::QueueHead);
        channel.push(reading(1000, 20.1)).unwrap();
        presence.apply(LinkEvent::Connected);
        assert!(notifier.notify_once().unwrap().is_some());
        presence.apply(LinkEvent::Disconnected);
        assert!(notifier.notify_once().unwrap().is_none());
        assert_eq!(link.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn link_failure_is_reported() {
        let channel = Arc::new(TelemetryChannel::new(
            10,
            OverflowPolicy::DropOldest,
            Duration::ZERO,
        ));
        channel.push(reading(1000, 20.1)).unwrap();
        let presence = LinkPresence::new();
        presence.apply(LinkEvent::Connected);
        let notifier = Notifier::new(
            "esp32_001",
            channel.clone(),
            presence,
            Arc::new(RecordingLink {
                fail: true,
                ..Default::default()
            }),
            Arc::new(ManualClock::starting_at(0)),
            1000,
            NotifySource::QueueHead,
        );
        assert!(matches!(
            notifier.notify_once(),
            Err(NotifyError::Transport(TransportError::Notify(_)))
        ));
        assert_eq!(channel.len(), 1);
    }
}
