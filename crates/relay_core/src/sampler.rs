//! Tarefa de amostragem – produtor do canal de telemetria.

use crate::channel::{ChannelError, PushOutcome, TelemetryChannel};
use crate::clock::{Clock, Ticker};
use crate::lifecycle::Shutdown;
use crate::sensor::{SampleError, SensorSource};
use crate::types::Reading;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Erro de um ciclo de amostragem.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Amostra os sensores em período fixo e empurra leituras válidas no canal.
pub struct Sampler<S: SensorSource> {
    sensor: S,
    channel: Arc<TelemetryChannel>,
    clock: Arc<dyn Clock>,
    period_ms: u64,
}

impl<S: SensorSource> Sampler<S> {
    pub fn new(
        sensor: S,
        channel: Arc<TelemetryChannel>,
        clock: Arc<dyn Clock>,
        period_ms: u64,
    ) -> Self {
        Self {
            sensor,
            channel,
            clock,
            period_ms,
        }
    }

    /// Um ciclo: adquire, valida, carimba e empurra.
    pub fn sample_once(&mut self) -> Result<Reading, CycleError> {
        let raw = self.sensor.acquire()?;
        let reading = raw.into_reading(self.clock.now_ms())?;

        match self.channel.push(reading)? {
            PushOutcome::Queued => {}
            PushOutcome::Displaced(old) => warn!(
                "Canal cheio: leitura de {} ms descartada em favor da nova",
                old.timestamp
            ),
        }
        debug!(
            "Amostra {} ms | {:.1}°C {:.1}% | {:.2} | bateria {}%",
            reading.timestamp,
            reading.temperature,
            reading.humidity,
            reading.weight,
            reading.battery
        );
        Ok(reading)
    }

    /// Loop principal com correção de fase. Retorna no shutdown ou com o canal fechado.
    pub fn run(mut self, shutdown: &Shutdown) {
        let mut ticker = Ticker::start(self.clock.as_ref(), self.period_ms);

        while !shutdown.is_requested() {
            match self.sample_once() {
                Ok(_) => {}
                Err(CycleError::Sample(e)) => error!("Ciclo descartado: {e}"),
                Err(CycleError::Channel(ChannelError::Closed)) => break,
                Err(e) => warn!("{e}"),
            }
            ticker.wait(self.clock.as_ref());
        }
        debug!("Sampler encerrado");
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
