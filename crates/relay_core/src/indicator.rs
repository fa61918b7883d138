//! LED de status – sinal visível de atividade.

use crate::clock::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Saída binária visível (LED).
pub trait StatusIndicator: Send + Sync {
    fn set(&self, on: bool);

    fn is_on(&self) -> bool;

    /// Inverte o estado e retorna o novo valor.
    fn toggle(&self) -> bool {
        let next = !self.is_on();
        self.set(next);
        next
    }
}

/// LED em memória que registra as mudanças no log.
#[derive(Debug, Default)]
pub struct StatusLed {
    on: AtomicBool,
}

impl StatusLed {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusIndicator for StatusLed {
    fn set(&self, on: bool) {
        if self.on.swap(on, Ordering::SeqCst) != on {
            debug!("LED {}", if on { "ON" } else { "OFF" });
        }
    }

    fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    fn toggle(&self) -> bool {
        let next = !self.on.fetch_xor(true, Ordering::SeqCst);
        debug!("LED {}", if next { "ON" } else { "OFF" });
        next
    }
}

/// Pulso curto (liga, espera, desliga).
pub fn pulse(indicator: &dyn StatusIndicator, clock: &dyn Clock, duration_ms: u64) {
    indicator.set(true);
    clock.sleep_ms(duration_ms);
    indicator.set(false);
}
