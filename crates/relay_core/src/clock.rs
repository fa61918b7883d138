//! Relógio monotônico e agendamento periódico com correção de fase.

use std::time::{Duration, Instant};

/// Fonte de tempo das tarefas. Milissegundos desde o boot.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
    fn sleep_ms(&self, ms: u64);
}

/// Relógio real baseado em [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    boot: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, ms: u64) {
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }
}

/// Agenda periódica: o próximo despertar é `último_despertar + período`,
/// nunca `agora + período`, então o tempo de trabalho não acumula deriva.
///
/// Se um ciclo estourou o período, o despertar seguinte acontece imediatamente
/// (sem pular slots).
#[derive(Debug, Clone)]
pub struct Ticker {
    period_ms: u64,
    last_wake_ms: u64,
}

impl Ticker {
    pub fn start(clock: &dyn Clock, period_ms: u64) -> Self {
        Self {
            period_ms,
            last_wake_ms: clock.now_ms(),
        }
    }

    /// Dorme até o próximo slot e retorna o instante agendado.
    pub fn wait(&mut self, clock: &dyn Clock) -> u64 {
        let next = self.last_wake_ms + self.period_ms;
        let now = clock.now_ms();
        if next > now {
            clock.sleep_ms(next - now);
        }
        self.last_wake_ms = next;
        next
    }
}
