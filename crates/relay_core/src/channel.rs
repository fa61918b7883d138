//! Canal de telemetria – fila FIFO limitada entre o Sampler e os consumidores.
//!
//! É o único ponto de sincronização entre produtor e consumidores:
//! - Publisher consome com [`TelemetryChannel::pop`] (destrutivo)
//! - Notifier observa com [`TelemetryChannel::peek`] ou [`TelemetryChannel::latest`]
//!
//! Quando a fila está cheia, a [`OverflowPolicy`] configurada decide o que
//! acontece com o produtor.

use crate::types::Reading;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Comportamento do `push` com a fila cheia.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Bloqueia o produtor até haver espaço (sem limite de tempo).
    Block,
    /// Aguarda `push_wait`; se continuar cheia, descarta a leitura mais antiga.
    #[default]
    DropOldest,
    /// Aguarda `push_wait`; se continuar cheia, descarta a leitura nova.
    DropNewest,
}

/// Resultado de um `push` aceito.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PushOutcome {
    Queued,
    /// Entrou na fila, mas expulsou a leitura mais antiga.
    Displaced(Reading),
}

/// Erros do canal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Canal cheio ({capacity} leituras), leitura nova descartada")]
    Full { capacity: usize },

    #[error("Timeout aguardando leitura")]
    Timeout,

    #[error("Canal fechado")]
    Closed,
}

#[derive(Debug)]
struct Inner {
    queue: VecDeque<Reading>,
    latest: Option<Reading>,
    closed: bool,
}

/// Fila FIFO de capacidade fixa.
#[derive(Debug)]
pub struct TelemetryChannel {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
    push_wait: Duration,
}

impl TelemetryChannel {
    /// Cria o canal. Capacidade 0 é promovida para 1.
    pub fn new(capacity: usize, policy: OverflowPolicy, push_wait: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                latest: None,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            policy,
            push_wait,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insere no fim da fila, aplicando a política de overflow.
    pub fn push(&self, reading: Reading) -> Result<PushOutcome, ChannelError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(ChannelError::Closed);
        }

        if inner.queue.len() >= self.capacity {
            inner = match self.policy {
                OverflowPolicy::Block => self
                    .not_full
                    .wait_while(inner, |i| !i.closed && i.queue.len() >= self.capacity)
                    .unwrap_or_else(PoisonError::into_inner),
                OverflowPolicy::DropOldest | OverflowPolicy::DropNewest => {
                    self.wait_for_room(inner)
                }
            };
            if inner.closed {
                return Err(ChannelError::Closed);
            }
        }

        let mut outcome = PushOutcome::Queued;
        if inner.queue.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropNewest => {
                    return Err(ChannelError::Full {
                        capacity: self.capacity,
                    });
                }
                // Block só sai do wait com espaço livre
                OverflowPolicy::DropOldest | OverflowPolicy::Block => {
                    if let Some(old) = inner.queue.pop_front() {
                        outcome = PushOutcome::Displaced(old);
                    }
                }
            }
        }

        inner.queue.push_back(reading);
        inner.latest = Some(reading);
        drop(inner);
        self.not_empty.notify_one();
        Ok(outcome)
    }

    fn wait_for_room<'a>(&self, inner: MutexGuard<'a, Inner>) -> MutexGuard<'a, Inner> {
        if self.push_wait.is_zero() {
            return inner;
        }
        let (inner, _) = self
            .not_full
            .wait_timeout_while(inner, self.push_wait, |i| {
                !i.closed && i.queue.len() >= self.capacity
            })
            .unwrap_or_else(PoisonError::into_inner);
        inner
    }

    /// Remove e retorna a cabeça da fila.
    ///
    /// `None` aguarda indefinidamente. Com o canal fechado e vazio retorna
    /// [`ChannelError::Closed`].
    pub fn pop(&self, wait: Option<Duration>) -> Result<Reading, ChannelError> {
        let inner = self.lock();
        let mut inner = match wait {
            None => self
                .not_empty
                .wait_while(inner, |i| !i.closed && i.queue.is_empty())
                .unwrap_or_else(PoisonError::into_inner),
            Some(timeout) => {
                self.not_empty
                    .wait_timeout_while(inner, timeout, |i| !i.closed && i.queue.is_empty())
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        };

        match inner.queue.pop_front() {
            Some(reading) => {
                drop(inner);
                self.not_full.notify_one();
                Ok(reading)
            }
            None if inner.closed => Err(ChannelError::Closed),
            None => Err(ChannelError::Timeout),
        }
    }

    /// Cópia da cabeça sem removê-la. `wait` zero nunca bloqueia.
    pub fn peek(&self, wait: Duration) -> Option<Reading> {
        let mut inner = self.lock();
        if inner.queue.is_empty() && !wait.is_zero() {
            let deadline = Instant::now() + wait;
            while inner.queue.is_empty() && !inner.closed {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                inner = self
                    .not_empty
                    .wait_timeout(inner, remaining)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        }
        inner.queue.front().copied()
    }

    /// Última leitura aceita pelo canal, mesmo que já consumida.
    pub fn latest(&self) -> Option<Reading> {
        self.lock().latest
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Fecha o canal e acorda todos que estão esperando.
    ///
    /// Leituras restantes ainda podem ser consumidas com `pop`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn reading(ts: u64) -> Reading {
        Reading {
            temperature: 20.0,
            humidity: 50.0,
            weight: 1.0,
            battery: 90,
            timestamp: ts,
        }
    }

    fn channel(capacity: usize, policy: OverflowPolicy) -> TelemetryChannel {
        TelemetryChannel::new(capacity, policy, Duration::ZERO)
    }

    #[test]
    fn reference_scenario_fifo_and_peek() {
        let ch = channel(10, OverflowPolicy::DropOldest);
        let first = Reading {
            temperature: 20.1,
            humidity: 55.0,
            weight: 1.2,
            battery: 90,
            timestamp: 1000,
        };
        let second = Reading {
            temperature: 20.3,
            humidity: 54.8,
            weight: 1.2,
            battery: 90,
            timestamp: 6000,
        };
        ch.push(first).unwrap();
        ch.push(second).unwrap();

        assert_eq!(ch.peek(Duration::ZERO), Some(first));
        assert_eq!(ch.pop(Some(Duration::ZERO)).unwrap(), first);
        assert_eq!(ch.pop(Some(Duration::ZERO)).unwrap(), second);
    }

    #[test]
    fn length_never_exceeds_capacity() {
        for policy in [OverflowPolicy::DropOldest, OverflowPolicy::DropNewest] {
            let ch = channel(3, policy);
            for ts in 0..20 {
                let _ = ch.push(reading(ts));
                assert!(ch.len() <= 3);
            }
            assert_eq!(ch.len(), 3);
        }
    }

    #[test]
    fn drop_oldest_evicts_head() {
        let ch = channel(2, OverflowPolicy::DropOldest);
        ch.push(reading(1)).unwrap();
        ch.push(reading(2)).unwrap();
        assert_eq!(
            ch.push(reading(3)).unwrap(),
            PushOutcome::Displaced(reading(1))
        );
        assert_eq!(ch.pop(Some(Duration::ZERO)).unwrap().timestamp, 2);
        assert_eq!(ch.pop(Some(Duration::ZERO)).unwrap().timestamp, 3);
    }

    #[test]
    fn drop_newest_rejects_new_reading() {
        let ch = channel(2, OverflowPolicy::DropNewest);
        ch.push(reading(1)).unwrap();
        ch.push(reading(2)).unwrap();
        assert_eq!(
            ch.push(reading(3)),
            Err(ChannelError::Full { capacity: 2 })
        );
        assert_eq!(ch.latest().map(|r| r.timestamp), Some(2));
        assert_eq!(ch.pop(Some(Duration::ZERO)).unwrap().timestamp, 1);
    }

    #[test]
    fn bounded_wait_uses_room_freed_by_consumer() {
        let ch = Arc::new(TelemetryChannel::new(
            1,
            OverflowPolicy::DropOldest,
            Duration::from_secs(5),
        ));
        ch.push(reading(1)).unwrap();

        let consumer = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                ch.pop(Some(Duration::ZERO)).unwrap()
            })
        };

        // Espera o consumidor liberar espaço em vez de expulsar
        assert_eq!(ch.push(reading(2)).unwrap(), PushOutcome::Queued);
        assert_eq!(consumer.join().unwrap().timestamp, 1);
        assert_eq!(ch.peek(Duration::ZERO).unwrap().timestamp, 2);
    }

    #[test]
    fn block_policy_waits_for_consumer() {
        let ch = Arc::new(channel(1, OverflowPolicy::Block));
        ch.push(reading(1)).unwrap();

        let producer = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || ch.push(reading(2)))
        };

        thread::sleep(Duration::from_millis(20));
        assert_eq!(ch.len(), 1);
        assert_eq!(ch.pop(None).unwrap().timestamp, 1);
        assert_eq!(producer.join().unwrap(), Ok(PushOutcome::Queued));
        assert_eq!(ch.pop(None).unwrap().timestamp, 2);
    }

    #[test]
    fn close_releases_blocked_producer() {
        let ch = Arc::new(channel(1, OverflowPolicy::Block));
        ch.push(reading(1)).unwrap();

        let producer = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || ch.push(reading(2)))
        };
        thread::sleep(Duration::from_millis(20));
        ch.close();
        assert_eq!(producer.join().unwrap(), Err(ChannelError::Closed));
    }

    #[test]
    fn pop_times_out_on_empty_channel() {
        let ch = channel(4, OverflowPolicy::DropOldest);
        assert_eq!(
            ch.pop(Some(Duration::from_millis(10))),
            Err(ChannelError::Timeout)
        );
    }

    #[test]
    fn pop_drains_before_reporting_closed() {
        let ch = channel(4, OverflowPolicy::DropOldest);
        ch.push(reading(7)).unwrap();
        assert!(!ch.is_closed());
        ch.close();
        assert!(ch.is_closed());
        assert_eq!(ch.pop(None).unwrap().timestamp, 7);
        assert_eq!(ch.pop(None), Err(ChannelError::Closed));
        assert_eq!(ch.push(reading(8)), Err(ChannelError::Closed));
    }

    #[test]
    fn blocked_pop_wakes_on_push() {
        let ch = Arc::new(channel(4, OverflowPolicy::DropOldest));
        let consumer = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || ch.pop(None))
        };
        thread::sleep(Duration::from_millis(20));
        ch.push(reading(42)).unwrap();
        assert_eq!(consumer.join().unwrap().unwrap().timestamp, 42);
    }

    #[test]
    fn peek_is_non_destructive() {
        let ch = channel(4, OverflowPolicy::DropOldest);
        assert_eq!(ch.peek(Duration::ZERO), None);

        ch.push(reading(1)).unwrap();
        ch.push(reading(2)).unwrap();
        for _ in 0..5 {
            assert_eq!(ch.peek(Duration::ZERO).unwrap().timestamp, 1);
        }
        assert_eq!(ch.len(), 2);
        assert_eq!(ch.pop(None).unwrap().timestamp, 1);
    }

    #[test]
    fn peek_with_wait_sees_late_push() {
        let ch = Arc::new(channel(4, OverflowPolicy::DropOldest));
        let producer = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                ch.push(reading(9)).unwrap();
            })
        };
        let seen = ch.peek(Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(seen.map(|r| r.timestamp), Some(9));
        assert_eq!(ch.len(), 1);
    }

    #[test]
    fn latest_tracks_last_accepted_push() {
        let ch = channel(4, OverflowPolicy::DropOldest);
        assert_eq!(ch.latest(), None);
        ch.push(reading(1)).unwrap();
        ch.push(reading(2)).unwrap();
        ch.pop(None).unwrap();
        ch.pop(None).unwrap();
        assert!(ch.is_empty());
        assert_eq!(ch.latest().map(|r| r.timestamp), Some(2));
    }

    #[test]
    fn zero_capacity_is_promoted() {
        let ch = channel(0, OverflowPolicy::DropOldest);
        assert_eq!(ch.capacity(), 1);
        assert_eq!(ch.policy(), OverflowPolicy::DropOldest);
    }
}
