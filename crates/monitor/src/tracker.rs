//! Acompanhamento de dispositivos: última leitura e estado online/offline.

use relay_core::types::Reading;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct DeviceStatus {
    pub last_seen: Instant,
    pub last_reading: Reading,
    pub messages: u64,
    pub online: bool,
}

/// Estado de todos os dispositivos já vistos, ordenados por ID.
#[derive(Debug)]
pub struct DeviceTracker {
    offline_after: Duration,
    devices: BTreeMap<String, DeviceStatus>,
}

impl DeviceTracker {
    pub fn new(offline_after: Duration) -> Self {
        Self {
            offline_after,
            devices: BTreeMap::new(),
        }
    }

    /// Registra uma leitura. Retorna `true` se o dispositivo acabou de
    /// ficar online (primeira mensagem ou volta após silêncio).
    pub fn record(&mut self, device_id: &str, reading: Reading, now: Instant) -> bool {
        match self.devices.get_mut(device_id) {
            Some(status) => {
                let was_offline = !status.online;
                status.last_seen = now;
                status.last_reading = reading;
                status.messages += 1;
                status.online = true;
                was_offline
            }
            None => {
                self.devices.insert(
                    device_id.to_string(),
                    DeviceStatus {
                        last_seen: now,
                        last_reading: reading,
                        messages: 1,
                        online: true,
                    },
                );
                true
            }
        }
    }

    /// Marca como offline quem está em silêncio há mais que o limite.
    /// Cada transição é retornada uma única vez.
    pub fn sweep(&mut self, now: Instant) -> Vec<String> {
        let mut went_offline = Vec::new();
        for (id, status) in &mut self.devices {
            if status.online && now.saturating_duration_since(status.last_seen) > self.offline_after
            {
                status.online = false;
                went_offline.push(id.clone());
            }
        }
        went_offline
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceStatus> {
        self.devices.get(device_id)
    }

    pub fn online_count(&self) -> usize {
        self.devices.values().filter(|s| s.online).count()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}
