//! Definição de tipos/structs para telemetria.
//!
//! Uma [`Reading`] é o resultado de uma rodada de amostragem. As mensagens
//! de fio ([`TelemetryMessage`], [`NotificationMessage`]) acrescentam a
//! identidade do dispositivo e são serializadas em JSON.

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Leitura
// ──────────────────────────────────────────────

/// Leitura imutável produzida pelo Sampler a cada ciclo.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// Temperatura ambiente (°C)
    pub temperature: f32,
    /// Umidade relativa (0–100%)
    pub humidity: f32,
    /// Peso na célula de carga (unidades calibradas)
    pub weight: f32,
    /// Bateria (0–100%)
    pub battery: u8,
    /// Milissegundos desde o boot
    pub timestamp: u64,
}

impl Reading {
    /// Temperatura e umidade precisam ser valores definidos (não NaN).
    pub fn is_valid(&self) -> bool {
        !self.temperature.is_nan() && !self.humidity.is_nan()
    }
}

// ──────────────────────────────────────────────
// Mensagens de fio
// ──────────────────────────────────────────────

/// Payload publicado em `iot/devices/<id>/telemetry`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TelemetryMessage {
    pub device_id: String,
    pub temperature: f32,
    pub humidity: f32,
    pub weight: f32,
    pub battery: u8,
    pub timestamp: u64,
}

impl TelemetryMessage {
    pub fn new(device_id: &str, reading: &Reading) -> Self {
        Self {
            device_id: device_id.to_string(),
            temperature: reading.temperature,
            humidity: reading.humidity,
            weight: reading.weight,
            battery: reading.battery,
            timestamp: reading.timestamp,
        }
    }

    /// Reconstrói a leitura (sem a identidade do dispositivo).
    pub fn reading(&self) -> Reading {
        Reading {
            temperature: self.temperature,
            humidity: self.humidity,
            weight: self.weight,
            battery: self.battery,
            timestamp: self.timestamp,
        }
    }
}

/// Payload do link de curto alcance. Não carrega timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationMessage {
    pub device_id: String,
    pub temperature: f32,
    pub humidity: f32,
    pub weight: f32,
    pub battery: u8,
}

impl NotificationMessage {
    pub fn new(device_id: &str, reading: &Reading) -> Self {
        Self {
            device_id: device_id.to_string(),
            temperature: reading.temperature,
            humidity: reading.humidity,
            weight: reading.weight,
            battery: reading.battery,
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
