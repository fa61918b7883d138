//! Sistema de alertas – níveis e avaliação de thresholds.

use crate::config::AlertThresholds;
use crate::types::Reading;
use serde::{Deserialize, Serialize};

/// Nível de alerta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

/// Um alerta disparado.
#[derive(Debug, Clone)]
pub struct Alert {
    pub metric: String,
    pub label: String,
    pub value: f32,
    pub unit: String,
    pub level: AlertLevel,
}

/// Avalia uma leitura contra os thresholds e retorna alertas.
pub fn evaluate_alerts(reading: &Reading, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    // Temperatura
    push_alert(
        &mut alerts,
        "temperature",
        "Temperatura",
        reading.temperature,
        "°C",
        level_for_value(
            reading.temperature,
            thresholds.temperature_warning,
            thresholds.temperature_critical,
        ),
    );

    // Umidade
    push_alert(
        &mut alerts,
        "humidity",
        "Umidade",
        reading.humidity,
        "%",
        level_for_value(
            reading.humidity,
            thresholds.humidity_warning,
            thresholds.humidity_critical,
        ),
    );

    // Bateria (quanto menor, pior)
    let battery = f32::from(reading.battery);
    push_alert(
        &mut alerts,
        "battery",
        "Bateria",
        battery,
        "%",
        level_for_low_value(
            battery,
            thresholds.battery_warning,
            thresholds.battery_critical,
        ),
    );

    alerts
}

fn push_alert(
    alerts: &mut Vec<Alert>,
    metric: &str,
    label: &str,
    value: f32,
    unit: &str,
    level: AlertLevel,
) {
    if level == AlertLevel::Normal {
        return;
    }

    alerts.push(Alert {
        metric: metric.into(),
        label: label.into(),
        value,
        unit: unit.into(),
        level,
    });
}

/// Retorna o [`AlertLevel`] para um valor dado thresholds (alto é ruim).
pub fn level_for_value(value: f32, warn: f32, crit: f32) -> AlertLevel {
    if value >= crit {
        AlertLevel::Critical
    } else if value >= warn {
        AlertLevel::Warning
    } else {
        AlertLevel::Normal
    }
}

/// Igual a [`level_for_value`], mas para métricas em que baixo é ruim.
pub fn level_for_low_value(value: f32, warn: f32, crit: f32) -> AlertLevel {
    if value <= crit {
        AlertLevel::Critical
    } else if value <= warn {
        AlertLevel::Warning
    } else {
        AlertLevel::Normal
    }
}
