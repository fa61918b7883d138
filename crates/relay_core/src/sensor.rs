//! Fronteira com a eletrônica de aquisição (DHT22, HX711, bateria).

use crate::types::Reading;

/// Valores brutos de uma rodada de aquisição, ainda não validados.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawSample {
    pub temperature: f32,
    pub humidity: f32,
    pub weight: f32,
    pub battery: u8,
}

/// Erros de amostragem.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    #[error("Leitura indefinida do sensor: {field}")]
    Undefined { field: &'static str },

    #[error("Falha na aquisição: {0}")]
    Acquisition(String),
}

impl RawSample {
    /// Valida temperatura e umidade e carimba o timestamp.
    pub fn into_reading(self, timestamp: u64) -> Result<Reading, SampleError> {
        if self.temperature.is_nan() {
            return Err(SampleError::Undefined {
                field: "temperature",
            });
        }
        if self.humidity.is_nan() {
            return Err(SampleError::Undefined { field: "humidity" });
        }
        Ok(Reading {
            temperature: self.temperature,
            humidity: self.humidity,
            weight: self.weight,
            battery: self.battery,
            timestamp,
        })
    }
}

/// Fonte de amostras (driver de sensores ou simulador).
pub trait SensorSource: Send {
    fn acquire(&mut self) -> Result<RawSample, SampleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_undefined_environment_values() {
        let raw = RawSample {
            temperature: f32::NAN,
            humidity: 50.0,
            ..Default::default()
        };
        assert_eq!(
            raw.into_reading(10),
            Err(SampleError::Undefined {
                field: "temperature"
            })
        );

        let raw = RawSample {
            temperature: 21.0,
            humidity: f32::NAN,
            ..Default::default()
        };
        assert_eq!(
            raw.into_reading(10),
            Err(SampleError::Undefined { field: "humidity" })
        );
    }

    #[test]
    fn stamps_timestamp() {
        let raw = RawSample {
            temperature: 21.0,
            humidity: 48.0,
            weight: 3.5,
            battery: 97,
        };
        let reading = raw.into_reading(5_000).unwrap();
        assert_eq!(reading.timestamp, 5_000);
        assert_eq!(reading.battery, 97);
        assert!(reading.is_valid());
    }
}
