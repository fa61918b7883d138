//! Sensores simulados (DHT22 + célula de carga + bateria).
//!
//! Variação lenta senoidal com ruído. A balança faz média de 10 leituras,
//! como o driver HX711 com `get_units(10)`.

use relay_core::clock::Clock;
use relay_core::sensor::{RawSample, SampleError, SensorSource};
use std::sync::Arc;

const WEIGHT_AVERAGING: u32 = 10;

pub struct SimulatedSensors {
    clock: Arc<dyn Clock>,
    rng: u64,
}

impl SimulatedSensors {
    pub fn new(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self {
            clock,
            // xorshift não aceita estado zero
            rng: seed | 1,
        }
    }

    /// Ruído uniforme em [-1, 1).
    fn noise(&mut self) -> f32 {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        ((self.rng >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
    }
}

impl SensorSource for SimulatedSensors {
    fn acquire(&mut self) -> Result<RawSample, SampleError> {
        let t = self.clock.now_ms() as f32 / 1000.0;

        let temperature = 22.0 + 3.0 * (t / 600.0).sin() + 0.3 * self.noise();
        let humidity = (55.0 + 10.0 * (t / 900.0).cos() + self.noise()).clamp(0.0, 100.0);

        let mut weight = 0.0;
        for _ in 0..WEIGHT_AVERAGING {
            weight += 2.0 + 0.05 * self.noise();
        }
        weight /= WEIGHT_AVERAGING as f32;

        let battery = (92.0 + 7.0 * self.noise()).round().clamp(85.0, 99.0) as u8;

        Ok(RawSample {
            temperature: (temperature * 10.0).round() / 10.0,
            humidity: (humidity * 10.0).round() / 10.0,
            weight: (weight * 100.0).round() / 100.0,
            battery,
        })
    }
}
