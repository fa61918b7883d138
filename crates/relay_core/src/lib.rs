//! # Relay Core
//!
//! Pipeline concorrente de amostragem e entrega de um dispositivo de
//! telemetria: o Sampler produz leituras num canal limitado, o Publisher as
//! consome e publica via MQTT, e o Notifier observa o canal para o link de
//! curto alcance.
//!
//! ## Módulos
//! - [`types`] – Leitura e mensagens de fio
//! - [`channel`] – Fila FIFO limitada com política de overflow
//! - [`sampler`] – Tarefa produtora com correção de fase
//! - [`connection`] – Máquina de estados da conexão e comandos recebidos
//! - [`publisher`] – Consumidor destrutivo (MQTT)
//! - [`notifier`] / [`presence`] – Consumidor não destrutivo (curto alcance)
//! - [`protocol`] – Tópicos e payloads JSON
//! - [`config`] – Configuração unificada via TOML
//! - [`alerts`] – Thresholds e níveis de alerta

pub mod alerts;
pub mod channel;
pub mod clock;
pub mod config;
pub mod connection;
pub mod indicator;
pub mod lifecycle;
pub mod notifier;
pub mod presence;
pub mod protocol;
pub mod publisher;
pub mod sampler;
pub mod sensor;
pub mod transport;
pub mod types;

// Re-exports convenientes
pub use channel::{OverflowPolicy, TelemetryChannel};
pub use config::AppConfig;
pub use connection::ConnectionManager;
pub use types::Reading;
