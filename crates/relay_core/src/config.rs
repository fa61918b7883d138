//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável, carregado uma vez na
//! inicialização e imutável depois disso.

use crate::channel::OverflowPolicy;
use crate::notifier::NotifySource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Identidade do dispositivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// ID usado nos tópicos e payloads
    pub device_id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: "esp32_001".into(),
        }
    }
}

/// Conexão com o broker MQTT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub broker_host: String,
    pub broker_port: u16,
    /// Keep-alive MQTT (segundos)
    pub keep_alive_secs: u64,
    /// Tempo máximo aguardando o CONNACK (ms)
    pub connect_timeout_ms: u64,
    /// Intervalo fixo entre tentativas de conexão (ms)
    pub reconnect_backoff_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".into(),
            broker_port: 1883,
            keep_alive_secs: 60,
            connect_timeout_ms: 3000,
            reconnect_backoff_ms: 5000,
        }
    }
}

/// Canal de telemetria entre Sampler e consumidores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub capacity: usize,
    /// "block", "drop_oldest" ou "drop_newest"
    pub overflow: OverflowPolicy,
    /// Espera máxima por espaço antes de aplicar a política (ms)
    pub push_wait_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            overflow: OverflowPolicy::DropOldest,
            push_wait_ms: 1000,
        }
    }
}

impl ChannelConfig {
    pub fn push_wait(&self) -> Duration {
        Duration::from_millis(self.push_wait_ms)
    }
}

/// Prioridade e afinidade de uma tarefa.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TaskConfig {
    pub priority: u8,
    /// Núcleo preferido (ausente = qualquer)
    pub core: Option<usize>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            priority: 1,
            core: None,
        }
    }
}

/// Tarefa de amostragem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub period_ms: u64,
    pub task: TaskConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period_ms: 5000,
            task: TaskConfig {
                priority: 2,
                core: Some(0),
            },
        }
    }
}

/// Tarefa de publicação MQTT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Duração do pulso do LED após publicar (ms)
    pub pulse_ms: u64,
    pub task: TaskConfig,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            pulse_ms: 100,
            task: TaskConfig {
                priority: 1,
                core: Some(1),
            },
        }
    }
}

/// Tarefa de notificação no link de curto alcance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub period_ms: u64,
    /// "queue_head" (mais antiga não consumida) ou "latest" (última produzida)
    pub source: NotifySource,
    pub task: TaskConfig,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            source: NotifySource::QueueHead,
            task: TaskConfig {
                priority: 1,
                core: Some(1),
            },
        }
    }
}

/// Link de curto alcance (UDP no host).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// IP local para bind
    pub bind_ip: String,
    /// Porta onde peers conectam e recebem notificações
    pub port: u16,
    /// Porta de destino do beacon de anúncio (broadcast)
    pub advertise_port: u16,
    /// Nome anunciado
    pub name: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bind_ip: "0.0.0.0".into(),
            port: 5006,
            advertise_port: 5007,
            name: "ESP32_IoT_Device".into(),
        }
    }
}

/// Thresholds de alerta para o Monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub temperature_warning: f32,
    pub temperature_critical: f32,
    pub humidity_warning: f32,
    pub humidity_critical: f32,
    /// Bateria abaixo deste valor gera aviso
    pub battery_warning: f32,
    /// Bateria abaixo deste valor é crítica
    pub battery_critical: f32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            temperature_warning: 35.0,
            temperature_critical: 45.0,
            humidity_warning: 80.0,
            humidity_critical: 90.0,
            battery_warning: 20.0,
            battery_critical: 10.0,
        }
    }
}

/// Configuração do Monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    /// Silêncio após o qual um dispositivo é considerado offline (segundos)
    pub offline_timeout_secs: f64,
    pub alerts: AlertThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".into(),
            broker_port: 1883,
            client_id: "relay_monitor".into(),
            offline_timeout_secs: 15.0,
            alerts: AlertThresholds::default(),
        }
    }
}

/// Configuração raiz do aplicativo (dispositivo e monitor).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub network: NetworkConfig,
    pub channel: ChannelConfig,
    pub sampler: SamplerConfig,
    pub publisher: PublisherConfig,
    pub notifier: NotifierConfig,
    pub link: LinkConfig,
    pub monitor: MonitorConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let id = &self.device.device_id;
        if id.is_empty() {
            errors.push("device_id não pode ser vazio".into());
        } else if id.contains(['/', '+', '#']) {
            errors.push(format!(
                "device_id inválido: '{id}' (não pode conter '/', '+' ou '#')"
            ));
        }
        if self.network.broker_host.is_empty() {
            errors.push("Host do broker não pode ser vazio".into());
        }
        if self.network.broker_port == 0 {
            errors.push("Porta do broker não pode ser 0".into());
        }
        if self.network.keep_alive_secs < 5 {
            errors.push(format!(
                "keep_alive_secs inválido: {} (mínimo 5)",
                self.network.keep_alive_secs
            ));
        }
        if self.network.reconnect_backoff_ms == 0 {
            errors.push("reconnect_backoff_ms deve ser maior que 0".into());
        }
        if self.channel.capacity == 0 || self.channel.capacity > 1024 {
            errors.push(format!(
                "Capacidade do canal inválida: {} (1–1024)",
                self.channel.capacity
            ));
        }
        if self.sampler.period_ms < 100 || self.sampler.period_ms > 3_600_000 {
            errors.push(format!(
                "Período do sampler inválido: {} ms (100–3600000)",
                self.sampler.period_ms
            ));
        }
        if self.notifier.period_ms == 0 {
            errors.push("Período do notifier deve ser maior que 0".into());
        }
        if self.link.port == 0 {
            errors.push("Porta do link não pode ser 0".into());
        }
        let timeout = self.monitor.offline_timeout_secs;
        if !timeout.is_finite() || timeout <= 0.0 {
            errors.push("offline_timeout_secs deve ser maior que 0".into());
        }
        if self.monitor.broker_port == 0 {
            errors.push("Porta do broker do monitor não pode ser 0".into());
        }

        errors
    }
}
