//! Contratos com as pilhas de transporte (rede e curto alcance).
//!
//! Os adaptadores concretos vivem no binário do dispositivo; o núcleo só
//! conhece estes traits e os eventos que os callbacks das pilhas emitem.

/// Erros de transporte.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Falha ao conectar: {0}")]
    Connect(String),

    #[error("Sem conexão ativa")]
    NotConnected,

    #[error("Falha ao assinar {topic}: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("Publicação rejeitada: {0}")]
    Publish(String),

    #[error("Falha ao notificar: {0}")]
    Notify(String),
}

/// Eventos assíncronos emitidos pelo contexto de callback da pilha de rede.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Conexão perdida após ter sido estabelecida.
    Disconnected(String),
    /// Mensagem recebida em um tópico assinado.
    Message { topic: String, payload: Vec<u8> },
}

/// Transporte de publicação (MQTT no dispositivo).
pub trait NetworkTransport: Send {
    /// Uma tentativa de conexão. Não faz retry.
    fn connect(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;
}

/// Link de curto alcance com um atributo notificável.
pub trait ShortRangeLink: Send + Sync {
    fn notify(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// (Re)inicia o anúncio para que novos peers encontrem o dispositivo.
    fn start_advertising(&self);
}
