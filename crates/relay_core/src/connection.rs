//! Gerenciador de conexão – máquina de estados do caminho de publicação.
//!
//! ```text
//! Disconnected ──ensure_connected──▶ Connecting ──sucesso──▶ Connected
//!                                      │   ▲                    │
//!                                      └───┘ falha + backoff    │ perda
//! Disconnected ◀────────────────────────────────────────────────┘
//! ```
//!
//! Não existe limite de tentativas: `ensure_connected` bloqueia quem chamou
//! até conseguir (ou até o shutdown ser pedido).

use crate::clock::Clock;
use crate::indicator::StatusIndicator;
use crate::lifecycle::Shutdown;
use crate::protocol::{self, Command};
use crate::transport::{NetworkTransport, TransportError, TransportEvent};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Estado do caminho de rede.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

/// Ação terminal do dispositivo (reinício).
pub trait DeviceControl: Send + Sync {
    /// Reinicia imediatamente, sem drenar leituras em trânsito.
    fn restart(&self);
}

/// Resultado de um comando recebido.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// LED invertido; carrega o novo estado.
    LedToggled(bool),
    RestartRequested,
    /// Comando ignorado (malformado ou desconhecido).
    Ignored(String),
}

/// Erros do gerenciador de conexão.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Shutdown solicitado durante a conexão")]
    ShuttingDown,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Máquina de estados que estabelece e repara o caminho de publicação.
pub struct ConnectionManager<T: NetworkTransport> {
    device_id: String,
    command_topic: String,
    transport: Mutex<T>,
    state: Mutex<ConnState>,
    backoff_ms: u64,
    clock: Arc<dyn Clock>,
    indicator: Arc<dyn StatusIndicator>,
    control: Arc<dyn DeviceControl>,
    shutdown: Shutdown,
}

fn lock<V>(m: &Mutex<V>) -> MutexGuard<'_, V> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: NetworkTransport> ConnectionManager<T> {
    pub fn new(
        device_id: &str,
        transport: T,
        backoff_ms: u64,
        clock: Arc<dyn Clock>,
        indicator: Arc<dyn StatusIndicator>,
        control: Arc<dyn DeviceControl>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            command_topic: protocol::command_topic(device_id),
            transport: Mutex::new(transport),
            state: Mutex::new(ConnState::Disconnected),
            backoff_ms,
            clock,
            indicator,
            control,
            shutdown,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn state(&self) -> ConnState {
        *lock(&self.state)
    }

    fn set_state(&self, next: ConnState) {
        let mut state = lock(&self.state);
        if *state != next {
            debug!("Conexão: {:?} → {:?}", *state, next);
            *state = next;
        }
    }

    /// Garante conexão ativa, tentando indefinidamente com backoff fixo.
    pub fn ensure_connected(&self) -> Result<(), ConnectionError> {
        let mut transport = lock(&self.transport);

        if self.state() == ConnState::Connected {
            if transport.is_connected() {
                return Ok(());
            }
            warn!("Transporte caiu sem evento de desconexão");
        }
        self.set_state(ConnState::Connecting);

        let mut attempt: u64 = 0;
        loop {
            if self.shutdown.is_requested() {
                self.set_state(ConnState::Disconnected);
                return Err(ConnectionError::ShuttingDown);
            }

            attempt += 1;
            info!("Tentando conexão MQTT (tentativa {attempt})...");
            match transport.connect() {
                Ok(()) => {
                    match transport.subscribe(&self.command_topic) {
                        Ok(()) => info!("Assinado: {}", self.command_topic),
                        // Publicação continua funcionando sem comandos
                        Err(e) => warn!("{e}"),
                    }
                    self.set_state(ConnState::Connected);
                    info!("Conectado ao broker após {attempt} tentativa(s)");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "{e} – nova tentativa em {:.1}s",
                        self.backoff_ms as f64 / 1000.0
                    );
                    self.clock.sleep_ms(self.backoff_ms);
                }
            }
        }
    }

    /// Publica pelo transporte. Perda de conexão leva a `Disconnected`.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), ConnectionError> {
        let mut transport = lock(&self.transport);
        match transport.publish(topic, payload) {
            Ok(()) => Ok(()),
            Err(TransportError::NotConnected) => {
                self.set_state(ConnState::Disconnected);
                Err(TransportError::NotConnected.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Trata um evento vindo do contexto de callback do transporte.
    pub fn on_transport_event(&self, event: TransportEvent) -> Option<CommandOutcome> {
        match event {
            TransportEvent::Disconnected(reason) => {
                // Mesmo lock do ensure_connected: a sessão não troca no meio
                let transport = lock(&self.transport);
                if transport.is_connected() {
                    debug!("Desconexão de sessão anterior ignorada: {reason}");
                } else {
                    warn!("Conexão com o broker perdida: {reason}");
                    self.set_state(ConnState::Disconnected);
                }
                None
            }
            TransportEvent::Message { topic, payload } => {
                info!(
                    "Mensagem recebida [{topic}] {}",
                    String::from_utf8_lossy(&payload)
                );
                if topic == self.command_topic {
                    Some(self.handle_command(&payload))
                } else {
                    debug!("Ignorando mensagem de tópico não assinado: {topic}");
                    None
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn with_transport<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&lock(&self.transport))
    }

    /// Interpreta e executa um comando `{"command": "..."}`.
    pub fn handle_command(&self, raw: &[u8]) -> CommandOutcome {
        match protocol::decode_command(raw) {
            Ok(Command::ToggleLed) => {
                let on = self.indicator.toggle();
                info!("LED invertido ({})", if on { "ON" } else { "OFF" });
                CommandOutcome::LedToggled(on)
            }
            Ok(Command::Reset) => {
                warn!("Reiniciando dispositivo...");
                self.control.restart();
                CommandOutcome::RestartRequested
            }
            Err(e) => {
                warn!("Comando ignorado: {e}");
                CommandOutcome::Ignored(e.to_string())
            }
        }
    }
}

/// Consome eventos do transporte até o channel fechar ou o shutdown ser pedido.
pub fn dispatch_transport_events<T: NetworkTransport>(
    events: Receiver<TransportEvent>,
    manager: Arc<ConnectionManager<T>>,
    shutdown: Shutdown,
) {
    while !shutdown.is_requested() {
        match events.recv_timeout(Duration::from_millis(500)) {
            Ok(event) => {
                manager.on_transport_event(event);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
