//! Presença de peer no link de curto alcance.
//!
//! Os eventos de conexão chegam pelo contexto de callback da pilha de rádio
//! através de um channel; só o despachante altera o estado.

use crate::lifecycle::Shutdown;
use crate::transport::ShortRangeLink;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Evento de conexão do link de curto alcance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
}

/// Indicador compartilhado "há um peer conectado".
#[derive(Debug, Clone, Default)]
pub struct LinkPresence {
    active: Arc<AtomicBool>,
}

impl LinkPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Aplica o evento e retorna o estado anterior.
    pub fn apply(&self, event: LinkEvent) -> bool {
        let now = matches!(event, LinkEvent::Connected);
        self.active.swap(now, Ordering::SeqCst)
    }
}

/// Consome eventos do link até o channel fechar ou o shutdown ser pedido.
///
/// Em desconexão o anúncio é reiniciado para aceitar o próximo peer.
pub fn dispatch_link_events(
    events: Receiver<LinkEvent>,
    presence: LinkPresence,
    link: Arc<dyn ShortRangeLink>,
    shutdown: Shutdown,
) {
    while !shutdown.is_requested() {
        match events.recv_timeout(Duration::from_millis(500)) {
            Ok(event) => {
                let was_active = presence.apply(event);
                match event {
                    LinkEvent::Connected => info!("Cliente do link conectado"),
                    LinkEvent::Disconnected => {
                        info!("Cliente do link desconectado");
                        link.start_advertising();
                    }
                }
                debug!("Presença: {was_active} → {}", presence.is_active());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
