//! Link de curto alcance emulado sobre UDP.
//!
//! Um peer "conecta" enviando `CONNECT` para a porta do link e "desconecta"
//! com `DISCONNECT`. Notificações são datagramas para o peer conectado.
//! O anúncio é um beacon JSON em broadcast.

use crossbeam_channel::Sender;
use relay_core::config::LinkConfig;
use relay_core::lifecycle::Shutdown;
use relay_core::presence::LinkEvent;
use relay_core::protocol::{CHARACTERISTIC_UUID, SERVICE_UUID};
use relay_core::transport::{ShortRangeLink, TransportError};
use serde::Serialize;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

const CONNECT: &[u8] = b"CONNECT";
const DISCONNECT: &[u8] = b"DISCONNECT";

#[derive(Debug, Serialize)]
struct Beacon<'a> {
    name: &'a str,
    service: &'a str,
    characteristic: &'a str,
    port: u16,
}

pub struct UdpLink {
    socket: UdpSocket,
    peer: Mutex<Option<SocketAddr>>,
    name: String,
    advertise_port: u16,
}

impl UdpLink {
    pub fn bind(config: &LinkConfig) -> io::Result<Arc<Self>> {
        let socket = UdpSocket::bind(format!("{}:{}", config.bind_ip, config.port))?;
        socket.set_read_timeout(Some(Duration::from_secs(1)))?;
        Ok(Arc::new(Self {
            socket,
            peer: Mutex::new(None),
            name: config.name.clone(),
            advertise_port: config.advertise_port,
        }))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn peer(&self) -> Option<SocketAddr> {
        *self.peer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_peer(&self, peer: Option<SocketAddr>) {
        *self.peer.lock().unwrap_or_else(PoisonError::into_inner) = peer;
    }

    /// Inicia a thread que recebe datagramas e emite eventos de conexão.
    pub fn spawn_listener(
        self: &Arc<Self>,
        events: Sender<LinkEvent>,
        shutdown: Shutdown,
    ) -> io::Result<JoinHandle<()>> {
        let link = Arc::clone(self);
        std::thread::Builder::new()
            .name("link-listener".into())
            .spawn(move || link.listen(&events, &shutdown))
    }

    fn listen(&self, events: &Sender<LinkEvent>, shutdown: &Shutdown) {
        let mut buf = [0u8; 512];
        while !shutdown.is_requested() {
            match self.socket.recv_from(&mut buf) {
                Ok((size, from)) => self.handle_datagram(&buf[..size], from, events),
                Err(ref e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    // Timeout normal, continua
                }
                Err(e) => {
                    warn!("Erro ao receber no link: {e}");
                    std::thread::sleep(Duration::from_millis(200));
                }
            }
        }
    }

    fn handle_datagram(&self, data: &[u8], from: SocketAddr, events: &Sender<LinkEvent>) {
        let data = data.trim_ascii();
        if data == CONNECT {
            if let Some(old) = self.peer() {
                debug!("Substituindo peer {old} por {from}");
            }
            self.set_peer(Some(from));
            let _ = events.send(LinkEvent::Connected);
        } else if data == DISCONNECT {
            if self.peer() == Some(from) {
                self.set_peer(None);
                let _ = events.send(LinkEvent::Disconnected);
            } else {
                debug!("DISCONNECT de {from} ignorado (não é o peer atual)");
            }
        } else if self.peer() == Some(from) {
            info!("Escrita no atributo: {}", String::from_utf8_lossy(data));
        } else {
            debug!("Ignorando datagrama de {from}");
        }
    }
}

impl ShortRangeLink for UdpLink {
    fn notify(&self, payload: &[u8]) -> Result<(), TransportError> {
        let peer = self.peer().ok_or(TransportError::NotConnected)?;
        self.socket
            .send_to(payload, peer)
            .map(|_| ())
            .map_err(|e| TransportError::Notify(e.to_string()))
    }

    fn start_advertising(&self) {
        let port = self.local_addr().map(|a| a.port()).unwrap_or_default();
        let beacon = Beacon {
            name: &self.name,
            service: SERVICE_UUID,
            characteristic: CHARACTERISTIC_UUID,
            port,
        };
        let Ok(bytes) = serde_json::to_vec(&beacon) else {
            return;
        };

        if let Err(e) = self.socket.set_broadcast(true) {
            warn!("Falha ao habilitar broadcast: {e}");
            return;
        }
        match self
            .socket
            .send_to(&bytes, ("255.255.255.255", self.advertise_port))
        {
            Ok(_) => info!(
                "Anunciando '{}' (porta {port}), aguardando conexões...",
                self.name
            ),
            Err(e) => warn!("Falha ao anunciar: {e}"),
        }
    }
}
