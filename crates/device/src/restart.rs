//! Reinício do processo pelo comando `reset`.
//!
//! Não há drenagem: leituras ainda no canal são perdidas.

use relay_core::connection::DeviceControl;
use relay_core::lifecycle::Shutdown;
use std::process::Command;
use tracing::{error, info};

pub struct ProcessRestart {
    shutdown: Shutdown,
}

impl ProcessRestart {
    pub fn new(shutdown: Shutdown) -> Self {
        Self { shutdown }
    }
}

impl DeviceControl for ProcessRestart {
    fn restart(&self) {
        self.shutdown.request();

        let args: Vec<_> = std::env::args_os().skip(1).collect();
        let spawned = std::env::current_exe().and_then(|exe| Command::new(exe).args(&args).spawn());
        match spawned {
            Ok(child) => {
                info!("Nova instância iniciada (pid {})", child.id());
                std::process::exit(0);
            }
            Err(e) => {
                error!("Falha ao reiniciar: {e}");
                std::process::exit(1);
            }
        }
    }
}
