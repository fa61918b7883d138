//! Ciclo de vida das tarefas: parada cooperativa e criação de threads.

use crate::config::TaskConfig;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::info;

/// Sinal de parada observado por todas as tarefas.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cria uma thread nomeada para uma tarefa.
///
/// Prioridade e núcleo vêm da configuração e ficam registrados no log;
/// o escalonador do sistema operacional continua no controle.
pub fn spawn_task<F>(name: &str, task: &TaskConfig, body: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    info!(
        "Iniciando tarefa '{name}' (prioridade {}, núcleo {})",
        task.priority,
        task.core
            .map(|c| c.to_string())
            .unwrap_or_else(|| "qualquer".into())
    );
    std::thread::Builder::new().name(name.into()).spawn(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_is_shared_between_clones() {
        let a = Shutdown::new();
        let b = a.clone();
        assert!(!b.is_requested());
        a.request();
        assert!(b.is_requested());
    }

    #[test]
    fn spawned_task_carries_name() {
        let task = TaskConfig {
            priority: 2,
            core: Some(0),
        };
        let handle = spawn_task("sampler", &task, || {
            assert_eq!(std::thread::current().name(), Some("sampler"));
        })
        .unwrap();
        handle.join().unwrap();
    }
}
