//! # Relay Device
//!
//! Amostra os sensores a cada período, publica as leituras via MQTT e as
//! notifica no link de curto alcance quando há um peer conectado.
//!
//! ## Tarefas
//! - `sampler`   – produtor, período fixo com correção de fase
//! - `publisher` – consome o canal e publica em `iot/devices/<id>/telemetry`
//! - `notifier`  – observa o canal e notifica o link a cada segundo
//!
//! ## Uso
//! ```bash
//! relay_device              # config.toml ao lado do executável
//! RUST_LOG=debug relay_device
//! ```

mod mqtt;
mod restart;
mod sim_sensor;
mod udp_link;

use mqtt::MqttTransport;
use relay_core::clock::{Clock, SystemClock};
use relay_core::config::AppConfig;
use relay_core::connection::{self, ConnectionManager};
use relay_core::indicator::{StatusIndicator, StatusLed};
use relay_core::lifecycle::{Shutdown, spawn_task};
use relay_core::notifier::Notifier;
use relay_core::presence::{self, LinkPresence};
use relay_core::publisher::Publisher;
use relay_core::sampler::Sampler;
use relay_core::transport::ShortRangeLink;
use relay_core::TelemetryChannel;
use restart::ProcessRestart;
use sim_sensor::SimulatedSensors;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use udp_link::UdpLink;

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        std::process::exit(2);
    }

    let device_id = config.device.device_id.clone();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let shutdown = Shutdown::new();
    let led: Arc<dyn StatusIndicator> = Arc::new(StatusLed::new());

    // ── Canal de telemetria ──
    let channel = Arc::new(TelemetryChannel::new(
        config.channel.capacity,
        config.channel.overflow,
        config.channel.push_wait(),
    ));

    // ── Caminho de rede ──
    let (net_tx, net_rx) = crossbeam_channel::unbounded();
    let transport = MqttTransport::new(&config.network, &device_id, net_tx);
    let manager = Arc::new(ConnectionManager::new(
        &device_id,
        transport,
        config.network.reconnect_backoff_ms,
        Arc::clone(&clock),
        Arc::clone(&led),
        Arc::new(ProcessRestart::new(shutdown.clone())),
        shutdown.clone(),
    ));

    {
        let manager = Arc::clone(&manager);
        let shutdown = shutdown.clone();
        std::thread::Builder::new()
            .name("net-events".into())
            .spawn(move || connection::dispatch_transport_events(net_rx, manager, shutdown))
            .expect("Falha ao criar thread de eventos de rede");
    }

    // ── Link de curto alcance ──
    let link = bind_link(&config);
    let presence = LinkPresence::new();
    let (link_tx, link_rx) = crossbeam_channel::unbounded();
    link.spawn_listener(link_tx, shutdown.clone())
        .expect("Falha ao criar thread do link");
    {
        let link: Arc<dyn ShortRangeLink> = link.clone();
        let presence = presence.clone();
        let shutdown = shutdown.clone();
        std::thread::Builder::new()
            .name("link-events".into())
            .spawn(move || presence::dispatch_link_events(link_rx, presence, link, shutdown))
            .expect("Falha ao criar thread de eventos do link");
    }
    link.start_advertising();

    // ── Tarefas ──
    let sampler = Sampler::new(
        SimulatedSensors::new(Arc::clone(&clock), std::process::id() as u64),
        Arc::clone(&channel),
        Arc::clone(&clock),
        config.sampler.period_ms,
    );
    let publisher = Publisher::new(
        Arc::clone(&channel),
        Arc::clone(&manager),
        Arc::clone(&led),
        Arc::clone(&clock),
        config.publisher.pulse_ms,
    );
    let notifier = Notifier::new(
        &device_id,
        Arc::clone(&channel),
        presence,
        link,
        Arc::clone(&clock),
        config.notifier.period_ms,
        config.notifier.source,
    );

    let spawned = [
        spawn_task("sampler", &config.sampler.task, {
            let shutdown = shutdown.clone();
            move || sampler.run(&shutdown)
        }),
        spawn_task("publisher", &config.publisher.task, {
            let shutdown = shutdown.clone();
            move || publisher.run(&shutdown)
        }),
        spawn_task("notifier", &config.notifier.task, {
            let shutdown = shutdown.clone();
            move || notifier.run(&shutdown)
        }),
    ];
    let mut handles = Vec::new();
    for result in spawned {
        match result {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                error!("Falha ao criar tarefa: {e}");
                std::process::exit(1);
            }
        }
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ RELAY DEVICE – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Dispositivo: {device_id}");
    println!(
        "  Broker:      {}:{}",
        config.network.broker_host, config.network.broker_port
    );
    println!(
        "  Amostragem:  {:.1}s | canal {} ({:?})",
        config.sampler.period_ms as f64 / 1000.0,
        channel.capacity(),
        channel.policy()
    );
    println!("  Link:        {} porta {}", config.link.name, config.link.port);
    println!("══════════════════════════════════════════════");
    println!();

    info!("Dispositivo {device_id} inicializado");

    for handle in handles {
        let _ = handle.join();
    }
}

/// Abre o socket do link, tentando novamente até conseguir.
fn bind_link(config: &AppConfig) -> Arc<UdpLink> {
    loop {
        match UdpLink::bind(&config.link) {
            Ok(link) => return link,
            Err(e) => {
                error!(
                    "Falha ao bind porta {}: {e}. Tentando novamente em 2s...",
                    config.link.port
                );
                std::thread::sleep(Duration::from_secs(2));
            }
        }
    }
}
