//! # Relay Monitor
//!
//! Acompanha a telemetria de todos os dispositivos via MQTT, avalia os
//! thresholds de alerta e detecta dispositivos em silêncio.
//!
//! ## Uso
//! ```bash
//! relay_monitor                                  # acompanha iot/devices/+/telemetry
//! relay_monitor --command esp32_001 toggle_led   # envia um comando e sai
//! relay_monitor --command esp32_001 reset
//! ```

mod command;
mod net_thread;
mod tracker;

use crossbeam_channel::RecvTimeoutError;
use relay_core::alerts::{AlertLevel, evaluate_alerts};
use relay_core::config::AppConfig;
use relay_core::protocol::{Command, TELEMETRY_WILDCARD};
use std::time::{Duration, Instant};
use tracker::DeviceTracker;
use tracing::{error, info, warn};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    if !config_path.exists() {
        let _ = config.save(&config_path);
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        std::process::exit(2);
    }

    // ── Modo comando ──
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {}
        [flag, device_id, name] if flag == "--command" => {
            let code = match Command::parse(name)
                .map_err(command::CommandError::from)
                .and_then(|cmd| command::send_command(&config.monitor, device_id, cmd))
            {
                Ok(()) => 0,
                Err(e) => {
                    error!("Falha ao enviar comando: {e}");
                    1
                }
            };
            std::process::exit(code);
        }
        _ => {
            eprintln!("Uso: relay_monitor [--command <device_id> <toggle_led|reset>]");
            std::process::exit(2);
        }
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   📡 RELAY MONITOR – ATIVO");
    println!("══════════════════════════════════════════════");
    println!(
        "  Broker:   {}:{}",
        config.monitor.broker_host, config.monitor.broker_port
    );
    println!("  Tópico:   {TELEMETRY_WILDCARD}");
    println!(
        "  Offline:  após {:.0}s sem dados",
        config.monitor.offline_timeout_secs
    );
    println!("══════════════════════════════════════════════");
    println!();

    let rx = net_thread::spawn_subscriber_thread(config.monitor.clone());
    let mut tracker = DeviceTracker::new(Duration::from_secs_f64(
        config.monitor.offline_timeout_secs,
    ));

    loop {
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(msg) => {
                let r = &msg.reading;
                if tracker.record(&msg.device_id, msg.reading, Instant::now()) {
                    info!("Dispositivo {} online", msg.device_id);
                }
                info!(
                    "[{}] T={:.1}°C H={:.1}% W={:.2}kg Bat={}% t={}ms ({} bytes)",
                    msg.device_id, r.temperature, r.humidity, r.weight, r.battery, r.timestamp,
                    msg.raw_size
                );

                for alert in evaluate_alerts(r, &config.monitor.alerts) {
                    match alert.level {
                        AlertLevel::Critical => error!(
                            "[{}] {} crítico: {:.1}{}",
                            msg.device_id, alert.label, alert.value, alert.unit
                        ),
                        AlertLevel::Warning => warn!(
                            "[{}] {} em alerta: {:.1}{}",
                            msg.device_id, alert.label, alert.value, alert.unit
                        ),
                        AlertLevel::Normal => {}
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                error!("Thread de rede encerrou");
                std::process::exit(1);
            }
        }

        for device_id in tracker.sweep(Instant::now()) {
            let (messages, last_ts) = tracker
                .get(&device_id)
                .map(|s| (s.messages, s.last_reading.timestamp))
                .unwrap_or_default();
            warn!(
                "Dispositivo {device_id} offline (sem dados há mais de {:.0}s, \
                 {messages} mensagens, última t={last_ts}ms) – {}/{} online",
                config.monitor.offline_timeout_secs,
                tracker.online_count(),
                tracker.device_count()
            );
        }
    }
}
