use std::{process, sync::OnceLock};

use thermonode::{
    config::Config,
    core::{
        executor::Executor,
        recovery,
        sensor::{open_bus, Sht3x},
    },
    logger::LoggerManager,
    print_error,
};
use thermonode_socket::{ConnectionManager, SocketIoConnector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

/// Logs the effective configuration. Secrets are skipped by serialization.
fn log_effective_config(cfg: &Config) {
    match toml::to_string_pretty(cfg) {
        Ok(rendered) => debug!("Effective configuration:\n{}", rendered),
        Err(e) => warn!("Could not render configuration: {}", e),
    }
    info!("Log level: {}", cfg.logger.level);
    info!(
        "Collector: {} (device {}, group {})",
        cfg.socket.host, cfg.socket.device_id, cfg.socket.monitoring_group_id
    );
    info!(
        "Sensor: {} @ 0x{:02x}, every {}s",
        cfg.sensor.bus, cfg.sensor.address, cfg.sensor.sample_interval
    );
    if cfg.recovery.enabled {
        info!("Recovery endpoint: {}", cfg.recovery.endpoint());
    } else {
        warn!("Bus recovery is disabled");
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
                    _ = term.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
}

#[tokio::main]
async fn main() {
    let cfg = config();
    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting thermonode version {}...", env!("CARGO_PKG_VERSION"));
    log_effective_config(cfg);

    let recovery = recovery::from_config(&cfg.recovery).unwrap_or_else(|e| {
        error!("Failed to set up bus recovery: {}", e);
        process::exit(1);
    });

    let bus = open_bus(&cfg.sensor.bus).unwrap_or_else(|e| {
        error!("{}", e);
        process::exit(1);
    });
    let sensor = Sht3x::new(bus, &cfg.sensor, recovery);

    let connection = ConnectionManager::new(SocketIoConnector::new(), cfg.socket.clone());
    let cancel = CancellationToken::new();
    let executor = Executor::new(
        sensor,
        connection,
        cfg.sensor.sample_interval(),
        cancel.clone(),
    );

    info!("Starting telemetry loop...");
    let mut handle = tokio::spawn(executor.run());

    tokio::select! {
        result = &mut handle => {
            error!("Telemetry loop unexpectedly finished: {:?}", result);
            process::exit(1);
        }
        _ = shutdown_signal() => {
            info!("Initiating graceful shutdown...");
            cancel.cancel();
            match handle.await {
                Ok(stats) => debug!("Final stats: {:?}", stats),
                Err(e) => error!("Telemetry loop panicked: {}", e),
            }
            info!("Shutdown complete");
        }
    }
}
