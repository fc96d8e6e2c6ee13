//! BharatMart Backend Server
//!
//! Entry point: configuration loading, database and cache setup, job
//! workers and the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use bharatmart_backend::state::AppState;
use bharatmart_backend::{build_router, cors_layer};
use bharatmart_cache::CacheService;
use bharatmart_job_queue::{QueueName, WorkerOptions, WorkerPool};
use bharatmart_jobs::{register_all_executors, JobDependencies, LogMailer, QueueService, SimulatedGateway};
use tokio::net::TcpListener;
use tokio::sync::watch;

mod auth_builder;
mod bootstrap;
mod cli;
mod config_helpers;
mod config_reloader;
mod tracing_setup;

use auth_builder::build_authenticator_from_config;
use bootstrap::maybe_provision_admin;
use cli::CliArgs;
use config_helpers::{
    cache_settings_from_config, check_mode_broker, database_settings_from_config, parse_bind_address,
    queue_client_from_config,
};
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    eprintln!("[STARTUP] BharatMart Backend starting...");
    let args = CliArgs::parse();

    if args.help_requested {
        CliArgs::print_help();
        return Ok(());
    }

    let mode = args.run_mode().map_err(|e| {
        eprintln!("[STARTUP] ERROR: {e}");
        anyhow::anyhow!(e)
    })?;

    // Resolve config path: CLI > environment variable
    let config_path = args
        .config_path
        .clone()
        .or_else(|| std::env::var("BHARATMART_CONFIG_PATH").ok());

    eprintln!("[STARTUP] Loading config from: {:?}", config_path);
    let config = load_config(&config_path)?;
    if let Err(e) = bharatmart_config::validate_config(&config) {
        eprintln!("[STARTUP] ERROR: invalid configuration: {e}");
        return Err(anyhow::anyhow!("invalid configuration: {e}"));
    }
    if let Err(e) = check_mode_broker(mode, &config) {
        eprintln!("[STARTUP] ERROR: {e}");
        return Err(anyhow::anyhow!(e));
    }
    eprintln!("[STARTUP] Config loaded successfully (mode: {mode})");

    eprintln!("[STARTUP] Initializing tracing...");
    let reload_handle = install_tracing_from_config(&config.logging);
    config_reloader::spawn_config_reloader(
        config_path.clone(),
        config.logging.level.clone(),
        reload_handle,
    );
    eprintln!("[STARTUP] Tracing initialized");

    // Connection errors are fatal here; nothing retries them.
    eprintln!("[STARTUP] Setting up database...");
    let db_settings = database_settings_from_config(&config);
    let db = bharatmart_db::connect(&db_settings).await.map_err(|e| {
        eprintln!("[STARTUP] ERROR: database initialization failed: {e}");
        anyhow::anyhow!("database initialization failed: {e}")
    })?;
    tracing::info!(
        backend = %db.kind(),
        max_connections = db_settings.max_connections,
        "database ready"
    );

    eprintln!("[STARTUP] Setting up cache...");
    let cache = CacheService::from_settings(&cache_settings_from_config(&config));
    tracing::info!(backend = cache.backend_name(), health = %cache.health().await, "cache configured");

    eprintln!("[STARTUP] Setting up job queues...");
    let client = queue_client_from_config(&config)?;
    if mode.runs_workers() {
        register_all_executors(
            &client,
            JobDependencies {
                db: db.clone(),
                mailer: Arc::new(LogMailer::new(Duration::from_millis(config.queue.email_delay_ms))),
                gateway: Arc::new(SimulatedGateway),
            },
        )
        .await?;
    }
    tracing::info!(broker = client.broker_name(), "job queue configured");

    eprintln!("[STARTUP] Building authenticator and app state...");
    let (tokens, key_info) = build_authenticator_from_config(&config).map_err(|reason| {
        eprintln!("[STARTUP] ERROR: authentication misconfigured: {reason}");
        anyhow::anyhow!(reason)
    })?;
    tracing::info!(auth_mode = key_info.mode, key_bits = key_info.bits, "authentication configured");
    let state = Arc::new(AppState::new(
        db.clone(),
        cache,
        QueueService::new(client.clone()),
        tokens,
    ));

    eprintln!("[STARTUP] Checking admin provisioning...");
    if let Err(e) = maybe_provision_admin(&state, &config.admin).await {
        tracing::error!(%e, "failed to provision admin");
        eprintln!("[STARTUP] Admin provisioning error: {}", e);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let workers = if mode.runs_workers() {
        let pool = WorkerPool::start(
            client.clone(),
            &QueueName::ALL,
            WorkerOptions {
                poll_interval: Duration::from_millis(config.queue.poll_interval_ms),
            },
        );
        eprintln!("[STARTUP] ✓ {} queue workers running", pool.len());
        Some(pool)
    } else {
        None
    };

    if mode.serves_http() {
        let app = build_router(state.clone()).layer(cors_layer(&config.cors));
        let addr = parse_bind_address(&config.server.host, config.server.port);
        let listener = TcpListener::bind(addr).await?;
        eprintln!(
            "[STARTUP] ✓ Server listening on {}:{}",
            config.server.host, config.server.port
        );
        eprintln!("[STARTUP] ✓ Ready to accept connections!");

        let mut rx = shutdown_rx.clone();
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = rx.wait_for(|stop| *stop).await;
            })
            .await?;
    } else {
        let mut rx = shutdown_rx.clone();
        let _ = rx.wait_for(|stop| *stop).await;
    }

    if let Some(pool) = workers {
        pool.shutdown().await;
    }
    if let Err(e) = db.close().await {
        tracing::warn!(%e, "error while closing database");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

/// Load configuration from file or defaults.
fn load_config(path: &Option<String>) -> anyhow::Result<bharatmart_config::Config> {
    bharatmart_config::load_config(path.as_deref()).map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
