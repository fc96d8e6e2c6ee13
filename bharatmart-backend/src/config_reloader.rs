use crate::tracing_setup::ReloadHandle;

/// Re-read the configuration on SIGHUP and apply a changed log level.
/// Everything else needs a restart.
#[cfg(unix)]
pub fn spawn_config_reloader(
    config_path: Option<String>,
    initial_level: String,
    reload_handle: ReloadHandle,
) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(%e, "cannot listen for SIGHUP; log level reload disabled");
                return;
            }
        };
        let mut current_level = initial_level;

        while hangups.recv().await.is_some() {
            let new_cfg = match bharatmart_config::load_config(config_path.as_deref()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::error!(%e, "failed to reload config file");
                    continue;
                }
            };
            if let Err(e) = bharatmart_config::validate_config(&new_cfg) {
                tracing::error!(%e, "loaded config failed validation, ignoring");
                continue;
            }
            if new_cfg.logging.level == current_level {
                tracing::info!("configuration reloaded; log level unchanged");
                continue;
            }
            let filter = tracing_subscriber::EnvFilter::new(&new_cfg.logging.level);
            match reload_handle(filter) {
                Ok(()) => {
                    tracing::info!(new_level = %new_cfg.logging.level, "log level updated at runtime");
                    current_level = new_cfg.logging.level;
                }
                Err(e) => tracing::error!(%e, "failed to reload log level"),
            }
        }
    });
}

#[cfg(not(unix))]
pub fn spawn_config_reloader(
    _config_path: Option<String>,
    _initial_level: String,
    _reload_handle: ReloadHandle,
) {
    tracing::debug!("log level reload is only available on unix");
}
