use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bharatmart_cache::CacheSettings;
use bharatmart_config::Config;
use bharatmart_db::backends::OrdsSettings;
use bharatmart_db::{DatabaseKind, DatabaseSettings};
use bharatmart_job_queue::{InMemoryBroker, JobQueueClient, JobQueueError, QueueBroker, RedisBroker};

use crate::cli::RunMode;

const REDIS_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Build the persistence backend settings from application config.
pub fn database_settings_from_config(cfg: &Config) -> DatabaseSettings {
    let db = &cfg.database;
    let ords = db.ords_url.as_ref().map(|url| OrdsSettings {
        base_url: url.clone(),
        schema: db.ords_schema.clone().unwrap_or_default(),
        username: db.ords_username.clone(),
        password: db.ords_password.clone(),
    });
    DatabaseSettings {
        kind: DatabaseKind::from_config(&db.kind),
        sqlite_path: db.path.clone(),
        url: db.url.clone(),
        max_connections: db.max_connections,
        supabase_url: db.supabase_url.clone(),
        supabase_service_role_key: db.supabase_service_role_key.clone(),
        ords,
    }
}

pub fn cache_settings_from_config(cfg: &Config) -> CacheSettings {
    CacheSettings {
        kind: cfg.cache.kind.clone(),
        redis_url: cfg.cache.redis_url.clone(),
        default_ttl_secs: cfg.cache.default_ttl_secs,
        op_timeout: REDIS_OP_TIMEOUT,
    }
}

/// Build the job queue client on the configured broker.
pub fn queue_client_from_config(cfg: &Config) -> Result<JobQueueClient, JobQueueError> {
    let broker: Arc<dyn QueueBroker> = match cfg.queue.broker.to_ascii_lowercase().as_str() {
        "redis" => {
            let url = cfg.queue.redis_url.as_deref().ok_or_else(|| {
                JobQueueError::Unavailable("queue.redis_url is required for the redis broker".into())
            })?;
            Arc::new(RedisBroker::new(url, REDIS_OP_TIMEOUT)?)
        }
        _ => Arc::new(InMemoryBroker::new()),
    };
    Ok(JobQueueClient::new(broker)
        .with_job_timeout(Duration::from_secs(cfg.queue.job_timeout_secs)))
}

/// The memory broker lives inside one process, so jobs enqueued by an
/// `api` process would never reach a separate `worker` process.
pub fn check_mode_broker(mode: RunMode, cfg: &Config) -> Result<(), String> {
    if mode == RunMode::All || cfg.queue.broker.eq_ignore_ascii_case("redis") {
        return Ok(());
    }
    Err(format!(
        "--mode {mode} needs a shared queue broker, but queue.broker is '{}'; \
         set queue.broker = \"redis\" with queue.redis_url, or run with --mode all",
        cfg.queue.broker
    ))
}

/// Parse host:port into a SocketAddr, with fallback to 0.0.0.0.
pub fn parse_bind_address(host: &str, port: u16) -> SocketAddr {
    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .or_else(|_| host.parse::<SocketAddr>())
        .or_else(|_| host.parse::<Ipv6Addr>().map(|ip| SocketAddr::new(IpAddr::V6(ip), port)))
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)))
}
