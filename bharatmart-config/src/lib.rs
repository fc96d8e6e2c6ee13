use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

/// `30s`, `15m`, `1h`, `7d` or a bare number of seconds.
static DURATION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*([smhd]?)\s*$").unwrap());

/// Prefix of every JWT-shaped key (`{"alg":...` base64url encoded).
const JWT_PREFIX: &str = "eyJhbGciOi";

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub database: Option<DatabaseSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub cors: Option<CorsSection>,
    #[serde(default)]
    pub cache: Option<CacheSection>,
    #[serde(default)]
    pub queue: Option<QueueSection>,
    #[serde(default)]
    pub auth: Option<AuthSection>,
    #[serde(default)]
    pub admin: Option<AdminSection>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct CorsSection {
    #[serde(default)]
    pub allowed_origins: Option<Vec<String>>,
    #[serde(default)]
    pub allow_all_origins: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSection {
    #[serde(default, rename = "type", alias = "driver")]
    pub kind: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_service_role_key: Option<String>,
    #[serde(default)]
    pub ords_url: Option<String>,
    #[serde(default)]
    pub ords_schema: Option<String>,
    #[serde(default)]
    pub ords_username: Option<String>,
    #[serde(default)]
    pub ords_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CacheSection {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub default_ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct QueueSection {
    #[serde(default)]
    pub broker: Option<String>,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
    #[serde(default)]
    pub email_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub access_token_ttl: Option<String>,
    #[serde(default)]
    pub refresh_token_ttl: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminSection {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Resolved application configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// `development`, `production` or `test`.
    pub environment: String,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_all_origins: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseConfig {
    /// Backend selector: `sqlite`, `postgresql`, `supabase` or `oci-autonomous`.
    pub kind: String,
    pub path: String,
    pub url: Option<String>,
    pub max_connections: u32,
    pub supabase_url: Option<String>,
    #[serde(skip_serializing)]
    pub supabase_service_role_key: Option<String>,
    pub ords_url: Option<String>,
    pub ords_schema: Option<String>,
    pub ords_username: Option<String>,
    #[serde(skip_serializing)]
    pub ords_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheConfig {
    /// `none`, `memory` or `redis`.
    pub kind: String,
    pub redis_url: Option<String>,
    pub default_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueConfig {
    /// `memory` or `redis`.
    pub broker: String,
    pub redis_url: Option<String>,
    pub poll_interval_ms: u64,
    pub job_timeout_secs: u64,
    /// Simulated delivery time of the logging mailer.
    pub email_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,
    pub access_token_ttl: String,
    pub refresh_token_ttl: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminConfig {
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            cors: CorsConfig {
                allowed_origins: vec!["http://localhost:5173".to_string()],
                allow_all_origins: false,
            },
            database: DatabaseConfig {
                kind: "sqlite".to_string(),
                path: "./bharatmart.db".to_string(),
                url: None,
                max_connections: 10,
                supabase_url: None,
                supabase_service_role_key: None,
                ords_url: None,
                ords_schema: None,
                ords_username: None,
                ords_password: None,
            },
            cache: CacheConfig {
                kind: "none".to_string(),
                redis_url: None,
                default_ttl_secs: None,
            },
            queue: QueueConfig {
                broker: "memory".to_string(),
                redis_url: None,
                poll_interval_ms: 500,
                job_timeout_secs: 30,
                email_delay_ms: 1000,
            },
            auth: AuthConfig {
                jwt_secret: None,
                access_token_ttl: "1h".to_string(),
                refresh_token_ttl: "7d".to_string(),
            },
            admin: AdminConfig {
                email: None,
                password: None,
            },
        }
    }
}

impl Config {
    #[inline]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl AuthConfig {
    pub fn access_ttl(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.access_token_ttl)
    }

    pub fn refresh_ttl(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.refresh_token_ttl)
    }
}

/// Parse a compact duration such as `1h` or `7d`. A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let caps = DURATION_REGEX
        .captures(s)
        .ok_or_else(|| ConfigError::Parse(format!("invalid duration: {}", s)))?;
    let n: u64 = caps[1]
        .parse()
        .map_err(|_| ConfigError::Parse(format!("invalid duration: {}", s)))?;
    let secs = match &caps[2] {
        "m" => n * 60,
        "h" => n * 3600,
        "d" => n * 86_400,
        _ => n,
    };
    Ok(Duration::from_secs(secs))
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(()),
    }
}

#[inline]
fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
    ($target:expr, $source:expr, wrap) => {
        if let Some(v) = $source {
            $target = Some(v);
        }
    };
}

/// Load concrete `Config` from an optional file and the environment.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        apply_raw(&mut cfg, raw);
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw(cfg: &mut Config, raw: RawConfigFile) {
    apply_opt!(cfg.environment, raw.environment);
    if let Some(server) = raw.server {
        apply_opt!(cfg.server.host, server.host);
        apply_opt!(cfg.server.port, server.port);
    }
    if let Some(logging) = raw.logging {
        apply_opt!(cfg.logging.level, logging.level);
        apply_opt!(cfg.logging.json, logging.json);
    }
    if let Some(cors) = raw.cors {
        apply_opt!(cfg.cors.allowed_origins, cors.allowed_origins);
        apply_opt!(cfg.cors.allow_all_origins, cors.allow_all_origins);
    }
    if let Some(db) = raw.database {
        apply_opt!(cfg.database.kind, db.kind);
        apply_opt!(cfg.database.path, db.path);
        apply_opt!(cfg.database.url, db.url, wrap);
        apply_opt!(cfg.database.max_connections, db.max_connections);
        apply_opt!(cfg.database.supabase_url, db.supabase_url, wrap);
        apply_opt!(
            cfg.database.supabase_service_role_key,
            db.supabase_service_role_key,
            wrap
        );
        apply_opt!(cfg.database.ords_url, db.ords_url, wrap);
        apply_opt!(cfg.database.ords_schema, db.ords_schema, wrap);
        apply_opt!(cfg.database.ords_username, db.ords_username, wrap);
        apply_opt!(cfg.database.ords_password, db.ords_password, wrap);
    }
    if let Some(cache) = raw.cache {
        apply_opt!(cfg.cache.kind, cache.kind);
        apply_opt!(cfg.cache.redis_url, cache.redis_url, wrap);
        apply_opt!(cfg.cache.default_ttl_secs, cache.default_ttl_secs, wrap);
    }
    if let Some(q) = raw.queue {
        apply_opt!(cfg.queue.broker, q.broker);
        apply_opt!(cfg.queue.redis_url, q.redis_url, wrap);
        apply_opt!(cfg.queue.poll_interval_ms, q.poll_interval_ms);
        apply_opt!(cfg.queue.job_timeout_secs, q.job_timeout_secs);
        apply_opt!(cfg.queue.email_delay_ms, q.email_delay_ms);
    }
    if let Some(auth) = raw.auth {
        apply_opt!(cfg.auth.jwt_secret, auth.jwt_secret, wrap);
        apply_opt!(cfg.auth.access_token_ttl, auth.access_token_ttl);
        apply_opt!(cfg.auth.refresh_token_ttl, auth.refresh_token_ttl);
    }
    if let Some(admin) = raw.admin {
        apply_opt!(cfg.admin.email, admin.email, wrap);
        apply_opt!(cfg.admin.password, admin.password, wrap);
    }
}

/// First non-empty value among `keys`, in order.
#[inline]
fn env_str(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| env::var(k).ok())
        .find(|v| !v.trim().is_empty())
}

#[inline]
fn env_parse<T: std::str::FromStr>(keys: &[&str]) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_str(keys) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", keys[0], e))),
        None => Ok(None),
    }
}

#[inline]
fn env_bool(keys: &[&str]) -> Result<Option<bool>, ConfigError> {
    match env_str(keys) {
        Some(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", keys[0]))),
        None => Ok(None),
    }
}

/// Prefixed `BHARATMART_*` names win over the bare legacy names.
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    if let Some(v) = env_str(&["BHARATMART_ENV", "NODE_ENV"]) {
        cfg.environment = v;
    }

    // Server
    if let Some(v) = env_str(&["BHARATMART_SERVER_HOST"]) {
        cfg.server.host = v;
    }
    if let Some(v) = env_parse::<u16>(&["BHARATMART_SERVER_PORT", "PORT"])? {
        cfg.server.port = v;
    }

    // Logging
    if let Some(v) = env_str(&["BHARATMART_LOG_LEVEL", "LOG_LEVEL"]) {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool(&["BHARATMART_LOG_JSON"])? {
        cfg.logging.json = v;
    }

    // CORS
    if let Some(v) = env_str(&["BHARATMART_CORS_ORIGIN", "FRONTEND_URL"]) {
        cfg.cors.allowed_origins = split_csv(&v);
    }
    if let Some(v) = env_bool(&["BHARATMART_CORS_ALLOW_ALL_ORIGINS"])? {
        cfg.cors.allow_all_origins = v;
    }

    // Database
    if let Some(v) = env_str(&["BHARATMART_DATABASE_TYPE", "DATABASE_TYPE"]) {
        cfg.database.kind = v;
    }
    if let Some(v) = env_str(&["BHARATMART_DATABASE_PATH", "DATABASE_PATH"]) {
        cfg.database.path = v;
    }
    if let Some(v) = env_str(&["BHARATMART_DATABASE_URL", "DATABASE_URL"]) {
        cfg.database.url = Some(v);
    }
    if let Some(v) = env_parse::<u32>(&["BHARATMART_DATABASE_MAX_CONNECTIONS"])? {
        cfg.database.max_connections = v;
    }
    if let Some(v) = env_str(&["BHARATMART_SUPABASE_URL", "SUPABASE_URL"]) {
        cfg.database.supabase_url = Some(v);
    }
    if let Some(v) = env_str(&[
        "BHARATMART_SUPABASE_SERVICE_ROLE_KEY",
        "SUPABASE_SERVICE_ROLE_KEY",
    ]) {
        cfg.database.supabase_service_role_key = Some(v);
    }
    if let Some(v) = env_str(&["BHARATMART_ORDS_URL", "OCI_ORDS_URL"]) {
        cfg.database.ords_url = Some(v);
    }
    if let Some(v) = env_str(&["BHARATMART_ORDS_SCHEMA", "OCI_ORDS_SCHEMA"]) {
        cfg.database.ords_schema = Some(v);
    }
    if let Some(v) = env_str(&["BHARATMART_ORDS_USERNAME", "OCI_DB_USER"]) {
        cfg.database.ords_username = Some(v);
    }
    if let Some(v) = env_str(&["BHARATMART_ORDS_PASSWORD", "OCI_DB_PASSWORD"]) {
        cfg.database.ords_password = Some(v);
    }

    // Cache
    if let Some(v) = env_str(&["BHARATMART_CACHE_TYPE", "CACHE_TYPE"]) {
        cfg.cache.kind = v;
    }
    if let Some(v) = env_str(&["BHARATMART_CACHE_REDIS_URL", "CACHE_REDIS_URL"]) {
        cfg.cache.redis_url = Some(v);
    }
    if let Some(v) = env_parse::<u64>(&["BHARATMART_CACHE_DEFAULT_TTL_SECS"])? {
        cfg.cache.default_ttl_secs = Some(v);
    }

    // Queue
    if let Some(v) = env_str(&["BHARATMART_QUEUE_BROKER"]) {
        cfg.queue.broker = v;
    }
    if let Some(v) = env_str(&["BHARATMART_REDIS_URL", "REDIS_URL"]) {
        cfg.queue.redis_url = Some(v);
    }
    if let Some(v) = env_parse::<u64>(&["BHARATMART_QUEUE_POLL_INTERVAL_MS"])? {
        cfg.queue.poll_interval_ms = v;
    }
    if let Some(v) = env_parse::<u64>(&["BHARATMART_QUEUE_JOB_TIMEOUT_SECS"])? {
        cfg.queue.job_timeout_secs = v;
    }
    if let Some(v) = env_parse::<u64>(&["BHARATMART_QUEUE_EMAIL_DELAY_MS"])? {
        cfg.queue.email_delay_ms = v;
    }

    // Auth
    if let Some(v) = env_str(&["BHARATMART_JWT_SECRET", "JWT_SECRET"]) {
        cfg.auth.jwt_secret = Some(v);
    }
    if let Some(v) = env_str(&["BHARATMART_JWT_EXPIRY", "JWT_EXPIRY"]) {
        cfg.auth.access_token_ttl = v;
    }
    if let Some(v) = env_str(&["BHARATMART_JWT_REFRESH_EXPIRY", "JWT_REFRESH_EXPIRY"]) {
        cfg.auth.refresh_token_ttl = v;
    }

    // Admin bootstrap
    if let Some(v) = env_str(&["BHARATMART_ADMIN_EMAIL", "ADMIN_EMAIL"]) {
        cfg.admin.email = Some(v);
    }
    if let Some(v) = env_str(&["BHARATMART_ADMIN_PASSWORD", "ADMIN_PASSWORD"]) {
        cfg.admin.password = Some(v);
    }

    Ok(())
}

#[inline]
fn is_blank(v: &Option<String>) -> bool {
    v.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true)
}

fn require(v: &Option<String>, what: &str) -> Result<(), ConfigError> {
    if is_blank(v) {
        return Err(ConfigError::Validation(format!("{} must be set", what)));
    }
    Ok(())
}

fn validate_http_url(raw: &str, what: &str) -> Result<(), ConfigError> {
    let u = url::Url::parse(raw)
        .map_err(|_| ConfigError::Validation(format!("invalid {}: {}", what, raw)))?;
    if u.scheme() != "http" && u.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} must be http or https: {}",
            what, raw
        )));
    }
    Ok(())
}

/// Validate the resolved configuration. Missing settings required by the
/// selected backends are reported here so the process can exit before
/// opening any connection.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    let host_ok = cfg.server.host.parse::<std::net::IpAddr>().is_ok()
        || HOSTNAME_REGEX.is_match(&cfg.server.host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid server.host: {}",
            cfg.server.host
        )));
    }

    // Unknown database kinds are resolved to sqlite by the adapter factory.
    match cfg.database.kind.trim().to_ascii_lowercase().as_str() {
        "postgresql" | "postgres" => require(&cfg.database.url, "database.url")?,
        "supabase" => {
            require(&cfg.database.supabase_url, "database.supabase_url")?;
            require(
                &cfg.database.supabase_service_role_key,
                "database.supabase_service_role_key",
            )?;
            if let Some(u) = &cfg.database.supabase_url {
                validate_http_url(u, "database.supabase_url")?;
            }
            let key = cfg
                .database
                .supabase_service_role_key
                .as_deref()
                .unwrap_or_default();
            if !key.starts_with(JWT_PREFIX) {
                return Err(ConfigError::Validation(
                    "database.supabase_service_role_key does not look like a JWT".into(),
                ));
            }
        }
        "oci-autonomous" | "oci" => {
            require(&cfg.database.ords_url, "database.ords_url")?;
            require(&cfg.database.ords_schema, "database.ords_schema")?;
            if let Some(u) = &cfg.database.ords_url {
                validate_http_url(u, "database.ords_url")?;
            }
        }
        _ => {
            if cfg.database.path.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "database.path must not be empty".into(),
                ));
            }
        }
    }
    if cfg.database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be > 0".into(),
        ));
    }

    if cfg.cache.kind.eq_ignore_ascii_case("redis") {
        require(&cfg.cache.redis_url, "cache.redis_url")?;
    }

    match cfg.queue.broker.to_ascii_lowercase().as_str() {
        "memory" => {}
        "redis" => require(&cfg.queue.redis_url, "queue.redis_url")?,
        other => {
            return Err(ConfigError::Validation(format!(
                "unsupported queue broker: {}",
                other
            )))
        }
    }
    if cfg.queue.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "queue.poll_interval_ms must be > 0".into(),
        ));
    }

    if cfg.is_production() {
        require(&cfg.auth.jwt_secret, "auth.jwt_secret")?;
    }
    cfg.auth.access_ttl()?;
    cfg.auth.refresh_ttl()?;

    for origin in &cfg.cors.allowed_origins {
        if origin == "*" {
            continue;
        }
        validate_http_url(origin, "CORS origin")?;
    }
    Ok(())
}
