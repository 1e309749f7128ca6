//! Service configuration.
//!
//! # Contract
//! - Resolved **once** at startup into a [`CartConfig`] that is passed into
//!   constructors. Nothing else in the workspace reads the environment.
//! - Layering: built-in defaults < YAML file named by `CART_CONFIG` < env.
//! - Secrets (`JWTSECRET`, `DATABASEURL`) come from the environment only.
//!   The YAML schema has no field for them and rejects unknown keys.
//! - `Debug` output redacts secrets; errors name the variable, never the
//!   value.
//! - Every resolver takes a `lookup` function instead of reading
//!   `std::env` directly, so tests never mutate process state.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const ENV_PORT: &str = "PORT";
pub const ENV_BIND_HOST: &str = "CART_BIND_HOST";
pub const ENV_SESSION_SECRET: &str = "JWTSECRET";
pub const ENV_DATABASE_URL: &str = "DATABASEURL";
pub const ENV_DB_MAX_CONNECTIONS: &str = "CART_DB_MAX_CONNECTIONS";
pub const ENV_DB_ACQUIRE_TIMEOUT_SECS: &str = "CART_DB_ACQUIRE_TIMEOUT_SECS";
pub const ENV_AUTO_MIGRATE: &str = "CART_AUTO_MIGRATE";
pub const ENV_CONFIG_PATH: &str = "CART_CONFIG";

pub const DEFAULT_PORT: u16 = 8082;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A string that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<REDACTED>")
    }
}

// ---------------------------------------------------------------------------
// Resolved config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CartConfig {
    pub bind_addr: SocketAddr,
    pub db: DbSettings,
    /// HS256 key shared with the user service.
    pub session_secret: Secret,
}

#[derive(Debug, Clone)]
pub struct DbSettings {
    pub url: Secret,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Apply embedded migrations when the daemon boots.
    pub auto_migrate: bool,
}

// ---------------------------------------------------------------------------
// YAML layer
// ---------------------------------------------------------------------------

/// Non-secret settings that may be kept in a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub db: DbSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbSection {
    pub max_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub auto_migrate: Option<bool>,
}

pub fn parse_file_config(yaml: &str) -> Result<FileConfig> {
    if yaml.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(yaml).context("CONFIG_INVALID: yaml does not match the config schema")
}

/// Read the file named by `CART_CONFIG`, or defaults when unset.
pub fn load_file_config<F>(lookup: &F) -> Result<FileConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(path) = non_blank(lookup, ENV_CONFIG_PATH) else {
        return Ok(FileConfig::default());
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file: {path}"))?;
    parse_file_config(&raw).with_context(|| format!("in config file: {path}"))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve the complete daemon configuration.
pub fn resolve<F>(lookup: F) -> Result<CartConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file = load_file_config(&lookup)?;
    resolve_layered(&file, &lookup)
}

/// Resolve the complete daemon configuration from the process environment.
pub fn from_env() -> Result<CartConfig> {
    resolve(|k| std::env::var(k).ok())
}

pub fn resolve_layered<F>(file: &FileConfig, lookup: &F) -> Result<CartConfig>
where
    F: Fn(&str) -> Option<String>,
{
    // Both secrets are checked before anything else so a misconfigured
    // deployment reports every missing variable name up front.
    let session_secret = resolve_session_secret(lookup);
    let db = resolve_db(file, lookup);
    let (session_secret, db) = match (session_secret, db) {
        (Ok(s), Ok(d)) => (s, d),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
        (Err(a), Err(b)) => bail!("{a}; {b}"),
    };

    let host = match non_blank(lookup, ENV_BIND_HOST) {
        Some(raw) => parse_env::<IpAddr>(ENV_BIND_HOST, &raw)?,
        None => file
            .server
            .host
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
    };
    let port = match non_blank(lookup, ENV_PORT) {
        Some(raw) => parse_env::<u16>(ENV_PORT, &raw)?,
        None => file.server.port.unwrap_or(DEFAULT_PORT),
    };

    Ok(CartConfig {
        bind_addr: SocketAddr::new(host, port),
        db,
        session_secret,
    })
}

/// `JWTSECRET`, required and non-blank. The value is the HMAC key byte for
/// byte, so it is never trimmed.
pub fn resolve_session_secret<F>(lookup: &F) -> Result<Secret>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(ENV_SESSION_SECRET) {
        Some(raw) if !raw.trim().is_empty() => Ok(Secret::new(raw)),
        _ => bail!(
            "CONFIG_MISSING: required env var '{}' (session signing key) is not set or empty",
            ENV_SESSION_SECRET
        ),
    }
}

/// Database settings: `DATABASEURL` plus pool sizing.
pub fn resolve_db<F>(file: &FileConfig, lookup: &F) -> Result<DbSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let url = required(lookup, ENV_DATABASE_URL, "postgres url")?;

    let max_connections = match non_blank(lookup, ENV_DB_MAX_CONNECTIONS) {
        Some(raw) => parse_env::<u32>(ENV_DB_MAX_CONNECTIONS, &raw)?,
        None => file.db.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
    };
    if max_connections == 0 {
        bail!("CONFIG_INVALID: db max_connections must be > 0");
    }

    let acquire_timeout_secs = match non_blank(lookup, ENV_DB_ACQUIRE_TIMEOUT_SECS) {
        Some(raw) => parse_env::<u64>(ENV_DB_ACQUIRE_TIMEOUT_SECS, &raw)?,
        None => file
            .db
            .acquire_timeout_secs
            .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS),
    };

    let auto_migrate = match non_blank(lookup, ENV_AUTO_MIGRATE) {
        Some(raw) => parse_flag(ENV_AUTO_MIGRATE, &raw)?,
        None => file.db.auto_migrate.unwrap_or(false),
    };

    Ok(DbSettings {
        url: Secret::new(url),
        max_connections,
        acquire_timeout: Duration::from_secs(acquire_timeout_secs),
        auto_migrate,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn non_blank<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, name: &str, what: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match non_blank(lookup, name) {
        Some(v) => Ok(v),
        None => bail!("CONFIG_MISSING: required env var '{name}' ({what}) is not set or empty"),
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    match raw.parse::<T>() {
        Ok(v) => Ok(v),
        Err(_) => bail!("CONFIG_INVALID: env var '{name}' has an unparseable value"),
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("CONFIG_INVALID: env var '{name}' must be a boolean flag"),
    }
}
