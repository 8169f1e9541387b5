use std::{collections::HashMap, fmt, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use sqlx::postgres::PgConnectOptions;

pub const DEFAULT_CONFIG_PATH: &str = "application.conf";
pub const DEFAULT_HTTP_PORT: u16 = 8888;
pub const DEFAULT_POOL_SIZE: u32 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

/// Flat key/value settings, e.g. `db.host` -> `localhost`.
pub type Properties = HashMap<String, String>;

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
}

impl AppConfig {
    /// Reads `application.conf` (or `$APP_CONFIG`), overlays the process
    /// environment and resolves `${VAR}` references.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("APP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut props = read_properties_file(Path::new(&path))?;
        overlay_env(&mut props, std::env::vars());
        let props = substitute_env(props, |name| std::env::var(name).ok());
        Self::from_properties(&props)
    }

    pub fn from_properties(props: &Properties) -> anyhow::Result<Self> {
        let database = DatabaseConfig {
            host: optional(props, "db.host").unwrap_or_else(|| "localhost".into()),
            port: parse_or(props, "db.port", 5432)?,
            database: required(props, "db.database")?,
            user: required(props, "db.user")?,
            password: required(props, "db.password")?,
            max_connections: parse_or(props, "db.pool.max_size", DEFAULT_POOL_SIZE)?,
            acquire_timeout: Duration::from_millis(parse_or(
                props,
                "db.pool.acquire_timeout_ms",
                DEFAULT_ACQUIRE_TIMEOUT_MS,
            )?),
        };
        if database.max_connections == 0 {
            return Err(anyhow!("db.pool.max_size must be at least 1"));
        }
        let http = HttpConfig {
            host: optional(props, "http.host").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(props, "http.port", DEFAULT_HTTP_PORT)?,
        };
        Ok(Self { database, http })
    }
}

fn optional(props: &Properties, key: &str) -> Option<String> {
    props
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(props: &Properties, key: &str) -> anyhow::Result<String> {
    optional(props, key).ok_or_else(|| anyhow!("missing configuration key: {}", key))
}

fn parse_or<T>(props: &Properties, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match optional(props, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("invalid value for {}: {}", key, e)),
        None => Ok(default),
    }
}

/// Missing file yields an empty set of properties.
pub fn read_properties_file(path: &Path) -> anyhow::Result<Properties> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_properties(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using environment only");
            Ok(Properties::new())
        }
        Err(e) => Err(e).with_context(|| format!("read config file {}", path.display())),
    }
}

pub fn parse_properties(text: &str) -> Properties {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('!'))
        .filter_map(|l| {
            let idx = l.find(['=', ':'])?;
            let (key, value) = l.split_at(idx);
            Some((key.trim().to_string(), value[1..].trim().to_string()))
        })
        .collect()
}

/// Environment wins over the file. A key such as `db.host` is matched both
/// verbatim and as `DB_HOST`.
pub fn overlay_env<I>(props: &mut Properties, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let env: HashMap<String, String> = vars.into_iter().collect();
    for key in props.keys().cloned().chain(known_keys()).collect::<Vec<_>>() {
        let value = env.get(&key).or_else(|| env.get(&env_name(&key)));
        if let Some(v) = value {
            props.insert(key, v.clone());
        }
    }
}

fn known_keys() -> impl Iterator<Item = String> {
    [
        "db.host",
        "db.port",
        "db.database",
        "db.user",
        "db.password",
        "db.pool.max_size",
        "db.pool.acquire_timeout_ms",
        "http.host",
        "http.port",
    ]
    .into_iter()
    .map(String::from)
}

fn env_name(key: &str) -> String {
    key.replace('.', "_").to_uppercase()
}

/// Replaces values of the exact form `${VAR}`. Unset variables leave the value as is.
pub fn substitute_env<F>(props: Properties, lookup: F) -> Properties
where
    F: Fn(&str) -> Option<String>,
{
    props
        .into_iter()
        .map(|(key, value)| {
            let resolved = value
                .strip_prefix("${")
                .and_then(|rest| rest.strip_suffix('}'))
                .and_then(|name| lookup(name))
                .unwrap_or(value);
            (key, resolved)
        })
        .collect()
}
