use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9200;
pub const DEFAULT_PATH: &str = "/";
pub const DEFAULT_INDEX: &str = "statsd";
pub const DEFAULT_FORMATTER: &str = "default";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config is not valid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("elasticsearch bulk endpoint is not a valid URL: {0}")]
    EndpointInvalidUrl(String),

    #[error("{0} has invalid value: {1}")]
    InvalidValue(String, String),
}

/// Daemon-level config file. Only the keys this backend reads are modelled.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDaemonConfig {
    debug: Option<bool>,
    flush_interval: Option<u64>,
    elasticsearch: Option<RawElasticConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawElasticConfig {
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
    index_prefix: Option<String>,
    formatter: Option<String>,
    username: Option<String>,
    password: Option<String>,
    secure: Option<bool>,
    ca: Option<PathBuf>,
    timeout: Option<u64>,
    key_regex: Option<String>,
}

#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub index: String,
    pub formatter: String,
    pub credentials: Option<Credentials>,
    pub secure: bool,
    pub ca: Option<PathBuf>,
    pub debug: bool,
    pub flush_interval: Option<Duration>,
    pub timeout: Duration,
    pub key_regex: Option<String>,
    /// `{scheme}://{host}:{port}{path}{index}/_bulk`
    pub endpoint: Url,
}

impl BackendConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Self::parse(serde_json::from_str(raw)?)
    }

    /// Resolve the backend settings from the daemon's whole config object.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Self::parse(RawDaemonConfig::deserialize(value)?)
    }

    fn parse(raw: RawDaemonConfig) -> Result<Self, ConfigError> {
        let es = raw.elasticsearch.unwrap_or_default();

        let host = or_default(es.host, DEFAULT_HOST);
        let port = es.port.filter(|p| *p != 0).unwrap_or(DEFAULT_PORT);
        let path = parse_path(es.path);
        let index = parse_index(es.index_prefix)?;
        let formatter = or_default(es.formatter, DEFAULT_FORMATTER);
        let credentials = parse_credentials(es.username, es.password);
        let secure = es.secure.unwrap_or(false);
        let ca = es.ca.filter(|p| !p.as_os_str().is_empty());
        let timeout = parse_timeout(es.timeout);
        let key_regex = es.key_regex.filter(|s| !s.is_empty());
        let endpoint = build_endpoint(secure, &host, port, &path, &index)?;

        Ok(Self {
            host,
            port,
            path,
            index,
            formatter,
            credentials,
            secure,
            ca,
            debug: raw.debug.unwrap_or(false),
            flush_interval: raw
                .flush_interval
                .filter(|ms| *ms != 0)
                .map(Duration::from_millis),
            timeout,
            key_regex,
            endpoint,
        })
    }
}

/// Load the daemon's JSON config file as an untyped value.
pub fn read_daemon_config(path: &Path) -> Result<Value, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn parse_path(raw: Option<String>) -> String {
    let path = or_default(raw, DEFAULT_PATH);
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

fn parse_index(raw: Option<String>) -> Result<String, ConfigError> {
    let index = or_default(raw, DEFAULT_INDEX);
    if index.contains('/') {
        return Err(ConfigError::InvalidValue("indexPrefix".to_owned(), index));
    }
    Ok(index)
}

fn parse_credentials(username: Option<String>, password: Option<String>) -> Option<Credentials> {
    match (username, password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            Some(Credentials { username, password })
        }
        _ => None,
    }
}

fn parse_timeout(raw: Option<u64>) -> Duration {
    Duration::from_millis(raw.filter(|ms| *ms != 0).unwrap_or(DEFAULT_TIMEOUT_MS))
}

fn build_endpoint(
    secure: bool,
    host: &str,
    port: u16,
    path: &str,
    index: &str,
) -> Result<Url, ConfigError> {
    let scheme = if secure { "https" } else { "http" };
    let raw = format!("{scheme}://{host}:{port}{path}{index}/_bulk");
    Url::parse(&raw).map_err(|_| ConfigError::EndpointInvalidUrl(raw))
}
