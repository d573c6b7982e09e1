use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_NOMAD_ADDR: &str = "http://127.0.0.1:4646";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_DETAIL_FETCH_CONCURRENCY: usize = 8;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection settings for the Nomad HTTP API.
#[derive(Debug, Clone)]
pub struct NomadConfig {
    pub address: String,
    pub namespace: String,
    /// Empty means unauthenticated.
    pub token: String,
    /// `None` leaves the transport default in place.
    pub timeout: Option<Duration>,
}

impl Default for NomadConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_NOMAD_ADDR.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            token: String::new(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub nomad: NomadConfig,
    pub cache_ttl: Duration,
    pub detail_fetch_concurrency: usize,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let nomad = NomadConfig {
            address: var("NOMAD_ADDR").unwrap_or_else(|| DEFAULT_NOMAD_ADDR.to_string()),
            namespace: var("NOMAD_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            token: var("NOMAD_TOKEN").unwrap_or_default(),
            timeout: var("NOMAD_TIMEOUT_SECS")
                .map(|v| parse_number::<u64>("NOMAD_TIMEOUT_SECS", v))
                .transpose()?
                .map(Duration::from_secs),
        };

        let cache_ttl_secs = match var("CACHE_TTL_SECS") {
            Some(v) => parse_number("CACHE_TTL_SECS", v)?,
            None => DEFAULT_CACHE_TTL_SECS,
        };

        let detail_fetch_concurrency = match var("DETAIL_FETCH_CONCURRENCY") {
            Some(v) => parse_number::<usize>("DETAIL_FETCH_CONCURRENCY", v)?.max(1),
            None => DEFAULT_DETAIL_FETCH_CONCURRENCY,
        };

        let bind_raw = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            nomad,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            detail_fetch_concurrency,
            bind_addr,
        })
    }
}

fn parse_number<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
        value,
    })
}
