use std::env::VarError;
use std::time::Duration;

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::{Deserialize, Serialize};

use crate::auth::CookieMatch;
use crate::error::ConfigError;

/// Default request deadline for one scan-and-fetch sequence.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Network address and credentials of the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
        }
    }
}

impl StoreConfig {
    /// Load the store address from `REDIS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load the store address from a custom variable reader, so tests can
    /// supply variables without touching the process environment.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let defaults = Self::default();

        let host = reader("REDIS_HOST").unwrap_or(defaults.host);
        let port = parse_var(&reader, "REDIS_PORT")?.unwrap_or(defaults.port);
        let db = parse_var(&reader, "REDIS_DB")?.unwrap_or(defaults.db);
        let password = reader("REDIS_PASSWORD").ok().filter(|p| !p.is_empty());

        Ok(Self {
            host,
            port,
            db,
            password,
        })
    }

    /// Connection parameters for `redis::Client::open`. Built field by field
    /// so passwords never need URL escaping.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }

    /// `host:port`, safe to log.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Tuning knobs of the session validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Deadline for the whole scan-and-fetch sequence of one request.
    pub timeout: Duration,
    /// `COUNT` hint passed with every scan step; `None` leaves it to the store.
    pub scan_count: Option<usize>,
    /// How the candidate cookie is compared with stored tokens.
    pub cookie_match: CookieMatch,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            scan_count: None,
            cookie_match: CookieMatch::default(),
        }
    }
}

impl ValidatorConfig {
    /// Load validator settings from `AUTH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let defaults = Self::default();

        let timeout = parse_var::<u64, _>(&reader, "AUTH_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout);
        let scan_count = parse_var(&reader, "AUTH_SCAN_COUNT")?;
        let cookie_match = parse_var(&reader, "AUTH_COOKIE_MATCH")?.unwrap_or(defaults.cookie_match);

        if timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "AUTH_TIMEOUT_MS".into(),
                "must be greater than zero".into(),
            ));
        }

        Ok(Self {
            timeout,
            scan_count,
            cookie_match,
        })
    }
}

/// Parse an optional variable; absent means `None`, unparsable is an error.
fn parse_var<T, F>(reader: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, VarError>,
{
    match reader(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}
