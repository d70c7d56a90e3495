use std::collections::HashMap;
use std::env;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::batch::DEFAULT_ITEM_CAP;

const PREFIX: &str = "METRIC_BATCHER_";

const ENDPOINT: &str = "ENDPOINT";
const LISTENER_PORT: &str = "LISTENER_PORT";
const ITEM_CAP: &str = "ITEM_CAP";
const FLUSH_INTERVAL_MS: &str = "FLUSH_INTERVAL_MS";
const EXPORT_TIMEOUT_MS: &str = "EXPORT_TIMEOUT_MS";
const COMPRESSION: &str = "COMPRESSION";
const EXPORT_HEADERS: &str = "EXPORT_HEADERS";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Compression {
    Gzip,
    None,
}

/// Every variant names the full environment variable at fault.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required but not set")]
    EndpointMissing(String),

    #[error("{0} is not a valid URL: {1}")]
    EndpointInvalidUrl(String, String),

    #[error("{0} has invalid value: {1}")]
    InvalidNumeric(String, String),

    #[error("{0} must be greater than zero")]
    Zero(String),

    #[error("{0} has invalid value: {1} (expected \"gzip\" or \"none\")")]
    InvalidCompression(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Url,
    pub listener_port: u16,
    pub item_cap: NonZeroUsize,
    pub flush_interval: Duration,
    pub export_timeout: Duration,
    pub compression: Compression,
    pub export_headers: Vec<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> =
            env::vars().filter(|(k, _)| k.starts_with(PREFIX)).collect();
        Self::parse(&vars)
    }

    /// Build a config from `METRIC_BATCHER_*` variables; unknown keys are ignored.
    pub fn parse(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let vars = Vars(vars);
        let flush_interval = vars.millis(FLUSH_INTERVAL_MS, 60_000)?;
        if flush_interval.is_zero() {
            return Err(ConfigError::Zero(var_name(FLUSH_INTERVAL_MS)));
        }

        Ok(Self {
            endpoint: vars.endpoint()?,
            listener_port: vars.number(LISTENER_PORT)?.unwrap_or(4320),
            item_cap: vars.item_cap()?,
            flush_interval,
            export_timeout: vars.millis(EXPORT_TIMEOUT_MS, 5000)?,
            compression: vars.compression()?,
            export_headers: vars.headers(),
        })
    }
}

fn var_name(key: &str) -> String {
    format!("{PREFIX}{key}")
}

/// Lookup by unprefixed key.
struct Vars<'a>(&'a HashMap<String, String>);

impl Vars<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&var_name(key)).map(String::as_str)
    }

    fn number<N: FromStr>(&self, key: &str) -> Result<Option<N>, ConfigError> {
        self.get(key)
            .map(|val| {
                val.parse()
                    .map_err(|_| ConfigError::InvalidNumeric(var_name(key), val.to_owned()))
            })
            .transpose()
    }

    fn endpoint(&self) -> Result<Url, ConfigError> {
        let raw = self
            .get(ENDPOINT)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::EndpointMissing(var_name(ENDPOINT)))?;
        Url::parse(raw)
            .map_err(|_| ConfigError::EndpointInvalidUrl(var_name(ENDPOINT), raw.to_owned()))
    }

    fn item_cap(&self) -> Result<NonZeroUsize, ConfigError> {
        match self.number::<usize>(ITEM_CAP)? {
            None => Ok(DEFAULT_ITEM_CAP),
            Some(cap) => {
                NonZeroUsize::new(cap).ok_or_else(|| ConfigError::Zero(var_name(ITEM_CAP)))
            }
        }
    }

    fn millis(&self, key: &str, default_ms: u64) -> Result<Duration, ConfigError> {
        let ms = self.number(key)?.unwrap_or(default_ms);
        Ok(Duration::from_millis(ms))
    }

    fn compression(&self) -> Result<Compression, ConfigError> {
        match self.get(COMPRESSION) {
            Some("gzip") | None => Ok(Compression::Gzip),
            Some("none") => Ok(Compression::None),
            Some(other) => Err(ConfigError::InvalidCompression(
                var_name(COMPRESSION),
                other.to_owned(),
            )),
        }
    }

    /// `k1=v1,k2=v2`; pairs without `=` or with an empty key are skipped.
    fn headers(&self) -> Vec<(String, String)> {
        let Some(raw) = self.get(EXPORT_HEADERS) else {
            return Vec::new();
        };
        raw.split(',')
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=')?;
                let k = k.trim();
                (!k.is_empty()).then(|| (k.to_owned(), v.trim().to_owned()))
            })
            .collect()
    }
}
