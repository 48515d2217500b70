use crate::lookup::LookupClient;

use hyper::http::uri::Uri;
use serde::Deserialize;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_bookmarks_file")]
    pub bookmarks_file: PathBuf,
    #[serde(
        default = "LookupClient::default_endpoint",
        with = "http_serde::uri"
    )]
    pub endpoint: Uri,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "Config::default_lookup_timeout")]
    pub lookup_timeout: TimeoutSeconds,
    #[serde(default = "Config::default_log_level")]
    pub log_level: log::Level,
}

impl Config {
    fn default_bookmarks_file() -> PathBuf {
        "ip_bookmarks.json".into()
    }

    fn default_lookup_timeout() -> TimeoutSeconds {
        TimeoutSeconds(LookupClient::default_timeout())
    }

    fn default_log_level() -> log::Level {
        log::Level::Info
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bookmarks_file: Self::default_bookmarks_file(),
            endpoint: LookupClient::default_endpoint(),
            api_token: None,
            lookup_timeout: Self::default_lookup_timeout(),
            log_level: Self::default_log_level(),
        }
    }
}

/// Whole seconds in config, never zero.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(from = "NonZeroU64")]
pub struct TimeoutSeconds(Duration);

impl From<NonZeroU64> for TimeoutSeconds {
    fn from(secs: NonZeroU64) -> Self {
        Self(Duration::from_secs(secs.get()))
    }
}

impl From<TimeoutSeconds> for Duration {
    fn from(timeout: TimeoutSeconds) -> Self {
        timeout.0
    }
}

pub fn parse_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let toml_string = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&toml_string)?;
    Ok(config)
}
