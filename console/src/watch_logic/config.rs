use clap::Parser;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use lib_livemap::{CatalogConfig, FeedConfig, TrackerConfig};

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Live transit map watcher: prints vehicles, visible lines and the selected bus", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "LIVEMAP_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "LIVEMAP_API_URL", help = "Base address of the traffic server (http or https).")]
    pub api_url: Option<String>,

    #[clap(long, env = "LIVEMAP_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "LIVEMAP_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "LIVEMAP_RETRY_DELAY_MS", help = "Fixed delay in milliseconds between feed reconnect attempts.")]
    pub retry_delay_ms: Option<u64>,

    #[clap(long, env = "LIVEMAP_HTTP_RETRIES", help = "Transient-failure retries for catalog requests.")]
    pub http_retries: Option<u32>,

    #[clap(long, env = "LIVEMAP_HTTP_TIMEOUT_MS", help = "Timeout in milliseconds for catalog requests.")]
    pub http_timeout_ms: Option<u64>,

    #[clap(long, env = "LIVEMAP_MARKER_TTL_SECONDS", help = "Drop vehicles that stopped reporting for this many seconds (0 keeps them).")]
    pub marker_ttl_seconds: Option<u64>,

    #[clap(long, env = "LIVEMAP_RENDER_INTERVAL_MS", help = "Minimum interval in milliseconds between two screen refreshes.")]
    pub render_interval_ms: Option<u64>,

    #[clap(long = "line", env = "LIVEMAP_LINES", value_delimiter = ',', help = "Line ids to show on start (repeatable or comma separated).")]
    pub lines: Option<Vec<String>>,

    #[clap(long, env = "LIVEMAP_SELECT", help = "Vehicle id to select on start.")]
    pub select: Option<String>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            api_url: other.api_url.or(self.api_url),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            retry_delay_ms: other.retry_delay_ms.or(self.retry_delay_ms),
            http_retries: other.http_retries.or(self.http_retries),
            http_timeout_ms: other.http_timeout_ms.or(self.http_timeout_ms),
            marker_ttl_seconds: other.marker_ttl_seconds.or(self.marker_ttl_seconds),
            render_interval_ms: other.render_interval_ms.or(self.render_interval_ms),
            lines: other.lines.or(self.lines),
            select: other.select.or(self.select),
        }
    }

    fn defaults() -> Config {
        Config {
            api_url: Some("http://localhost:8000".to_string()),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            retry_delay_ms: Some(10),
            http_retries: Some(0),
            http_timeout_ms: Some(10_000),
            marker_ttl_seconds: Some(0),
            render_interval_ms: Some(250),
            ..Default::default()
        }
    }

    pub fn api_url(&self) -> String {
        self.api_url.clone().unwrap_or_default()
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.unwrap_or(250))
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            base_address: self.api_url(),
            retry_delay: Duration::from_millis(self.retry_delay_ms.unwrap_or(10)),
        }
    }

    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig {
            base_address: self.api_url(),
            max_retries: self.http_retries.unwrap_or(0),
            request_timeout: Duration::from_millis(self.http_timeout_ms.unwrap_or(10_000)),
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            marker_ttl: self
                .marker_ttl_seconds
                .filter(|seconds| *seconds > 0)
                .map(Duration::from_secs),
        }
    }
}

pub fn load_config() -> Config {
    load_config_from(std::env::args_os())
}

/// Layers defaults, the JSON config file and env / CLI arguments, in that order.
pub fn load_config_from<I, T>(args: I) -> Config
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    // 1. Load defaults
    let mut current_config = Config::defaults();

    // 2. Parse env / CLI once; it may point at another config file.
    let cli_args = Config::parse_from(args);

    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("livemap.conf"));

    // 3. Load from the config file if present
    if config_file_path.exists() {
        match fs::read_to_string(&config_file_path) {
            Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
                Ok(file_config) => current_config = current_config.merge(file_config),
                Err(e) => log::warn!(
                    "Failed to parse config file {}: {}. Falling back to other sources.",
                    config_file_path.display(),
                    e
                ),
            },
            Err(e) => log::warn!(
                "Failed to read config file {}: {}. Falling back to other sources.",
                config_file_path.display(),
                e
            ),
        }
    } else {
        log::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        );
    }

    // 4. Environment variables and CLI arguments win
    current_config.merge(cli_args)
}
