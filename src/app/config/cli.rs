use super::serde_helpers::{
    load_env_enum, load_env_path_opt, load_env_string, load_env_string_opt, load_env_var,
};
use super::{ConfigError, LogFormat, LogLevel};
use crate::buffer::DEFAULT_DROP_REPORT_EVERY;
use crate::engine::{DEFAULT_MAX_BATCH_BYTES, DEFAULT_RESERVED_OVERHEAD};
use crate::sender::{HttpSinkConfig, RetryConfig};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const FALLBACK_PUBLISHER_ID: &str = "ua-batch-publisher";

/// Copy each listed field from `$cli` into `$config` if it was set on the
/// command line or in the environment rather than left at its default.
macro_rules! prefer_explicit {
    ($matches:ident, $config:ident, $cli:ident, $($field:ident),+ $(,)?) => {
        $(
            if is_explicit(&$matches, stringify!($field)) {
                $config.$field = $cli.$field;
            }
        )+
    };
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Publisher id written into every batch (defaults to the host name)
    #[arg(long, env = "PUBLISHER_ID")]
    pub publisher_id: Option<String>,

    /// Endpoint batches are POSTed to
    #[arg(long, env = "SINK_ENDPOINT", default_value = "http://localhost:8080/ingest")]
    pub sink_endpoint: String,

    /// Seconds between deadline flushes (0 disables the deadline)
    #[arg(long, env = "SEND_INTERVAL_SECS", default_value = "10")]
    pub send_interval_secs: u64,

    /// Hard ceiling for one batch in bytes (0 = no explicit ceiling)
    #[arg(long, env = "MAX_BATCH_BYTES", default_value = "262144")]
    pub max_batch_bytes: usize,

    /// Bytes of the ceiling held back for framing
    #[arg(long, env = "RESERVED_OVERHEAD_BYTES", default_value = "512")]
    pub reserved_overhead_bytes: usize,

    /// Capacity of the intake queue
    #[arg(long, env = "QUEUE_CAPACITY", default_value = "8192")]
    pub queue_capacity: usize,

    /// Log one aggregated error every N dropped notifications (0 = never)
    #[arg(long, env = "DROP_REPORT_EVERY", default_value = "10000")]
    pub drop_report_every: u64,

    /// Forward data changes with a bad status code instead of filtering them
    #[arg(long, env = "FORWARD_BAD_STATUS")]
    pub forward_bad_status: bool,

    /// Seconds between diagnostics log lines (0 disables them)
    #[arg(long, env = "DIAGNOSTICS_INTERVAL_SECS", default_value = "30")]
    pub diagnostics_interval_secs: u64,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint
    #[arg(long, env = "ENABLE_METRICS")]
    pub enable_metrics: bool,

    /// Prometheus endpoint port
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    pub metrics_port: u16,

    /// HTTP request timeout in seconds
    #[arg(long, env = "CONNECTION_TIMEOUT_SECS", default_value = "30")]
    pub connection_timeout_secs: u64,

    /// Attempts per batch before the sink gives up
    #[arg(long, env = "SEND_RETRY_ATTEMPTS", default_value = "3")]
    pub send_retry_attempts: u32,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub send_interval: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub diagnostics_interval: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub connection_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            publisher_id: None,
            sink_endpoint: "http://localhost:8080/ingest".to_string(),
            send_interval_secs: 10,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            reserved_overhead_bytes: DEFAULT_RESERVED_OVERHEAD,
            queue_capacity: 8192,
            drop_report_every: DEFAULT_DROP_REPORT_EVERY,
            forward_bad_status: false,
            diagnostics_interval_secs: 30,
            log_level: LogLevel::Info,
            log_format: LogFormat::Text,
            enable_metrics: false,
            metrics_port: 9090,
            connection_timeout_secs: 30,
            send_retry_attempts: 3,
            config_file: None,
            send_interval: Duration::from_secs(10),
            diagnostics_interval: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::parse_from(args);
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse CLI arguments (clap falls back to the environment). When a
    /// config file is named it provides the base, and only values given on
    /// the command line or through the environment override it.
    pub fn from_args_and_env<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Config::command().get_matches_from(args);
        let cli = Config::from_arg_matches(&matches)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

        let Some(path) = cli.config_file.clone() else {
            let mut config = cli;
            config.post_process()?;
            config.validate()?;
            return Ok(config);
        };

        let mut config = Self::from_file(&path)?;
        config.config_file = Some(path);
        prefer_explicit!(
            matches,
            config,
            cli,
            publisher_id,
            sink_endpoint,
            send_interval_secs,
            max_batch_bytes,
            reserved_overhead_bytes,
            queue_capacity,
            drop_report_every,
            forward_bad_status,
            diagnostics_interval_secs,
            log_level,
            log_format,
            enable_metrics,
            metrics_port,
            connection_timeout_secs,
            send_retry_attempts,
        );
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        load_env_string_opt("PUBLISHER_ID", &mut config.publisher_id);
        load_env_string("SINK_ENDPOINT", &mut config.sink_endpoint);
        load_env_var("SEND_INTERVAL_SECS", &mut config.send_interval_secs)?;
        load_env_var("MAX_BATCH_BYTES", &mut config.max_batch_bytes)?;
        load_env_var("RESERVED_OVERHEAD_BYTES", &mut config.reserved_overhead_bytes)?;
        load_env_var("QUEUE_CAPACITY", &mut config.queue_capacity)?;
        load_env_var("DROP_REPORT_EVERY", &mut config.drop_report_every)?;
        load_env_var("FORWARD_BAD_STATUS", &mut config.forward_bad_status)?;
        load_env_var("DIAGNOSTICS_INTERVAL_SECS", &mut config.diagnostics_interval_secs)?;
        load_env_enum("LOG_LEVEL", &mut config.log_level)?;
        load_env_enum("LOG_FORMAT", &mut config.log_format)?;
        load_env_var("ENABLE_METRICS", &mut config.enable_metrics)?;
        load_env_var("METRICS_PORT", &mut config.metrics_port)?;
        load_env_var("CONNECTION_TIMEOUT_SECS", &mut config.connection_timeout_secs)?;
        load_env_var("SEND_RETRY_ATTEMPTS", &mut config.send_retry_attempts)?;
        load_env_path_opt("CONFIG_FILE", &mut config.config_file);

        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        self.send_interval = Duration::from_secs(self.send_interval_secs);
        self.diagnostics_interval = Duration::from_secs(self.diagnostics_interval_secs);
        self.connection_timeout = Duration::from_secs(self.connection_timeout_secs);

        if self.publisher_id.is_none() {
            self.publisher_id = Some(detect_publisher_id());
        }

        Ok(())
    }

    /// True when every notification is sent on its own.
    pub fn is_single_message(&self) -> bool {
        self.send_interval_secs == 0 && self.max_batch_bytes == 0
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.send_retry_attempts,
            ..RetryConfig::default()
        }
    }

    pub fn http_sink_config(&self) -> HttpSinkConfig {
        HttpSinkConfig {
            endpoint: self.sink_endpoint.clone(),
            timeout: self.connection_timeout,
            retry: self.retry_config(),
            ..HttpSinkConfig::default()
        }
    }
}

fn is_explicit(matches: &ArgMatches, id: &str) -> bool {
    matches!(
        matches.value_source(id),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    )
}

fn detect_publisher_id() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_PUBLISHER_ID.to_string())
}
