use serial_test::serial;
use std::env;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use ua_batch_publisher::app::{Config, ConfigError, LogFormat, LogLevel};
use ua_batch_publisher::engine::{BatchMode, EngineConfig};

const ENV_VARS: &[&str] = &[
    "PUBLISHER_ID",
    "SINK_ENDPOINT",
    "SEND_INTERVAL_SECS",
    "MAX_BATCH_BYTES",
    "RESERVED_OVERHEAD_BYTES",
    "QUEUE_CAPACITY",
    "DROP_REPORT_EVERY",
    "FORWARD_BAD_STATUS",
    "DIAGNOSTICS_INTERVAL_SECS",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "ENABLE_METRICS",
    "METRICS_PORT",
    "CONNECTION_TIMEOUT_SECS",
    "SEND_RETRY_ATTEMPTS",
    "CONFIG_FILE",
];

fn clean_all_env_vars() {
    unsafe {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }
}

#[test]
#[serial]
fn test_config_from_args() {
    clean_all_env_vars();
    let args = [
        "ua-batch-publisher",
        "--publisher-id",
        "line-4",
        "--sink-endpoint",
        "http://collector:9000/ingest",
        "--send-interval-secs",
        "5",
        "--max-batch-bytes",
        "1000",
        "--queue-capacity",
        "2",
        "--log-level",
        "debug",
        "--log-format",
        "json",
    ];

    let config = Config::from_args(args).unwrap();

    assert_eq!(config.publisher_id.as_deref(), Some("line-4"));
    assert_eq!(config.sink_endpoint, "http://collector:9000/ingest");
    assert_eq!(config.send_interval, Duration::from_secs(5));
    assert_eq!(config.queue_capacity, 2);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.log_format, LogFormat::Json);

    let engine = EngineConfig::from(&config);
    assert_eq!(engine.scheduler().mode(), BatchMode::Batched { budget: 488 });
}

#[test]
#[serial]
fn test_publisher_id_defaults_to_host_name() {
    clean_all_env_vars();
    let config = Config::from_args(["ua-batch-publisher"]).unwrap();

    let id = config.publisher_id.unwrap();
    assert!(!id.is_empty());
}

#[test]
#[serial]
fn test_config_from_environment() {
    clean_all_env_vars();
    unsafe {
        env::set_var("PUBLISHER_ID", "from-env");
        env::set_var("SEND_INTERVAL_SECS", "0");
        env::set_var("MAX_BATCH_BYTES", "0");
        env::set_var("QUEUE_CAPACITY", "64");
        env::set_var("LOG_LEVEL", "WARN");
        env::set_var("FORWARD_BAD_STATUS", "true");
    }

    let config = Config::from_env().unwrap();
    clean_all_env_vars();

    assert_eq!(config.publisher_id.as_deref(), Some("from-env"));
    assert!(config.is_single_message());
    assert_eq!(config.queue_capacity, 64);
    assert_eq!(config.log_level, LogLevel::Warn);
    assert!(config.forward_bad_status);
}

#[test]
#[serial]
fn test_invalid_environment_value_is_reported() {
    clean_all_env_vars();
    unsafe {
        env::set_var("QUEUE_CAPACITY", "lots");
    }

    let result = Config::from_env();
    clean_all_env_vars();

    assert!(matches!(result, Err(ConfigError::EnvError(_))));
}

#[test]
#[serial]
fn test_invalid_log_level_in_environment() {
    clean_all_env_vars();
    unsafe {
        env::set_var("LOG_LEVEL", "verbose");
    }

    let result = Config::from_env();
    clean_all_env_vars();

    assert!(matches!(result, Err(ConfigError::EnvError(_))));
}

#[test]
fn test_config_from_file_keeps_defaults_for_missing_keys() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
publisher_id = "plant-a"
sink_endpoint = "https://hub.example.com/api/batches"
send_interval_secs = 2
queue_capacity = 500
log_format = "json"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.publisher_id.as_deref(), Some("plant-a"));
    assert_eq!(config.send_interval, Duration::from_secs(2));
    assert_eq!(config.queue_capacity, 500);
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.max_batch_bytes, Config::default().max_batch_bytes);
    assert_eq!(config.diagnostics_interval, Duration::from_secs(30));
}

#[test]
fn test_config_file_with_invalid_values_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "queue_capacity = 0").unwrap();

    assert!(matches!(
        Config::from_file(file.path()),
        Err(ConfigError::InvalidConfig(_))
    ));
}

#[test]
fn test_malformed_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "queue_capacity = ").unwrap();

    assert!(matches!(
        Config::from_file(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_missing_config_file() {
    assert!(matches!(
        Config::from_file("/nonexistent/ua-batch-publisher.toml"),
        Err(ConfigError::FileError(_))
    ));
}

#[test]
#[serial]
fn test_args_with_config_file_prefer_cli_publisher_id() {
    clean_all_env_vars();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "publisher_id = \"file-id\"\nmax_batch_bytes = 4096").unwrap();
    let path = file.path().to_string_lossy().to_string();

    let config = Config::from_args_and_env([
        "ua-batch-publisher",
        "--config-file",
        path.as_str(),
        "--publisher-id",
        "cli-id",
    ])
    .unwrap();

    assert_eq!(config.publisher_id.as_deref(), Some("cli-id"));
    assert_eq!(config.max_batch_bytes, 4096);
    assert_eq!(config.config_file.as_deref(), Some(file.path()));
}

#[test]
#[serial]
fn test_explicit_cli_and_env_values_override_config_file() {
    clean_all_env_vars();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "send_interval_secs = 7\nqueue_capacity = 50\ndrop_report_every = 3\nmetrics_port = 9100"
    )
    .unwrap();
    let path = file.path().to_string_lossy().to_string();

    unsafe {
        env::set_var("DROP_REPORT_EVERY", "11");
    }
    let config = Config::from_args_and_env([
        "ua-batch-publisher",
        "--send-interval-secs",
        "2",
        "--queue-capacity",
        "9",
        "--config-file",
        path.as_str(),
    ])
    .unwrap();
    clean_all_env_vars();

    assert_eq!(config.send_interval_secs, 2);
    assert_eq!(config.send_interval, Duration::from_secs(2));
    assert_eq!(config.queue_capacity, 9);
    assert_eq!(config.drop_report_every, 11);
    // untouched on the command line, so the file value stays
    assert_eq!(config.metrics_port, 9100);
}

#[test]
#[serial]
fn test_explicit_zero_interval_is_not_replaced_by_file() {
    clean_all_env_vars();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "send_interval_secs = 7").unwrap();
    let path = file.path().to_string_lossy().to_string();

    let config = Config::from_args_and_env([
        "ua-batch-publisher",
        "--send-interval-secs",
        "0",
        "--config-file",
        path.as_str(),
    ])
    .unwrap();

    assert_eq!(config.send_interval, Duration::ZERO);
}

#[test]
#[serial]
fn test_rejects_ceiling_below_overhead() {
    clean_all_env_vars();
    let result = Config::from_args([
        "ua-batch-publisher",
        "--max-batch-bytes",
        "400",
        "--reserved-overhead-bytes",
        "512",
    ]);

    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}
