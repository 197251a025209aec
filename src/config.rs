//! Configuration management for herakles-limit-notifier.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use herakles_limit_notifier::{DEFAULT_BADNESS_INCREMENT, DEFAULT_BADNESS_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9217;
pub const DEFAULT_INTERVAL_SECONDS: u64 = 300;
pub const DEFAULT_DISPATCH_TIMEOUT_SECONDS: u64 = 10;

/// Default config file locations, searched in order.
pub const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/herakles/limit-notifier.yaml",
    "/etc/herakles/limit-notifier.yml",
    "/etc/herakles/limit-notifier.json",
    "./herakles-limit-notifier.yaml",
    "./herakles-limit-notifier.yml",
    "./herakles-limit-notifier.json",
];

/// Tuning for one built-in limit. Unset fields use the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitConfig {
    pub enabled: Option<bool>,
    pub threshold: Option<f64>,
    pub badness_increment: Option<u32>,
    pub badness_threshold: Option<u32>,
}

impl LimitConfig {
    fn with_defaults(threshold: f64, increment: Option<u32>, badness: Option<u32>) -> Self {
        Self {
            enabled: Some(true),
            threshold: Some(threshold),
            badness_increment: increment,
            badness_threshold: badness,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// Built-in limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// 5 minute load average in percent of the CPU count (healthy below threshold)
    #[serde(default)]
    pub cpu_load: LimitConfig,
    /// Memory utilisation in percent (healthy below threshold)
    #[serde(default)]
    pub memory: LimitConfig,
    /// Used disk space in percent per mount (healthy below threshold)
    #[serde(default, alias = "disk-usage")]
    pub disk_usage: LimitConfig,
    /// Free disk space in GiB per mount (healthy above threshold)
    #[serde(default, alias = "disk-free")]
    pub disk_free: LimitConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            cpu_load: LimitConfig::with_defaults(95.0, Some(1), Some(3)),
            memory: LimitConfig::with_defaults(85.0, Some(1), Some(3)),
            disk_usage: LimitConfig::with_defaults(95.0, None, None),
            disk_free: LimitConfig::with_defaults(30.0, None, None),
        }
    }
}

/// Configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Control API
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Observer
    #[serde(alias = "interval-seconds")]
    pub interval_seconds: Option<u64>,
    /// Start the observer together with the process
    pub autostart: Option<bool>,
    #[serde(alias = "default-badness-threshold")]
    pub default_badness_threshold: Option<u32>,
    #[serde(alias = "default-badness-increment")]
    pub default_badness_increment: Option<u32>,

    // Notifications
    /// Chat webhook receiving notifications; log only when unset
    #[serde(alias = "webhook-url")]
    pub webhook_url: Option<String>,
    #[serde(alias = "webhook-username")]
    pub webhook_username: Option<String>,
    #[serde(alias = "dispatch-timeout-seconds")]
    pub dispatch_timeout_seconds: Option<u64>,
    /// Send a greeting with the system info message on startup
    pub greeting: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    // Tables last, TOML needs values before tables
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            interval_seconds: Some(DEFAULT_INTERVAL_SECONDS),
            autostart: Some(true),
            default_badness_threshold: Some(DEFAULT_BADNESS_THRESHOLD),
            default_badness_increment: Some(DEFAULT_BADNESS_INCREMENT),
            webhook_url: None,
            webhook_username: None,
            dispatch_timeout_seconds: Some(DEFAULT_DISPATCH_TIMEOUT_SECONDS),
            greeting: Some(true),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    pub fn interval_seconds(&self) -> u64 {
        self.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECONDS)
    }

    pub fn default_badness_threshold(&self) -> u32 {
        self.default_badness_threshold
            .unwrap_or(DEFAULT_BADNESS_THRESHOLD)
    }

    pub fn default_badness_increment(&self) -> u32 {
        self.default_badness_increment
            .unwrap_or(DEFAULT_BADNESS_INCREMENT)
    }

    pub fn dispatch_timeout_seconds(&self) -> u64 {
        self.dispatch_timeout_seconds
            .unwrap_or(DEFAULT_DISPATCH_TIMEOUT_SECONDS)
    }
}

/// Reasons a configuration is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("interval_seconds must be greater than 0")]
    ZeroInterval,

    #[error("{0} must be greater than 0")]
    ZeroBadness(String),

    #[error("{field} must be between 0 and 100, got {value}")]
    PercentOutOfRange { field: String, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    NegativeThreshold { field: String, value: f64 },

    #[error("invalid webhook_url '{0}': expected an http:// or https:// URL")]
    WebhookUrl(String),

    #[error("{0}")]
    Tls(String),
}

fn check_badness(field: &str, value: Option<u32>) -> Result<(), ConfigError> {
    match value {
        Some(0) => Err(ConfigError::ZeroBadness(field.to_string())),
        _ => Ok(()),
    }
}

fn check_limit(name: &str, limit: &LimitConfig, percent: bool) -> Result<(), ConfigError> {
    check_badness(
        &format!("limits.{}.badness_increment", name),
        limit.badness_increment,
    )?;
    check_badness(
        &format!("limits.{}.badness_threshold", name),
        limit.badness_threshold,
    )?;

    if let Some(value) = limit.threshold {
        let field = format!("limits.{}.threshold", name);
        if percent && !(0.0..=100.0).contains(&value) {
            return Err(ConfigError::PercentOutOfRange { field, value });
        }
        if !percent && (value.is_nan() || value < 0.0) {
            return Err(ConfigError::NegativeThreshold { field, value });
        }
    }
    Ok(())
}

fn check_tls(cfg: &Config) -> Result<(), ConfigError> {
    if !cfg.enable_tls.unwrap_or(false) {
        return Ok(());
    }

    let (cert, key) = match (cfg.tls_cert_path.as_deref(), cfg.tls_key_path.as_deref()) {
        (None, None) => {
            return Err(ConfigError::Tls(
                "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
            ));
        }
        (Some(_), None) => {
            return Err(ConfigError::Tls(
                "TLS is enabled but tls_key_path is not set".into(),
            ));
        }
        (None, Some(_)) => {
            return Err(ConfigError::Tls(
                "TLS is enabled but tls_cert_path is not set".into(),
            ));
        }
        (Some(cert), Some(key)) => (cert, key),
    };

    for (label, path) in [("certificate", cert), ("private key", key)] {
        match fs::metadata(path) {
            Ok(meta) if meta.len() == 0 => {
                return Err(ConfigError::Tls(format!(
                    "TLS {} file is empty: {}",
                    label, path
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Tls(format!(
                    "TLS {} file not found: {}",
                    label, path
                )));
            }
            Err(e) => {
                return Err(ConfigError::Tls(format!(
                    "TLS {} file is not readable: {} ({})",
                    label, path, e
                )));
            }
        }
    }

    Ok(())
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.interval_seconds == Some(0) {
        return Err(ConfigError::ZeroInterval);
    }

    check_badness("default_badness_threshold", cfg.default_badness_threshold)?;
    check_badness("default_badness_increment", cfg.default_badness_increment)?;

    check_limit("cpu_load", &cfg.limits.cpu_load, true)?;
    check_limit("memory", &cfg.limits.memory, true)?;
    check_limit("disk_usage", &cfg.limits.disk_usage, true)?;
    check_limit("disk_free", &cfg.limits.disk_free, false)?;

    if let Some(url) = cfg.webhook_url.as_deref() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::WebhookUrl(url.to_string()));
        }
    }

    check_tls(cfg)
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(interval) = args.interval {
        config.interval_seconds = Some(interval);
    }
    if args.no_autostart {
        config.autostart = Some(false);
    }
    if args.no_greeting {
        config.greeting = Some(false);
    }
    if let Some(url) = &args.webhook_url {
        config.webhook_url = Some(url.clone());
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads configuration from `path`, or from the first existing default
/// location. Falls back to the defaults when no file is found.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .find(|p| Path::new(p).exists())
        {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Serializes configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: &ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_effective_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let cfg = Config {
            interval_seconds: Some(0),
            ..Config::default()
        };
        assert!(matches!(
            validate_effective_config(&cfg),
            Err(ConfigError::ZeroInterval)
        ));
    }

    #[test]
    fn test_zero_badness_rejected() {
        let mut cfg = Config::default();
        cfg.limits.memory.badness_threshold = Some(0);
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("limits.memory.badness_threshold"));

        let cfg = Config {
            default_badness_increment: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_threshold_ranges() {
        let mut cfg = Config::default();
        cfg.limits.cpu_load.threshold = Some(120.0);
        assert!(matches!(
            validate_effective_config(&cfg),
            Err(ConfigError::PercentOutOfRange { .. })
        ));

        let mut cfg = Config::default();
        cfg.limits.disk_free.threshold = Some(500.0);
        assert!(validate_effective_config(&cfg).is_ok());
        cfg.limits.disk_free.threshold = Some(-1.0);
        assert!(matches!(
            validate_effective_config(&cfg),
            Err(ConfigError::NegativeThreshold { .. })
        ));
    }

    #[test]
    fn test_webhook_url_scheme() {
        let cfg = Config {
            webhook_url: Some("ftp://example.com/hook".into()),
            ..Config::default()
        };
        assert!(matches!(
            validate_effective_config(&cfg),
            Err(ConfigError::WebhookUrl(_))
        ));
    }

    #[test]
    fn test_tls_requires_both_paths() {
        let cfg = Config {
            enable_tls: Some(true),
            tls_cert_path: Some("/tmp/cert.pem".into()),
            ..Config::default()
        };
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("tls_key_path"));
    }

    #[test]
    fn test_load_yaml_with_partial_limits() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "interval_seconds: 60\nlimits:\n  memory:\n    threshold: 70\n  disk_free:\n    enabled: false\n"
        )
        .unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.interval_seconds(), 60);
        assert_eq!(cfg.limits.memory.threshold, Some(70.0));
        assert!(!cfg.limits.disk_free.is_enabled());
        assert!(cfg.limits.cpu_load.is_enabled());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        assert!(load_config(Some(Path::new("/nonexistent/notifier.yaml"))).is_err());
    }

    #[test]
    fn test_render_all_formats() {
        let cfg = Config::default();
        for format in [ConfigFormat::Yaml, ConfigFormat::Json, ConfigFormat::Toml] {
            let out = render_config(&cfg, &format).unwrap();
            assert!(out.contains("interval_seconds"));
        }
    }
}
