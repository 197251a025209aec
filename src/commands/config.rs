//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("herakles-limit-notifier.yaml"));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Limit Notifier Configuration
# =====================================
#
# Control API
# -----------
# bind: "127.0.0.1"            # Bind IP of the control API
# port: 9217                   # HTTP port
#
# Observer
# --------
# interval_seconds: 300        # Seconds between two checks
# autostart: true              # Start observing on startup
# default_badness_threshold: 3 # Badness at which a limit is reported
# default_badness_increment: 3 # Badness added per failed check
#
# Notifications
# -------------
# webhook_url: null            # Chat webhook (Discord compatible), null = log only
# webhook_username: null       # Sender name shown in the chat
# dispatch_timeout_seconds: 10 # Timeout of one webhook request
# greeting: true               # Send the system info message on startup
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
#
# Limits
# ------
# Each of cpu_load, memory, disk_usage (per mount, percent) and disk_free
# (per mount, GiB) accepts:
#   enabled: true
#   threshold: <number>
#   badness_increment: <n>     # unset = default_badness_increment
#   badness_threshold: <n>     # unset = default_badness_threshold
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commented_yaml_stays_parseable() {
        let yaml = render_config(&Config::default(), &ConfigFormat::Yaml).unwrap();
        let commented = add_config_comments(yaml);
        let parsed: Config = serde_yaml::from_str(&commented).unwrap();
        assert_eq!(parsed.interval_seconds(), 300);
    }
}
