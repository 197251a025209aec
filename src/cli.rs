//! CLI arguments and subcommands for herakles-limit-notifier.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-limit-notifier",
    about = "Observes system resource limits and sends debounced notifications",
    long_about = "Observes system resource limits and sends debounced notifications.\n\n\
                  Periodically samples CPU load, memory utilisation and disk usage, compares \
                  them against configured thresholds and notifies a chat webhook once a limit \
                  stays exceeded, and once more when it has recovered.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "More info: https://www.herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Control API listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Seconds between two checks
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Do not start the observer on startup (start it via the control API)
    #[arg(long)]
    pub no_autostart: bool,

    /// Do not send the startup greeting
    #[arg(long)]
    pub no_greeting: bool,

    /// Chat webhook URL receiving notifications
    #[arg(long)]
    pub webhook_url: Option<String>,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate every limit once and print the results (no notifications)
    Check {
        /// Exit with code 2 if any limit is exceeded
        #[arg(long)]
        strict: bool,
    },

    /// Print the system information message
    Info,

    /// Send a message through the configured notification target
    Send {
        /// Message text, "-" reads it from stdin
        message: String,

        /// Wrap the message in a code block with this language, plain block without value
        #[arg(
            long = "type",
            value_name = "LANG",
            num_args = 0..=1,
            default_missing_value = ""
        )]
        code_type: Option<String>,

        /// Attach this file to the message
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
    },

    /// Send a file with a message through the configured notification target
    SendFile {
        /// File to attach
        file: PathBuf,

        /// Message text, "-" reads it from stdin
        message: String,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send_with_type() {
        let args = Args::parse_from(["herakles-limit-notifier", "send", "-", "--type", "json"]);
        match args.command {
            Some(Commands::Send {
                message,
                code_type,
                file,
            }) => {
                assert_eq!(message, "-");
                assert_eq!(code_type.as_deref(), Some("json"));
                assert!(file.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_bare_type_flag_means_plain_block() {
        let args = Args::parse_from(["herakles-limit-notifier", "send", "hello", "--type"]);
        match args.command {
            Some(Commands::Send { code_type, .. }) => assert_eq!(code_type.as_deref(), Some("")),
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::parse_from(["herakles-limit-notifier", "send", "hello"]);
        match args.command {
            Some(Commands::Send { code_type, .. }) => assert!(code_type.is_none()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_file_attachments() {
        let args = Args::parse_from(["herakles-limit-notifier", "send", "build log", "-f", "/tmp/build.log"]);
        match args.command {
            Some(Commands::Send { message, file, .. }) => {
                assert_eq!(message, "build log");
                assert_eq!(file, Some(PathBuf::from("/tmp/build.log")));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::parse_from(["herakles-limit-notifier", "send-file", "/tmp/build.log", "done"]);
        match args.command {
            Some(Commands::SendFile { file, message }) => {
                assert_eq!(file, PathBuf::from("/tmp/build.log"));
                assert_eq!(message, "done");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_default_is_run() {
        let args = Args::parse_from(["herakles-limit-notifier", "--interval", "60"]);
        assert!(args.command.is_none());
        assert_eq!(args.interval, Some(60));
    }
}
