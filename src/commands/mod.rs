//! CLI command implementations for herakles-limit-notifier.
//!
//! - `check`: Evaluate every limit once
//! - `info`: Print the system information message
//! - `send`: Send a one-off message, optionally with a file attached
//! - `config`: Configuration file generation

pub mod check;
pub mod config;
pub mod info;
pub mod send;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use info::command_info;
pub use send::command_send;
