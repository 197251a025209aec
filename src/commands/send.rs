//! Send command implementation.
//!
//! Sends a one-off message, optionally with an attached file, through the
//! configured webhook.

use herakles_limit_notifier::{format_code_block, DispatchError, Dispatcher, WebhookDispatcher};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;

/// Resolves the message text, reading stdin for `-`.
fn read_message(message: &str) -> Result<String, Box<dyn std::error::Error>> {
    if message != "-" {
        return Ok(message.to_string());
    }
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    debug!("Read {} characters from stdin", buffer.len());
    Ok(buffer)
}

/// Applies the optional code block wrapping.
pub fn prepare_message(text: &str, code_type: Option<&str>) -> String {
    match code_type {
        Some(lang) => {
            info!("Wrap message in markdown, type={}", lang);
            format_code_block(text.trim_end_matches('\n'), lang)
        }
        None => text.to_string(),
    }
}

/// Delivers `text`, with `file` attached if given.
pub async fn deliver(
    dispatcher: &dyn Dispatcher,
    text: &str,
    file: Option<&Path>,
) -> Result<(), DispatchError> {
    match file {
        Some(path) => {
            info!("Send file: {} ...", path.display());
            dispatcher.dispatch_file(text, path).await
        }
        None => {
            info!("Send message: {} characters ...", text.chars().count());
            dispatcher.dispatch(text).await
        }
    }
}

/// Sends `message` (or stdin for `-`) to the configured webhook, attaching
/// `file` if given.
pub async fn command_send(
    message: &str,
    code_type: Option<&str>,
    file: Option<&Path>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = config
        .webhook_url
        .as_deref()
        .ok_or(DispatchError::NotConfigured)?;

    if let Some(path) = file {
        if !path.is_file() {
            return Err(format!("'{}' is not a file", path.display()).into());
        }
    }

    let text = read_message(message)?;
    if text.trim().is_empty() && file.is_none() {
        return Err("Refusing to send an empty message".into());
    }
    let text = prepare_message(&text, code_type);

    let dispatcher = WebhookDispatcher::new(
        url,
        config.webhook_username.clone(),
        Duration::from_secs(config.dispatch_timeout_seconds()),
    )?;

    deliver(&dispatcher, &text, file).await?;
    println!("✅ Message sent");
    Ok(())
}
