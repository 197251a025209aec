//! Notification dispatch.
//!
//! The observer hands finished message text to a [`Dispatcher`]. Delivery may
//! fail; the observer decides what a failure means for its bookkeeping, the
//! dispatcher only reports it.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Error returned when a message could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("message rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("no notification target configured")]
    NotConfigured,

    #[error("failed to read attachment {path}: {reason}")]
    Attachment { path: String, reason: String },

    #[error("dispatcher '{0}' cannot send attachments")]
    AttachmentUnsupported(String),
}

/// Sends message text to wherever notifications go.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, text: &str) -> Result<(), DispatchError>;

    /// Sends `text` with the file at `path` attached.
    async fn dispatch_file(&self, text: &str, path: &Path) -> Result<(), DispatchError> {
        let _ = (text, path);
        Err(DispatchError::AttachmentUnsupported(self.name().to_string()))
    }

    /// Short name for logs and status output.
    fn name(&self) -> &str;
}

/// Writes notifications to the log only.
#[derive(Debug, Default, Clone)]
pub struct LogDispatcher;

#[async_trait]
impl Dispatcher for LogDispatcher {
    async fn dispatch(&self, text: &str) -> Result<(), DispatchError> {
        info!(target: "notification", "{}", text);
        Ok(())
    }

    async fn dispatch_file(&self, text: &str, path: &Path) -> Result<(), DispatchError> {
        info!(target: "notification", "{} [attachment: {}]", text, path.display());
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Closure type accepted by [`FnDispatcher`].
pub type DispatchFn = Arc<dyn Fn(&str) -> Result<(), DispatchError> + Send + Sync>;

/// Dispatcher backed by a plain function.
#[derive(Clone)]
pub struct FnDispatcher {
    name: String,
    f: DispatchFn,
}

impl FnDispatcher {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> Result<(), DispatchError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }
}

#[async_trait]
impl Dispatcher for FnDispatcher {
    async fn dispatch(&self, text: &str) -> Result<(), DispatchError> {
        (self.f)(text)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// JSON body for chat webhooks (Discord compatible).
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

/// Maximum message length accepted by common chat webhooks.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Posts notifications to a chat webhook URL.
pub struct WebhookDispatcher {
    url: String,
    username: Option<String>,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    /// Creates a webhook dispatcher with a per-request timeout.
    pub fn new(
        url: impl Into<String>,
        username: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        Ok(Self::with_client(url, username, client))
    }

    /// Creates a webhook dispatcher on a preconfigured HTTP client.
    pub fn with_client(
        url: impl Into<String>,
        username: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            url: url.into(),
            username,
            client,
        }
    }

    fn payload<'a>(&'a self, content: &'a str) -> WebhookPayload<'a> {
        WebhookPayload {
            content,
            username: self.username.as_deref(),
        }
    }

    /// Multipart body with the JSON payload and one attached file.
    fn file_form(
        &self,
        text: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<Form, DispatchError> {
        let content = truncate_message(text, MAX_MESSAGE_LENGTH);
        let payload = serde_json::to_string(&self.payload(&content))
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let file = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        Ok(Form::new()
            .text("payload_json", payload)
            .part(ATTACHMENT_FIELD, file))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(), DispatchError> {
        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Webhook accepted message with HTTP {}", status);
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("[failed to read response body: {}]", e));
        Err(DispatchError::Rejected {
            status: status.as_u16(),
            body: truncate_message(&body, 512),
        })
    }
}

/// Multipart field name of the attachment (Discord compatible).
const ATTACHMENT_FIELD: &str = "files[0]";

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn dispatch(&self, text: &str) -> Result<(), DispatchError> {
        let content = truncate_message(text, MAX_MESSAGE_LENGTH);
        self.send(self.client.post(&self.url).json(&self.payload(&content)))
            .await
    }

    async fn dispatch_file(&self, text: &str, path: &Path) -> Result<(), DispatchError> {
        let attachment_error = |reason: String| DispatchError::Attachment {
            path: path.display().to_string(),
            reason,
        };
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| attachment_error(e.to_string()))?;
        // only show the last part of the path
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| attachment_error("path has no file name".into()))?;

        debug!("Attaching {} ({} bytes)", file_name, data.len());
        let form = self.file_form(text, &file_name, data)?;
        self.send(self.client.post(&self.url).multipart(form)).await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Cuts `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_message(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Wraps a message in a fenced markdown code block.
///
/// An empty `lang` produces a plain fence.
pub fn format_code_block(message: &str, lang: &str) -> String {
    format!("```{}\n{}\n```", lang, message)
}
