//! System information endpoint handler.

use axum::{http::StatusCode, response::IntoResponse};
use tracing::{debug, error, instrument};

use crate::report::info_message;

/// Handler for the /info endpoint.
#[instrument]
pub async fn info_handler() -> impl IntoResponse {
    debug!("Processing /info request");

    // /proc reads and statvfs may block on slow mounts
    match tokio::task::spawn_blocking(info_message).await {
        Ok(message) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; charset=utf-8")],
            message,
        ),
        Err(e) => {
            error!("Info collection task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("Content-Type", "text/plain; charset=utf-8")],
                "Failed to collect system information".to_string(),
            )
        }
    }
}
