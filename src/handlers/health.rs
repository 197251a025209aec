//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! observer liveness and the run statistics as plain text.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// A running observer whose last check is older than this many intervals
/// is reported as stalled.
const STALL_INTERVALS: u64 = 3;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "More info: https://www.herakles.now - Support: exporter@herakles.now";

/// Formats seconds as minutes, hours or days.
pub fn format_uptime_short(uptime_seconds: u64) -> String {
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    }
}

/// Health verdict from observer state and time since the last check.
fn health_status(
    running: bool,
    since_last_check: Option<u64>,
    interval_seconds: u64,
) -> (StatusCode, &'static str) {
    if !running {
        return (StatusCode::OK, "OK - Observer stopped");
    }
    let stall_after = interval_seconds.saturating_mul(STALL_INTERVALS).max(1);
    match since_last_check {
        Some(secs) if secs > stall_after => (StatusCode::SERVICE_UNAVAILABLE, "Observer stalled"),
        _ => (StatusCode::OK, "OK"),
    }
}

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let stats = state.observer.statistics();
    let interval_seconds = state.observer.interval().as_secs();
    let next_check = state.observer.time_until_next_check();

    let (status, message) = health_status(
        next_check.is_some(),
        stats.seconds_since_last_check(),
        interval_seconds,
    );

    let uptime_str = format_uptime_short(stats.get_uptime_seconds());
    let table = stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nHost: {host}\nUptime: {uptime_str}\nDispatcher: {dispatcher}\n\n{table}\n{FOOTER_TEXT}",
            host = state.hostname,
            dispatcher = state.observer.dispatcher().name(),
        ),
    )
}
