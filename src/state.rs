//! Application state shared by the HTTP handlers.

use herakles_limit_notifier::Observer;
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::metrics::NotifierMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub metrics: NotifierMetrics,
    pub observer: Observer,
    pub config: Arc<Config>,
    pub hostname: String,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
