//! HTTP endpoint handlers for the control API.
//!
//! - `/`: Landing page
//! - `/health`: Liveness and run statistics
//! - `/info`: System information message
//! - `/metrics`: Prometheus metrics endpoint
//! - `/observer/*`: Observer status and control actions

pub mod health;
pub mod info;
pub mod metrics;
pub mod observer;
pub mod root;

// Re-export handlers
pub use health::health_handler;
pub use info::info_handler;
pub use metrics::metrics_handler;
pub use observer::{
    check_handler, reset_handler, reset_stats_handler, restart_handler, start_handler,
    status_handler, stop_handler,
};
pub use root::root_handler;
