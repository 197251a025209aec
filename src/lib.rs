//! Herakles Limit Notifier Library
//!
//! Debounced threshold alerting for system resources. Each observed limit
//! samples a numeric metric and compares it against a threshold. Instead of
//! alerting on every failed sample, a per-limit badness counter rises on
//! failures and decays by one on successes; a "limit exceeded" notification
//! is sent once the badness reaches its threshold, and a single "recovered"
//! notification follows once it has decayed back to zero.
//!
//! The library is independent of where metrics come from and where
//! notifications go: metric sources are plain closures and delivery goes
//! through the [`Dispatcher`] trait.
//!
//! # Features
//!
//! - **Hysteresis**: Tunable increment and threshold per limit
//! - **Deduplication**: One exceeded and one recovered message per episode
//! - **Retry on failed delivery**: A key is only marked notified once the message went out
//! - **Run statistics**: Atomic counters readable while a check runs
//!
//! # Usage
//!
//! ```rust
//! use herakles_limit_notifier::{
//!     Comparison, FnDispatcher, LimitSpec, Monitor, NotifyBadCounterManager, RunStatistics,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let limits = vec![LimitSpec::new(
//!     "cpu_load_5min",
//!     "CPU-Load-Avg-5min",
//!     || Ok(97.0),
//!     Comparison::LessThan,
//!     95.0,
//!     "CPU load too high: {current_value}% (threshold {threshold}%)",
//! )
//! .with_badness_increment(3)
//! .with_badness_threshold(3)];
//!
//! let mut monitor = Monitor::new(limits, NotifyBadCounterManager::default())?;
//! let dispatcher = FnDispatcher::new("stdout", |text| {
//!     println!("{}", text);
//!     Ok(())
//! });
//! let stats = RunStatistics::new();
//!
//! let report = monitor.evaluate_tick(&dispatcher, &stats).await;
//! assert_eq!(report.exceeded_sent, 1);
//! # Ok(())
//! # }
//! ```

pub mod badness;
pub mod dispatch;
pub mod limits;
pub mod notify_state;
pub mod observer;
pub mod stats;

// Re-export main types for convenience
pub use badness::{BadCounterManager, DEFAULT_BADNESS_INCREMENT, DEFAULT_BADNESS_THRESHOLD};
pub use dispatch::{
    format_code_block, truncate_message, DispatchError, Dispatcher, FnDispatcher, LogDispatcher,
    WebhookDispatcher, MAX_MESSAGE_LENGTH,
};
pub use limits::{format_value, Comparison, LimitSpec, MetricSource, RetrievalError};
pub use notify_state::{CounterSnapshot, LimitState, NotifyBadCounterManager};
pub use observer::{
    format_duration, LimitStatus, Monitor, Observer, ObserverError, ObserverStatus, TickReport,
    NEXT_CHECK_UNKNOWN,
};
pub use stats::{CheckDurations, DurationSummary, RunStatistics};
