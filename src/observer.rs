//! Periodic limit evaluation and its control handle.
//!
//! [`Monitor`] owns the limit definitions together with their counter state
//! and evaluates all limits once per tick. [`Observer`] drives a monitor on a
//! fixed interval in a background tokio task and exposes the control
//! operations used by the command surface: start, stop, restart, status and
//! resetting the notification state.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use herakles_limit_notifier::{
//!     Comparison, LimitSpec, LogDispatcher, Monitor, NotifyBadCounterManager, Observer,
//!     RunStatistics,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let limits = vec![LimitSpec::new(
//!     "mem_util",
//!     "Memory-Utilisation",
//!     || Ok(42.0),
//!     Comparison::LessThan,
//!     85.0,
//!     "Memory usage too high: {current_value}% (threshold {threshold}%)",
//! )];
//! let monitor = Monitor::new(limits, NotifyBadCounterManager::default())?;
//! let observer = Observer::new(
//!     monitor,
//!     Arc::new(LogDispatcher),
//!     Arc::new(RunStatistics::new()),
//!     Duration::from_secs(300),
//! );
//!
//! observer.start()?;
//! let status = observer.status().await;
//! println!("running: {}, next check in {}", status.running, status.next_check_in);
//! observer.stop();
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatch::Dispatcher;
use crate::limits::{Comparison, LimitSpec};
use crate::notify_state::{LimitState, NotifyBadCounterManager};
use crate::stats::RunStatistics;

/// Shown as time-to-next-check while the observer is stopped.
pub const NEXT_CHECK_UNKNOWN: &str = "unknown";

/// Errors surfaced by the observer to its caller.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("observer must be started from within a tokio runtime")]
    NoRuntime,

    #[error("duplicate limit key: {0}")]
    DuplicateLimitKey(String),
}

/// Outcome of a single evaluation tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Limits whose value could be retrieved.
    pub evaluated: usize,
    /// Limits skipped because retrieval failed.
    pub skipped: usize,
    /// Limits whose check failed.
    pub failed: usize,
    pub exceeded_sent: usize,
    pub recovered_sent: usize,
    pub dispatch_failures: usize,
}

/// Status of a single limit for reports.
#[derive(Debug, Clone, Serialize)]
pub struct LimitStatus {
    pub key: String,
    pub display_name: String,
    pub comparison: Comparison,
    pub threshold: f64,
    pub badness: u32,
    pub badness_threshold: u32,
    pub notified: bool,
    pub state: LimitState,
}

/// Snapshot returned by [`Observer::status`].
#[derive(Debug, Clone, Serialize)]
pub struct ObserverStatus {
    pub running: bool,
    pub interval_seconds: u64,
    /// Formatted time until the next tick, or `"unknown"` when stopped.
    pub next_check_in: String,
    pub statistics: BTreeMap<String, u64>,
    pub limits: Vec<LimitStatus>,
}

/// Limit definitions plus their badness and notification state.
pub struct Monitor {
    limits: Vec<LimitSpec>,
    counters: NotifyBadCounterManager,
}

impl Monitor {
    /// Creates a monitor. Limit keys must be unique.
    pub fn new(
        limits: Vec<LimitSpec>,
        counters: NotifyBadCounterManager,
    ) -> Result<Self, ObserverError> {
        let mut seen = HashSet::new();
        for limit in &limits {
            if !seen.insert(limit.key.as_str()) {
                return Err(ObserverError::DuplicateLimitKey(limit.key.clone()));
            }
        }
        Ok(Self { limits, counters })
    }

    pub fn limits(&self) -> &[LimitSpec] {
        &self.limits
    }

    pub fn counters(&self) -> &NotifyBadCounterManager {
        &self.counters
    }

    /// Clears badness and notification flags of every limit.
    pub fn reset(&mut self) {
        self.counters.reset(None);
    }

    /// Per-limit status in definition order.
    pub fn snapshot(&self) -> Vec<LimitStatus> {
        let counters = self.counters.counters();
        self.limits
            .iter()
            .map(|limit| LimitStatus {
                key: limit.key.clone(),
                display_name: limit.display_name.clone(),
                comparison: limit.comparison,
                threshold: limit.threshold,
                badness: self.counters.badness(&limit.key),
                badness_threshold: counters.effective_threshold(limit),
                notified: self.counters.is_notified(&limit.key),
                state: self.counters.state(&limit.key),
            })
            .collect()
    }

    /// Evaluates every limit once and sends the resulting notifications.
    ///
    /// Limits are independent: a failed retrieval skips that limit for this
    /// tick without touching its state, and a failed delivery never stops
    /// the remaining limits from being evaluated.
    #[instrument(skip_all, fields(limits = self.limits.len()))]
    pub async fn evaluate_tick(
        &mut self,
        dispatcher: &dyn Dispatcher,
        stats: &RunStatistics,
    ) -> TickReport {
        let start = std::time::Instant::now();
        let mut report = TickReport::default();

        for limit in &self.limits {
            debug!("Running check: {}", limit.display_name);

            let current = match limit.retrieve() {
                Ok(value) => value,
                Err(e) => {
                    warn!("Failed to evaluate limit {}: {}", limit.key, e);
                    stats.record_retrieval_failure();
                    report.skipped += 1;
                    continue;
                }
            };
            report.evaluated += 1;

            if !limit.is_ok(current) {
                report.failed += 1;
                stats.record_limit_reached(&limit.key);

                if self.counters.record_failure(&limit.key, limit) {
                    let message = limit.render_exceeded(current);
                    match dispatcher.dispatch(&message).await {
                        Ok(()) => {
                            self.counters.mark_notified(&limit.key);
                            stats.record_notified();
                            report.exceeded_sent += 1;
                            info!(
                                "Limit {} exceeded (value: {:.1}, threshold: {:.1}), notified via {}",
                                limit.key,
                                current,
                                limit.threshold,
                                dispatcher.name()
                            );
                        }
                        Err(e) => {
                            error!(
                                "Failed to send exceeded notification for {}: {} - retrying next check",
                                limit.key, e
                            );
                            stats.record_dispatch_failure();
                            report.dispatch_failures += 1;
                        }
                    }
                }
            } else if self.counters.record_success(&limit.key, limit) {
                match dispatcher.dispatch(&limit.render_recovered()).await {
                    Ok(()) => {
                        stats.record_recovered();
                        report.recovered_sent += 1;
                        info!("Limit {} recovered", limit.key);
                    }
                    Err(e) => {
                        error!(
                            "Failed to send recovery notification for {}: {}",
                            limit.key, e
                        );
                        stats.record_dispatch_failure();
                        report.dispatch_failures += 1;
                    }
                }
            }
        }

        stats.record_check(start.elapsed().as_secs_f64() * 1000.0);
        debug!("Check cycle finished: {:?}", report);
        report
    }
}

/// Per-run control state. A fresh schedule cell per run keeps a stopped
/// task from overwriting the schedule of its successor.
#[derive(Default)]
struct Control {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    next_tick: Arc<StdMutex<Option<Instant>>>,
}

impl Control {
    fn is_running(&self) -> bool {
        match (&self.cancel, &self.task) {
            (Some(cancel), Some(task)) => !cancel.is_cancelled() && !task.is_finished(),
            _ => false,
        }
    }
}

struct ObserverInner {
    monitor: Mutex<Monitor>,
    dispatcher: Arc<dyn Dispatcher>,
    stats: Arc<RunStatistics>,
    interval: Duration,
    control: StdMutex<Control>,
}

impl ObserverInner {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run_tick(&self) -> TickReport {
        let mut monitor = self.monitor.lock().await;
        monitor
            .evaluate_tick(self.dispatcher.as_ref(), &self.stats)
            .await
    }
}

/// Cloneable handle driving a [`Monitor`] on a fixed interval.
#[derive(Clone)]
pub struct Observer {
    inner: Arc<ObserverInner>,
}

impl Observer {
    pub fn new(
        monitor: Monitor,
        dispatcher: Arc<dyn Dispatcher>,
        stats: Arc<RunStatistics>,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ObserverInner {
                monitor: Mutex::new(monitor),
                dispatcher,
                stats,
                interval: interval.max(Duration::from_millis(1)),
                control: StdMutex::new(Control::default()),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn statistics(&self) -> &Arc<RunStatistics> {
        &self.inner.stats
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.inner.dispatcher
    }

    pub fn is_running(&self) -> bool {
        self.inner.control().is_running()
    }

    /// Starts ticking. The first check runs immediately.
    ///
    /// Returns `Ok(false)` if the observer was already running.
    pub fn start(&self) -> Result<bool, ObserverError> {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| ObserverError::NoRuntime)?;

        let mut control = self.inner.control();
        if control.is_running() {
            debug!("Observer already running");
            return Ok(false);
        }

        let cancel = CancellationToken::new();
        let next_tick = Arc::new(StdMutex::new(Some(Instant::now())));
        let task = handle.spawn(run_loop(
            self.inner.clone(),
            cancel.clone(),
            next_tick.clone(),
        ));

        control.cancel = Some(cancel);
        control.task = Some(task);
        control.next_tick = next_tick;

        info!(
            "Observer started (interval: {}s)",
            self.inner.interval.as_secs()
        );
        Ok(true)
    }

    /// Stops ticking. A check that is already running is allowed to finish;
    /// counter state is left untouched.
    ///
    /// Returns false if the observer was not running.
    pub fn stop(&self) -> bool {
        let mut control = self.inner.control();
        let was_running = control.is_running();

        if let Some(cancel) = control.cancel.take() {
            cancel.cancel();
        }
        control.task = None;
        control.next_tick = Arc::new(StdMutex::new(None));

        if was_running {
            info!("Observer stopped");
        }
        was_running
    }

    /// Stops and starts again.
    pub fn restart(&self) -> Result<(), ObserverError> {
        self.stop();
        self.start().map(|_| ())
    }

    /// Runs one check cycle now, independent of the schedule.
    pub async fn run_once(&self) -> TickReport {
        self.inner.run_tick().await
    }

    /// Clears every limit's badness and notification flag.
    ///
    /// Waits for an in-flight check to finish. Statistics are not touched.
    pub async fn reset_notifications(&self) {
        self.inner.monitor.lock().await.reset();
        info!("Notification state reset");
    }

    /// Zeroes the run statistics.
    pub fn reset_statistics(&self) {
        self.inner.stats.reset();
        info!("Run statistics reset");
    }

    /// Time until the next scheduled check, `None` while stopped.
    pub fn time_until_next_check(&self) -> Option<Duration> {
        let control = self.inner.control();
        if !control.is_running() {
            return None;
        }
        let next = *control
            .next_tick
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(
            next.map(|t| t.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::ZERO),
        )
    }

    pub async fn status(&self) -> ObserverStatus {
        let next = self.time_until_next_check();
        let limits = self.inner.monitor.lock().await.snapshot();

        ObserverStatus {
            running: next.is_some(),
            interval_seconds: self.inner.interval.as_secs(),
            next_check_in: next
                .map(format_duration)
                .unwrap_or_else(|| NEXT_CHECK_UNKNOWN.to_string()),
            statistics: self.inner.stats.snapshot(),
            limits,
        }
    }
}

async fn run_loop(
    inner: Arc<ObserverInner>,
    cancel: CancellationToken,
    next_tick: Arc<StdMutex<Option<Instant>>>,
) {
    let mut interval = tokio::time::interval(inner.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let started = Instant::now();
        debug!("Running observe system task loop ...");
        inner.run_tick().await;

        if cancel.is_cancelled() {
            break;
        }

        let next = (started + inner.interval).max(Instant::now());
        if let Ok(mut guard) = next_tick.lock() {
            *guard = Some(next);
        }
    }

    debug!("Observer task exited");
}

/// Formats a duration as e.g. `4m 12s` or `1h 0m 5s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
