//! Run statistics for the limit observer.
//!
//! Counters only grow, except on an explicit [`RunStatistics::reset`]. All
//! updates are atomic so the statistics can be read by the control surface
//! while a check cycle is running.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Instant, SystemTime};

/// Summary of check cycle durations in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DurationSummary {
    pub last_ms: f64,
    pub max_ms: f64,
    pub total_ms: f64,
    pub count: u64,
}

impl DurationSummary {
    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_ms / self.count as f64
    }
}

/// Check durations, shared between the check loop and readers.
#[derive(Default)]
pub struct CheckDurations {
    inner: Mutex<DurationSummary>,
}

impl CheckDurations {
    pub fn record(&self, duration_ms: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.last_ms = duration_ms;
            s.max_ms = s.max_ms.max(duration_ms);
            s.total_ms += duration_ms;
            s.count += 1;
        }
    }

    pub fn summary(&self) -> DurationSummary {
        self.inner.lock().map(|s| *s).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut s) = self.inner.lock() {
            *s = DurationSummary::default();
        }
    }
}

/// Process-wide statistics about check cycles and notifications.
pub struct RunStatistics {
    /// Completed check cycles.
    pub num_checks: AtomicU64,
    /// Failed limit checks, over all limits.
    pub num_limits_reached: AtomicU64,
    /// Delivered "limit exceeded" messages.
    pub num_limits_notified: AtomicU64,
    /// Delivered "recovered" messages.
    pub num_limits_recovered: AtomicU64,
    /// Metric samples that could not be retrieved.
    pub num_retrieval_failures: AtomicU64,
    /// Messages the dispatcher failed to deliver.
    pub num_dispatch_failures: AtomicU64,
    /// Failed checks per limit key.
    pub limits_reached: DashMap<String, u64>,
    /// Wall time of a check cycle in milliseconds.
    pub check_durations: CheckDurations,

    pub start_time: Instant,
    pub last_check_time: StdRwLock<Option<SystemTime>>,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self {
            num_checks: AtomicU64::new(0),
            num_limits_reached: AtomicU64::new(0),
            num_limits_notified: AtomicU64::new(0),
            num_limits_recovered: AtomicU64::new(0),
            num_retrieval_failures: AtomicU64::new(0),
            num_dispatch_failures: AtomicU64::new(0),
            limits_reached: DashMap::new(),
            check_durations: CheckDurations::default(),
            start_time: Instant::now(),
            last_check_time: StdRwLock::new(None),
        }
    }
}

impl RunStatistics {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_check(&self, duration_ms: f64) {
        self.num_checks.fetch_add(1, Ordering::Relaxed);
        self.check_durations.record(duration_ms);
        if let Ok(mut guard) = self.last_check_time.write() {
            *guard = Some(SystemTime::now());
        }
    }

    pub fn record_limit_reached(&self, key: &str) {
        self.num_limits_reached.fetch_add(1, Ordering::Relaxed);
        *self.limits_reached.entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn record_notified(&self) {
        self.num_limits_notified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recovered(&self) {
        self.num_limits_recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retrieval_failure(&self) {
        self.num_retrieval_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_failure(&self) {
        self.num_dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn checks(&self) -> u64 {
        self.num_checks.load(Ordering::Relaxed)
    }

    pub fn limits_reached_for(&self, key: &str) -> u64 {
        self.limits_reached.get(key).map(|v| *v).unwrap_or(0)
    }

    /// Zeroes every counter. Only called on explicit operator request.
    pub fn reset(&self) {
        self.num_checks.store(0, Ordering::Relaxed);
        self.num_limits_reached.store(0, Ordering::Relaxed);
        self.num_limits_notified.store(0, Ordering::Relaxed);
        self.num_limits_recovered.store(0, Ordering::Relaxed);
        self.num_retrieval_failures.store(0, Ordering::Relaxed);
        self.num_dispatch_failures.store(0, Ordering::Relaxed);
        self.limits_reached.clear();
        self.check_durations.reset();
        if let Ok(mut guard) = self.last_check_time.write() {
            *guard = None;
        }
    }

    /// Statistic name to count, per-limit entries as `limit_reached.<key>`.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        let mut map = BTreeMap::new();
        map.insert("num_checks".to_string(), self.checks());
        map.insert(
            "num_limits_reached".to_string(),
            self.num_limits_reached.load(Ordering::Relaxed),
        );
        map.insert(
            "num_limits_notified".to_string(),
            self.num_limits_notified.load(Ordering::Relaxed),
        );
        map.insert(
            "num_limits_recovered".to_string(),
            self.num_limits_recovered.load(Ordering::Relaxed),
        );
        map.insert(
            "num_retrieval_failures".to_string(),
            self.num_retrieval_failures.load(Ordering::Relaxed),
        );
        map.insert(
            "num_dispatch_failures".to_string(),
            self.num_dispatch_failures.load(Ordering::Relaxed),
        );
        for entry in self.limits_reached.iter() {
            map.insert(format!("limit_reached.{}", entry.key()), *entry.value());
        }
        map
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Seconds since the last completed check cycle, if any.
    pub fn seconds_since_last_check(&self) -> Option<u64> {
        let guard = self.last_check_time.read().ok()?;
        let last = (*guard)?;
        SystemTime::now()
            .duration_since(last)
            .ok()
            .map(|d| d.as_secs())
    }

    pub fn render_table(&self) -> String {
        let durations = self.check_durations.summary();
        let last_check = self
            .seconds_since_last_check()
            .map(|s| format!("{}s ago", s))
            .unwrap_or_else(|| "N/A".to_string());

        let mut out = String::new();

        writeln!(out, "OBSERVER STATISTICS").ok();
        writeln!(out, "===================").ok();
        writeln!(out).ok();

        for (name, value) in self.snapshot() {
            writeln!(out, "{:32} | {:>10}", name, value).ok();
        }

        writeln!(out).ok();
        writeln!(
            out,
            "{:32} | {:>10.2} | {:>10.2} | {:>10.2}",
            "check_duration_ms (last/avg/max)",
            durations.last_ms,
            durations.avg_ms(),
            durations.max_ms
        )
        .ok();
        writeln!(out, "{:32} | {:>10}", "last_check", last_check).ok();

        out
    }
}
