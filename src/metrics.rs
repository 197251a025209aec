//! Prometheus metrics for herakles-limit-notifier.
//!
//! Mirrors the observer's run statistics and per-limit counter state. Values
//! are copied from an [`ObserverStatus`] on every scrape.

use herakles_limit_notifier::{LimitState, ObserverStatus, RunStatistics};
use prometheus::{Counter, CounterVec, Gauge, GaugeVec, Opts, Registry};
use std::sync::atomic::Ordering;

#[derive(Clone)]
pub struct NotifierMetrics {
    // ========== Observer ==========
    pub observer_running: Gauge,
    pub interval_seconds: Gauge,
    pub checks_total: Counter,
    pub check_duration_seconds: Gauge,

    // ========== Limits ==========
    pub limits_reached_total: CounterVec,  // labels: limit
    pub notifications_total: CounterVec,   // labels: kind
    pub retrieval_failures_total: Counter,
    pub dispatch_failures_total: Counter,
    pub limit_badness: GaugeVec,           // labels: limit
    pub limit_badness_threshold: GaugeVec, // labels: limit
    pub limit_notified: GaugeVec,          // labels: limit
}

impl NotifierMetrics {
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        let observer_running = Gauge::new(
            "herakles_notifier_observer_running",
            "Whether the observer loop is running (1) or stopped (0)",
        )?;
        let interval_seconds = Gauge::new(
            "herakles_notifier_interval_seconds",
            "Configured seconds between two checks",
        )?;
        let checks_total = Counter::new(
            "herakles_notifier_checks_total",
            "Completed check cycles",
        )?;
        let check_duration_seconds = Gauge::new(
            "herakles_notifier_check_duration_seconds",
            "Duration of the last check cycle in seconds",
        )?;

        let limits_reached_total = CounterVec::new(
            Opts::new(
                "herakles_notifier_limits_reached_total",
                "Failed checks per limit",
            ),
            &["limit"],
        )?;
        let notifications_total = CounterVec::new(
            Opts::new(
                "herakles_notifier_notifications_total",
                "Delivered notifications by kind (exceeded/recovered)",
            ),
            &["kind"],
        )?;
        let retrieval_failures_total = Counter::new(
            "herakles_notifier_retrieval_failures_total",
            "Metric samples that could not be retrieved",
        )?;
        let dispatch_failures_total = Counter::new(
            "herakles_notifier_dispatch_failures_total",
            "Notifications that could not be delivered",
        )?;
        let limit_badness = GaugeVec::new(
            Opts::new(
                "herakles_notifier_limit_badness",
                "Current badness level per limit",
            ),
            &["limit"],
        )?;
        let limit_badness_threshold = GaugeVec::new(
            Opts::new(
                "herakles_notifier_limit_badness_threshold",
                "Badness level at which a limit is reported",
            ),
            &["limit"],
        )?;
        let limit_notified = GaugeVec::new(
            Opts::new(
                "herakles_notifier_limit_notified",
                "Whether an exceeded notification is outstanding (1) or not (0)",
            ),
            &["limit"],
        )?;

        registry.register(Box::new(observer_running.clone()))?;
        registry.register(Box::new(interval_seconds.clone()))?;
        registry.register(Box::new(checks_total.clone()))?;
        registry.register(Box::new(check_duration_seconds.clone()))?;
        registry.register(Box::new(limits_reached_total.clone()))?;
        registry.register(Box::new(notifications_total.clone()))?;
        registry.register(Box::new(retrieval_failures_total.clone()))?;
        registry.register(Box::new(dispatch_failures_total.clone()))?;
        registry.register(Box::new(limit_badness.clone()))?;
        registry.register(Box::new(limit_badness_threshold.clone()))?;
        registry.register(Box::new(limit_notified.clone()))?;

        Ok(Self {
            observer_running,
            interval_seconds,
            checks_total,
            check_duration_seconds,
            limits_reached_total,
            notifications_total,
            retrieval_failures_total,
            dispatch_failures_total,
            limit_badness,
            limit_badness_threshold,
            limit_notified,
        })
    }

    /// Copies observer state into the metric families.
    pub fn update(&self, status: &ObserverStatus, stats: &RunStatistics) {
        self.observer_running
            .set(if status.running { 1.0 } else { 0.0 });
        self.interval_seconds.set(status.interval_seconds as f64);

        set_counter(&self.checks_total, stats.num_checks.load(Ordering::Relaxed));
        set_counter(
            &self.retrieval_failures_total,
            stats.num_retrieval_failures.load(Ordering::Relaxed),
        );
        set_counter(
            &self.dispatch_failures_total,
            stats.num_dispatch_failures.load(Ordering::Relaxed),
        );
        set_counter(
            &self.notifications_total.with_label_values(&["exceeded"]),
            stats.num_limits_notified.load(Ordering::Relaxed),
        );
        set_counter(
            &self.notifications_total.with_label_values(&["recovered"]),
            stats.num_limits_recovered.load(Ordering::Relaxed),
        );

        self.check_duration_seconds
            .set(stats.check_durations.summary().last_ms / 1000.0);

        self.limits_reached_total.reset();
        self.limit_badness.reset();
        self.limit_badness_threshold.reset();
        self.limit_notified.reset();

        for limit in &status.limits {
            let key = limit.key.as_str();
            set_counter(
                &self.limits_reached_total.with_label_values(&[key]),
                stats.limits_reached_for(key),
            );
            self.limit_badness
                .with_label_values(&[key])
                .set(limit.badness as f64);
            self.limit_badness_threshold
                .with_label_values(&[key])
                .set(limit.badness_threshold as f64);
            self.limit_notified
                .with_label_values(&[key])
                .set(if limit.state == LimitState::Notified { 1.0 } else { 0.0 });
        }
    }
}

fn set_counter(counter: &Counter, value: u64) {
    counter.reset();
    counter.inc_by(value as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_update_exports_limit_series() {
        let registry = Registry::new();
        let metrics = NotifierMetrics::new(&registry).unwrap();

        let stats = RunStatistics::new();
        stats.record_limit_reached("mem_util");
        stats.record_notified();
        stats.record_check(250.0);

        let status = ObserverStatus {
            running: true,
            interval_seconds: 300,
            next_check_in: "5m 0s".into(),
            statistics: BTreeMap::new(),
            limits: vec![herakles_limit_notifier::LimitStatus {
                key: "mem_util".into(),
                display_name: "Memory-Utilisation".into(),
                comparison: herakles_limit_notifier::Comparison::LessThan,
                threshold: 85.0,
                badness: 3,
                badness_threshold: 3,
                notified: true,
                state: LimitState::Notified,
            }],
        };

        metrics.update(&status, &stats);

        assert_eq!(metrics.checks_total.get(), 1.0);
        assert_eq!(metrics.check_duration_seconds.get(), 0.25);
        assert_eq!(
            metrics
                .notifications_total
                .with_label_values(&["exceeded"])
                .get(),
            1.0
        );
        assert_eq!(
            metrics.limit_badness.with_label_values(&["mem_util"]).get(),
            3.0
        );
        assert_eq!(
            metrics.limit_notified.with_label_values(&["mem_util"]).get(),
            1.0
        );
        assert!(!registry.gather().is_empty());
    }
}
