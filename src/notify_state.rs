//! Notification bookkeeping on top of the badness counters.
//!
//! [`NotifyBadCounterManager`] adds a per-key "already notified" flag so that
//! a limit that keeps failing is reported once, and its recovery is reported
//! once, and only if the exceeded message actually went out.
//!
//! Deciding to notify and marking a key as notified are separate steps: the
//! caller marks the key only after the message was delivered, so a failed
//! delivery is retried on the next failing check.

use ahash::AHashMap as HashMap;
use serde::Serialize;
use std::fmt;

use crate::badness::BadCounterManager;
use crate::limits::LimitSpec;

/// Alerting state of a single limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitState {
    /// No accumulated badness.
    Normal,
    /// Some badness, but no exceeded message delivered for this episode.
    Accumulating,
    /// Exceeded message delivered, waiting for the badness to decay to zero.
    Notified,
}

impl fmt::Display for LimitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LimitState::Normal => "normal",
            LimitState::Accumulating => "accumulating",
            LimitState::Notified => "notified",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of one key's counter state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub key: String,
    pub badness: u32,
    pub notified: bool,
    pub state: LimitState,
}

/// Collects badness values together with notification statuses.
#[derive(Debug, Clone, Default)]
pub struct NotifyBadCounterManager {
    counters: BadCounterManager,
    notified: HashMap<String, bool>,
}

impl NotifyBadCounterManager {
    pub fn new(default_threshold: u32, default_increment: u32) -> Self {
        Self {
            counters: BadCounterManager::new(default_threshold, default_increment),
            notified: HashMap::new(),
        }
    }

    /// Underlying counter store.
    pub fn counters(&self) -> &BadCounterManager {
        &self.counters
    }

    pub fn badness(&self, key: &str) -> u32 {
        self.counters.badness(key)
    }

    pub fn is_notified(&self, key: &str) -> bool {
        self.notified.get(key).copied().unwrap_or(false)
    }

    /// Records a failed check of `limit`.
    ///
    /// Returns true if an exceeded message should be sent now. The caller
    /// must call [`mark_notified`](Self::mark_notified) once it was delivered.
    pub fn record_failure(&mut self, key: &str, limit: &LimitSpec) -> bool {
        let threshold = self.counters.effective_threshold(limit);
        let increment = self.counters.effective_increment(limit);

        self.counters.increase(key, increment, threshold);

        self.counters.is_at_threshold(key, threshold) && !self.is_notified(key)
    }

    /// Records a passing check of `limit`.
    ///
    /// Returns true exactly on the transition back to normal, and only if an
    /// exceeded message had been delivered for this episode.
    pub fn record_success(&mut self, key: &str, limit: &LimitSpec) -> bool {
        let threshold = self.counters.effective_threshold(limit);

        let was_normal_before = self.counters.is_normal(key);
        let had_notified_before = self.is_notified(key);

        self.counters.decrease(key, threshold);

        let is_normal = self.counters.is_normal(key);
        if is_normal {
            self.notified.insert(key.to_string(), false);
        }

        was_normal_before != is_normal && had_notified_before
    }

    /// Marks `key` as notified after a delivered exceeded message.
    pub fn mark_notified(&mut self, key: &str) {
        self.notified.insert(key.to_string(), true);
    }

    /// Resets badness and notification flag of one key, or of all keys.
    pub fn reset(&mut self, key: Option<&str>) {
        self.counters.reset(key);

        match key {
            Some(key) => {
                self.notified.insert(key.to_string(), false);
            }
            None => {
                for flag in self.notified.values_mut() {
                    *flag = false;
                }
            }
        }
    }

    /// Alerting state of `key`.
    pub fn state(&self, key: &str) -> LimitState {
        if self.counters.is_normal(key) {
            LimitState::Normal
        } else if self.is_notified(key) {
            LimitState::Notified
        } else {
            LimitState::Accumulating
        }
    }

    /// Snapshot of the given keys, in the given order.
    pub fn snapshot<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Vec<CounterSnapshot> {
        keys.into_iter()
            .map(|key| CounterSnapshot {
                key: key.to_string(),
                badness: self.badness(key),
                notified: self.is_notified(key),
                state: self.state(key),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Comparison;

    fn limit(increment: u32, threshold: u32) -> LimitSpec {
        LimitSpec::new("cpu", "CPU", || Ok(0.0), Comparison::LessThan, 95.0, "")
            .with_badness_increment(increment)
            .with_badness_threshold(threshold)
    }

    #[test]
    fn test_notify_once_per_episode() {
        let limit = limit(1, 3);
        let mut manager = NotifyBadCounterManager::default();

        assert!(!manager.record_failure("cpu", &limit));
        assert!(!manager.record_failure("cpu", &limit));
        assert!(manager.record_failure("cpu", &limit));
        manager.mark_notified("cpu");

        assert!(!manager.record_failure("cpu", &limit));
        assert!(!manager.record_failure("cpu", &limit));
        assert_eq!(manager.state("cpu"), LimitState::Notified);
    }

    #[test]
    fn test_unmarked_notification_is_offered_again() {
        let limit = limit(3, 3);
        let mut manager = NotifyBadCounterManager::default();

        assert!(manager.record_failure("cpu", &limit));
        // delivery failed, no mark
        assert!(manager.record_failure("cpu", &limit));
        assert!(!manager.is_notified("cpu"));
        assert_eq!(manager.state("cpu"), LimitState::Accumulating);
    }

    #[test]
    fn test_recovery_reported_once_after_notification() {
        let limit = limit(3, 3);
        let mut manager = NotifyBadCounterManager::default();

        assert!(manager.record_failure("cpu", &limit));
        manager.mark_notified("cpu");

        assert!(!manager.record_success("cpu", &limit));
        assert!(!manager.record_success("cpu", &limit));
        assert!(manager.record_success("cpu", &limit));
        assert!(!manager.is_notified("cpu"));
        assert!(!manager.record_success("cpu", &limit));
        assert_eq!(manager.state("cpu"), LimitState::Normal);
    }

    #[test]
    fn test_no_recovery_without_notification() {
        let limit = limit(1, 3);
        let mut manager = NotifyBadCounterManager::default();

        assert!(!manager.record_failure("cpu", &limit));
        assert!(!manager.record_failure("cpu", &limit));
        assert!(!manager.record_success("cpu", &limit));
        assert!(!manager.record_failure("cpu", &limit));
        assert!(!manager.record_success("cpu", &limit));
        assert!(!manager.record_success("cpu", &limit));
        assert!(manager.counters().is_normal("cpu"));
    }

    #[test]
    fn test_success_on_normal_key_is_silent() {
        let limit = limit(1, 3);
        let mut manager = NotifyBadCounterManager::default();
        assert!(!manager.record_success("cpu", &limit));
        assert_eq!(manager.badness("cpu"), 0);
    }

    #[test]
    fn test_reset_clears_badness_and_flags() {
        let limit = limit(3, 3);
        let mut manager = NotifyBadCounterManager::default();
        manager.record_failure("cpu", &limit);
        manager.mark_notified("cpu");
        manager.record_failure("mem", &limit);
        manager.mark_notified("mem");

        manager.reset(Some("cpu"));
        assert_eq!(manager.state("cpu"), LimitState::Normal);
        assert_eq!(manager.state("mem"), LimitState::Notified);

        manager.reset(None);
        assert_eq!(manager.badness("mem"), 0);
        assert!(!manager.is_notified("mem"));
    }

    #[test]
    fn test_snapshot_keeps_key_order() {
        let limit = limit(1, 3);
        let mut manager = NotifyBadCounterManager::default();
        manager.record_failure("b", &limit);

        let snapshot = manager.snapshot(["a", "b"]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].key, "a");
        assert_eq!(snapshot[0].state, LimitState::Normal);
        assert_eq!(snapshot[1].badness, 1);
        assert_eq!(snapshot[1].state, LimitState::Accumulating);
    }
}
