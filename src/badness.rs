//! Badness counters for damping noisy limit checks.
//!
//! Every observed limit owns an integer badness level in `[0, threshold]`.
//! Failed checks raise the level by the limit's increment (capped at the
//! threshold), passing checks lower it by exactly one (floored at zero).
//! Keys are created on first access, no registration is needed.

use ahash::AHashMap as HashMap;

use crate::limits::LimitSpec;

/// Default badness level at which a limit counts as exceeded.
pub const DEFAULT_BADNESS_THRESHOLD: u32 = 3;
/// Default badness added for each failed check.
pub const DEFAULT_BADNESS_INCREMENT: u32 = 3;

/// Gathers badness values per key with individual thresholds and increments.
#[derive(Debug, Clone)]
pub struct BadCounterManager {
    counters: HashMap<String, u32>,
    default_threshold: u32,
    default_increment: u32,
}

impl Default for BadCounterManager {
    fn default() -> Self {
        Self::new(DEFAULT_BADNESS_THRESHOLD, DEFAULT_BADNESS_INCREMENT)
    }
}

impl BadCounterManager {
    /// Creates a manager with the given fallback threshold and increment.
    pub fn new(default_threshold: u32, default_increment: u32) -> Self {
        Self {
            counters: HashMap::new(),
            default_threshold: default_threshold.max(1),
            default_increment,
        }
    }

    pub fn default_threshold(&self) -> u32 {
        self.default_threshold
    }

    pub fn default_increment(&self) -> u32 {
        self.default_increment
    }

    /// Badness threshold for `limit`: its override, else the manager default.
    /// Never zero, so that a limit always has a normal level below its cap.
    pub fn effective_threshold(&self, limit: &LimitSpec) -> u32 {
        limit
            .badness_threshold
            .unwrap_or(self.default_threshold)
            .max(1)
    }

    /// Badness increment for `limit`: its override, else the manager default.
    pub fn effective_increment(&self, limit: &LimitSpec) -> u32 {
        limit.badness_increment.unwrap_or(self.default_increment)
    }

    /// Current badness of `key`, zero for unknown keys.
    pub fn badness(&self, key: &str) -> u32 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    /// Raises the badness of `key` by `increment`, capped at `cap`.
    pub fn increase(&mut self, key: &str, increment: u32, cap: u32) -> u32 {
        let counter = self.counters.entry(key.to_string()).or_insert(0);
        *counter = counter.saturating_add(increment).min(cap);
        *counter
    }

    /// Lowers the badness of `key` by one, floored at zero.
    ///
    /// `cap` is accepted for symmetry with [`increase`](Self::increase); a
    /// value above the cap is clamped down first.
    pub fn decrease(&mut self, key: &str, cap: u32) -> u32 {
        let counter = self.counters.entry(key.to_string()).or_insert(0);
        *counter = (*counter).min(cap).saturating_sub(1);
        *counter
    }

    /// True if the badness of `key` reached `cap`.
    pub fn is_at_threshold(&self, key: &str, cap: u32) -> bool {
        self.badness(key) >= cap
    }

    /// True if `key` has no accumulated badness.
    pub fn is_normal(&self, key: &str) -> bool {
        self.badness(key) == 0
    }

    /// Resets one key, or every tracked key when `key` is `None`.
    pub fn reset(&mut self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.counters.insert(key.to_string(), 0);
            }
            None => {
                for value in self.counters.values_mut() {
                    *value = 0;
                }
            }
        }
    }

    /// Keys seen so far, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.counters.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Comparison;

    fn limit(increment: Option<u32>, threshold: Option<u32>) -> LimitSpec {
        let mut limit = LimitSpec::new("k", "K", || Ok(0.0), Comparison::LessThan, 1.0, "");
        limit.badness_increment = increment;
        limit.badness_threshold = threshold;
        limit
    }

    #[test]
    fn test_unknown_key_is_normal() {
        let manager = BadCounterManager::default();
        assert_eq!(manager.badness("missing"), 0);
        assert!(manager.is_normal("missing"));
        assert!(!manager.is_at_threshold("missing", 3));
    }

    #[test]
    fn test_increase_caps_at_threshold() {
        let mut manager = BadCounterManager::default();
        assert_eq!(manager.increase("cpu", 2, 5), 2);
        assert_eq!(manager.increase("cpu", 2, 5), 4);
        assert_eq!(manager.increase("cpu", 2, 5), 5);
        assert_eq!(manager.increase("cpu", 2, 5), 5);
        assert!(manager.is_at_threshold("cpu", 5));
    }

    #[test]
    fn test_decrease_is_by_one_and_floors_at_zero() {
        let mut manager = BadCounterManager::default();
        manager.increase("mem", 3, 3);
        assert_eq!(manager.decrease("mem", 3), 2);
        assert_eq!(manager.decrease("mem", 3), 1);
        assert_eq!(manager.decrease("mem", 3), 0);
        assert_eq!(manager.decrease("mem", 3), 0);
        assert!(manager.is_normal("mem"));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut manager = BadCounterManager::default();
        manager.increase("a", 1, 3);
        manager.increase("b", 3, 3);
        assert_eq!(manager.badness("a"), 1);
        assert_eq!(manager.badness("b"), 3);
    }

    #[test]
    fn test_reset_single_and_all() {
        let mut manager = BadCounterManager::default();
        manager.increase("a", 2, 3);
        manager.increase("b", 2, 3);

        manager.reset(Some("a"));
        assert_eq!(manager.badness("a"), 0);
        assert_eq!(manager.badness("b"), 2);

        manager.reset(None);
        assert!(manager.is_normal("a"));
        assert!(manager.is_normal("b"));
    }

    #[test]
    fn test_effective_values_use_overrides_then_defaults() {
        let manager = BadCounterManager::new(4, 2);
        let defaults = limit(None, None);
        assert_eq!(manager.effective_threshold(&defaults), 4);
        assert_eq!(manager.effective_increment(&defaults), 2);

        let tuned = limit(Some(1), Some(3));
        assert_eq!(manager.effective_threshold(&tuned), 3);
        assert_eq!(manager.effective_increment(&tuned), 1);
    }

    #[test]
    fn test_zero_threshold_is_treated_as_one() {
        let manager = BadCounterManager::new(0, 1);
        assert_eq!(manager.default_threshold(), 1);
        assert_eq!(manager.effective_threshold(&limit(None, Some(0))), 1);
    }
}
