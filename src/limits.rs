//! Limit definitions for observed system resources.
//!
//! A [`LimitSpec`] describes one monitored quantity: how to retrieve its
//! current value, in which direction the threshold applies, the message to
//! send when it is exceeded and optional badness tuning that overrides the
//! defaults of the counter manager.
//!
//! # Usage
//!
//! ```rust
//! use herakles_limit_notifier::{Comparison, LimitSpec};
//!
//! let limit = LimitSpec::new(
//!     "mem_util",
//!     "Memory-Utilisation",
//!     || Ok(42.0),
//!     Comparison::LessThan,
//!     85.0,
//!     "**Memory Usage** is too high! (value: `{current_value}%`, threshold: `{threshold}`)",
//! )
//! .with_badness_increment(1)
//! .with_badness_threshold(3);
//!
//! let current = limit.retrieve().unwrap();
//! assert!(limit.is_ok(current));
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Placeholder for the sampled value in a message template.
pub const CURRENT_VALUE_PLACEHOLDER: &str = "{current_value}";
/// Placeholder for the configured threshold in a message template.
pub const THRESHOLD_PLACEHOLDER: &str = "{threshold}";

/// Error returned by a metric source that could not produce a sample.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetrievalError {
    #[error("failed to read metric: {0}")]
    Read(String),

    #[error("metric returned a non-finite value: {0}")]
    NonFinite(f64),
}

/// Nullary function producing the current value of a metric.
pub type MetricSource = Arc<dyn Fn() -> Result<f64, RetrievalError> + Send + Sync>;

/// Direction in which a threshold is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Healthy while `current < threshold` (e.g. load or memory usage).
    LessThan,
    /// Healthy while `current > threshold` (e.g. free disk space).
    GreaterThan,
}

impl Comparison {
    /// Returns true if `current` is on the healthy side of `threshold`.
    pub fn is_ok(self, current: f64, threshold: f64) -> bool {
        match self {
            Comparison::LessThan => current < threshold,
            Comparison::GreaterThan => current > threshold,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::LessThan => write!(f, "<"),
            Comparison::GreaterThan => write!(f, ">"),
        }
    }
}

/// Immutable definition of a single observed limit.
#[derive(Clone)]
pub struct LimitSpec {
    /// Stable identifier, unique within one monitor.
    pub key: String,
    /// Human readable label used in messages.
    pub display_name: String,
    source: MetricSource,
    /// Healthy direction of the threshold.
    pub comparison: Comparison,
    /// Reference value, also interpolated into messages.
    pub threshold: f64,
    /// Template with `{current_value}` and `{threshold}` placeholders.
    pub message_template: String,
    /// Badness added per failed check, `None` for the manager default.
    pub badness_increment: Option<u32>,
    /// Badness at which a notification is sent, `None` for the manager default.
    pub badness_threshold: Option<u32>,
}

impl fmt::Debug for LimitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitSpec")
            .field("key", &self.key)
            .field("display_name", &self.display_name)
            .field("comparison", &self.comparison)
            .field("threshold", &self.threshold)
            .field("badness_increment", &self.badness_increment)
            .field("badness_threshold", &self.badness_threshold)
            .finish()
    }
}

impl LimitSpec {
    /// Creates a limit using the manager defaults for badness tuning.
    pub fn new<F>(
        key: impl Into<String>,
        display_name: impl Into<String>,
        source: F,
        comparison: Comparison,
        threshold: f64,
        message_template: impl Into<String>,
    ) -> Self
    where
        F: Fn() -> Result<f64, RetrievalError> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            source: Arc::new(source),
            comparison,
            threshold,
            message_template: message_template.into(),
            badness_increment: None,
            badness_threshold: None,
        }
    }

    /// Overrides the badness increment applied on each failed check.
    pub fn with_badness_increment(mut self, increment: u32) -> Self {
        self.badness_increment = Some(increment);
        self
    }

    /// Overrides the badness level at which a notification is sent.
    pub fn with_badness_threshold(mut self, threshold: u32) -> Self {
        self.badness_threshold = Some(threshold);
        self
    }

    /// Samples the metric. Non-finite samples are reported as errors.
    pub fn retrieve(&self) -> Result<f64, RetrievalError> {
        let value = (self.source)()?;
        if !value.is_finite() {
            return Err(RetrievalError::NonFinite(value));
        }
        Ok(value)
    }

    /// Returns true if `current` passes this limit.
    pub fn is_ok(&self, current: f64) -> bool {
        self.comparison.is_ok(current, self.threshold)
    }

    /// Renders the "limit exceeded" message for `current`.
    pub fn render_exceeded(&self, current: f64) -> String {
        self.message_template
            .replace(CURRENT_VALUE_PLACEHOLDER, &format_value(current))
            .replace(THRESHOLD_PLACEHOLDER, &format_value(self.threshold))
    }

    /// Renders the one-time recovery message.
    pub fn render_recovered(&self) -> String {
        format!("*{} has recovered*", self.display_name)
    }
}

/// Formats a sample or threshold for message text.
pub fn format_value(value: f64) -> String {
    format!("{:.1}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(comparison: Comparison, threshold: f64) -> LimitSpec {
        LimitSpec::new(
            "test",
            "Test-Limit",
            || Ok(1.0),
            comparison,
            threshold,
            "value {current_value} vs {threshold}",
        )
    }

    #[test]
    fn test_less_than_comparison() {
        assert!(Comparison::LessThan.is_ok(94.0, 95.0));
        assert!(!Comparison::LessThan.is_ok(95.0, 95.0));
        assert!(!Comparison::LessThan.is_ok(96.0, 95.0));
    }

    #[test]
    fn test_greater_than_comparison() {
        assert!(Comparison::GreaterThan.is_ok(31.0, 30.0));
        assert!(!Comparison::GreaterThan.is_ok(30.0, 30.0));
        assert!(!Comparison::GreaterThan.is_ok(12.5, 30.0));
    }

    #[test]
    fn test_render_exceeded_substitutes_placeholders() {
        let limit = limit(Comparison::LessThan, 95.0);
        assert_eq!(limit.render_exceeded(96.27), "value 96.3 vs 95.0");
    }

    #[test]
    fn test_render_recovered() {
        let limit = limit(Comparison::LessThan, 95.0);
        assert_eq!(limit.render_recovered(), "*Test-Limit has recovered*");
    }

    #[test]
    fn test_badness_overrides_default_to_none() {
        let limit = limit(Comparison::LessThan, 95.0);
        assert!(limit.badness_increment.is_none());
        assert!(limit.badness_threshold.is_none());

        let limit = limit.with_badness_increment(1).with_badness_threshold(3);
        assert_eq!(limit.badness_increment, Some(1));
        assert_eq!(limit.badness_threshold, Some(3));
    }

    #[test]
    fn test_retrieve_rejects_non_finite() {
        let limit = LimitSpec::new(
            "nan",
            "NaN",
            || Ok(f64::NAN),
            Comparison::LessThan,
            1.0,
            "",
        );
        assert!(matches!(limit.retrieve(), Err(RetrievalError::NonFinite(_))));
    }

    #[test]
    fn test_retrieve_propagates_source_error() {
        let limit = LimitSpec::new(
            "broken",
            "Broken",
            || Err(RetrievalError::Read("no such file".into())),
            Comparison::LessThan,
            1.0,
            "",
        );
        assert_eq!(
            limit.retrieve(),
            Err(RetrievalError::Read("no such file".into()))
        );
    }
}
