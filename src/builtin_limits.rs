//! Default observable limits for a Linux host.
//!
//! CPU load, memory utilisation, and per mount disk usage and free space.
//! Thresholds and badness tuning can be overridden per kind from the config.

use herakles_limit_notifier::{Comparison, LimitSpec, RetrievalError};
use tracing::{debug, warn};

use crate::collectors::filesystem::{disk_usage, list_disk_mounts, DiskMount};
use crate::config::{LimitConfig, LimitsConfig};
use crate::system::{cpu_count, read_load_average, read_memory_info};

const CPU_LOAD_TEMPLATE: &str =
    "**CPU Load Avg [5min]** is too high! (value: `{current_value}%`, threshold: `{threshold}%`)";
const MEMORY_TEMPLATE: &str =
    "**Memory Usage** is too high! (value: `{current_value}%`, threshold: `{threshold}%`)";

/// Built-in defaults of one limit kind.
struct Defaults {
    threshold: f64,
    badness_increment: Option<u32>,
    badness_threshold: Option<u32>,
}

const CPU_LOAD_DEFAULTS: Defaults = Defaults {
    threshold: 95.0,
    badness_increment: Some(1),
    badness_threshold: Some(3),
};
const MEMORY_DEFAULTS: Defaults = Defaults {
    threshold: 85.0,
    badness_increment: Some(1),
    badness_threshold: Some(3),
};
const DISK_USAGE_DEFAULTS: Defaults = Defaults {
    threshold: 95.0,
    badness_increment: None,
    badness_threshold: None,
};
const DISK_FREE_DEFAULTS: Defaults = Defaults {
    threshold: 30.0,
    badness_increment: None,
    badness_threshold: None,
};

fn read_error(e: String) -> RetrievalError {
    RetrievalError::Read(e)
}

/// Applies threshold and badness tuning from `cfg` over `defaults`.
fn tuned(mut limit: LimitSpec, cfg: &LimitConfig, defaults: &Defaults) -> LimitSpec {
    limit.threshold = cfg.threshold.unwrap_or(defaults.threshold);
    limit.badness_increment = cfg.badness_increment.or(defaults.badness_increment);
    limit.badness_threshold = cfg.badness_threshold.or(defaults.badness_threshold);
    limit
}

fn cpu_load_limit(cfg: &LimitConfig) -> LimitSpec {
    let limit = LimitSpec::new(
        "cpu_load_5min",
        "CPU-Load-Avg-5min",
        || {
            let load = read_load_average().map_err(read_error)?;
            Ok(load.as_percent_of(cpu_count()).1)
        },
        Comparison::LessThan,
        CPU_LOAD_DEFAULTS.threshold,
        CPU_LOAD_TEMPLATE,
    );
    tuned(limit, cfg, &CPU_LOAD_DEFAULTS)
}

fn memory_limit(cfg: &LimitConfig) -> LimitSpec {
    let limit = LimitSpec::new(
        "mem_util",
        "Memory-Utilisation",
        || Ok(read_memory_info().map_err(read_error)?.used_percent()),
        Comparison::LessThan,
        MEMORY_DEFAULTS.threshold,
        MEMORY_TEMPLATE,
    );
    tuned(limit, cfg, &MEMORY_DEFAULTS)
}

fn disk_usage_limit(index: usize, mount: &DiskMount, cfg: &LimitConfig) -> LimitSpec {
    let path = mount.mount_point.clone();
    let template = format!(
        "**Disk Usage for `{}`** is too high! (value: `{{current_value}}%`, threshold: `{{threshold}}%`)",
        path
    );
    let limit = LimitSpec::new(
        format!("disk_util_perc{}", index),
        format!("Disk-Usage-{}", path),
        {
            let path = path.clone();
            move || Ok(disk_usage(&path).map_err(read_error)?.used_percent())
        },
        Comparison::LessThan,
        DISK_USAGE_DEFAULTS.threshold,
        template,
    );
    tuned(limit, cfg, &DISK_USAGE_DEFAULTS)
}

fn disk_free_limit(index: usize, mount: &DiskMount, cfg: &LimitConfig) -> LimitSpec {
    let path = mount.mount_point.clone();
    let template = format!(
        "No more **Disk Space for `{}`**! (value: `{{current_value}} GB`, threshold: `{{threshold}} GB`)",
        path
    );
    let limit = LimitSpec::new(
        format!("disk_util_gb{}", index),
        format!("Disk-Space-Free-{}", path),
        {
            let path = path.clone();
            move || Ok(disk_usage(&path).map_err(read_error)?.free_gib())
        },
        Comparison::GreaterThan,
        DISK_FREE_DEFAULTS.threshold,
        template,
    );
    tuned(limit, cfg, &DISK_FREE_DEFAULTS)
}

/// Builds the limits for the given mounts.
pub fn build_limits(cfg: &LimitsConfig, mounts: &[DiskMount]) -> Vec<LimitSpec> {
    let mut limits = Vec::new();

    if cfg.cpu_load.is_enabled() {
        limits.push(cpu_load_limit(&cfg.cpu_load));
    }
    if cfg.memory.is_enabled() {
        limits.push(memory_limit(&cfg.memory));
    }

    for (index, mount) in mounts.iter().enumerate() {
        if cfg.disk_usage.is_enabled() {
            limits.push(disk_usage_limit(index, mount, &cfg.disk_usage));
        }
        if cfg.disk_free.is_enabled() {
            limits.push(disk_free_limit(index, mount, &cfg.disk_free));
        }
    }

    limits
}

/// Builds the limits for this host. Disks are enumerated once, here.
pub fn make_observable_limits(cfg: &LimitsConfig) -> Vec<LimitSpec> {
    let mounts = if cfg.disk_usage.is_enabled() || cfg.disk_free.is_enabled() {
        match list_disk_mounts() {
            Ok(mounts) => mounts,
            Err(e) => {
                warn!("Failed to list disk mounts, disk limits disabled: {}", e);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let limits = build_limits(cfg, &mounts);
    debug!(
        "Built {} limits for {} disk mounts",
        limits.len(),
        mounts.len()
    );
    limits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mount(path: &str) -> DiskMount {
        DiskMount {
            device: "/dev/sda1".into(),
            mount_point: path.into(),
            fstype: "ext4".into(),
        }
    }

    #[test]
    fn test_default_keys_and_order() {
        let limits = build_limits(&LimitsConfig::default(), &[mount("/"), mount("/data")]);
        let keys: Vec<&str> = limits.iter().map(|l| l.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "cpu_load_5min",
                "mem_util",
                "disk_util_perc0",
                "disk_util_gb0",
                "disk_util_perc1",
                "disk_util_gb1"
            ]
        );
        assert_eq!(limits[3].display_name, "Disk-Space-Free-/");
        assert_eq!(limits[3].comparison, Comparison::GreaterThan);
        assert_eq!(limits[0].badness_increment, Some(1));
        assert_eq!(limits[2].badness_threshold, None);
    }

    #[test]
    fn test_config_overrides_and_disables() {
        let mut cfg = LimitsConfig::default();
        cfg.memory.threshold = Some(70.0);
        cfg.memory.badness_threshold = Some(5);
        cfg.cpu_load.enabled = Some(false);
        cfg.disk_free.enabled = Some(false);

        let limits = build_limits(&cfg, &[mount("/")]);
        let keys: Vec<&str> = limits.iter().map(|l| l.key.as_str()).collect();
        assert_eq!(keys, vec!["mem_util", "disk_util_perc0"]);
        assert_eq!(limits[0].threshold, 70.0);
        assert_eq!(limits[0].badness_threshold, Some(5));
        assert_eq!(limits[0].badness_increment, Some(1));
    }

    #[test]
    fn test_disk_message_names_mount() {
        let limits = build_limits(&LimitsConfig::default(), &[mount("/srv")]);
        let message = limits[2].render_exceeded(97.0);
        assert!(message.contains("`/srv`"));
        assert!(message.contains("97.0%"));
        assert!(message.contains("95.0%"));
    }

    #[test]
    fn test_each_disk_limit_reads_its_own_mount() {
        let limits = build_limits(&LimitsConfig::default(), &[mount("/"), mount("/nonexistent-mount")]);
        assert!(limits[2].retrieve().is_ok());
        assert!(limits[4].retrieve().is_err());
    }
}
