//! Host metrics read from the /proc filesystem.
//!
//! Load average, memory usage, uptime and a few uname/sysconf values used by
//! the built-in limits and the info report.

use once_cell::sync::Lazy;
use std::fs;

/// Number of online CPUs, read once.
static CPU_COUNT: Lazy<usize> = Lazy::new(|| {
    // SAFETY: sysconf has no preconditions
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n > 0 {
        n as usize
    } else {
        1
    }
});

/// System load averages for 1, 5, and 15 minute intervals.
#[derive(Debug, Clone, Copy)]
pub struct LoadAverage {
    pub one_min: f64,
    pub five_min: f64,
    pub fifteen_min: f64,
}

impl LoadAverage {
    /// Load averages scaled to percent of the available CPUs.
    pub fn as_percent_of(&self, cpus: usize) -> (f64, f64, f64) {
        let cpus = cpus.max(1) as f64;
        (
            self.one_min / cpus * 100.0,
            self.five_min / cpus * 100.0,
            self.fifteen_min / cpus * 100.0,
        )
    }
}

/// Memory totals from /proc/meminfo.
#[derive(Debug, Clone, Copy)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl MemoryInfo {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    /// Used memory in percent of the total.
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes() as f64 / self.total_bytes as f64 * 100.0
    }
}

pub fn cpu_count() -> usize {
    *CPU_COUNT
}

/// Reads load average from /proc/loadavg.
///
/// Format: "0.00 0.01 0.05 1/234 5678"
pub fn read_load_average() -> Result<LoadAverage, String> {
    let content = fs::read_to_string("/proc/loadavg")
        .map_err(|e| format!("Failed to read /proc/loadavg: {}", e))?;
    parse_load_average(&content)
}

fn parse_load_average(content: &str) -> Result<LoadAverage, String> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(format!(
            "Invalid /proc/loadavg format: expected at least 3 fields, got {}",
            parts.len()
        ));
    }

    let parse = |idx: usize, label: &str| {
        parts[idx]
            .parse::<f64>()
            .map_err(|e| format!("Failed to parse {} load average: {}", label, e))
    };

    Ok(LoadAverage {
        one_min: parse(0, "1min")?,
        five_min: parse(1, "5min")?,
        fifteen_min: parse(2, "15min")?,
    })
}

/// Reads MemTotal and MemAvailable from /proc/meminfo.
pub fn read_memory_info() -> Result<MemoryInfo, String> {
    let content = fs::read_to_string("/proc/meminfo")
        .map_err(|e| format!("Failed to read /proc/meminfo: {}", e))?;
    parse_meminfo(&content)
}

fn parse_meminfo(content: &str) -> Result<MemoryInfo, String> {
    let mut total_bytes: Option<u64> = None;
    let mut available_bytes: Option<u64> = None;

    for line in content.lines() {
        let slot = if line.starts_with("MemTotal:") {
            &mut total_bytes
        } else if line.starts_with("MemAvailable:") {
            &mut available_bytes
        } else {
            continue;
        };

        if let Some(kb) = line
            .split_whitespace()
            .nth(1)
            .and_then(|v| v.parse::<u64>().ok())
        {
            *slot = Some(kb * 1024);
        }

        if total_bytes.is_some() && available_bytes.is_some() {
            break;
        }
    }

    match (total_bytes, available_bytes) {
        (Some(total_bytes), Some(available_bytes)) => Ok(MemoryInfo {
            total_bytes,
            available_bytes,
        }),
        _ => Err("Failed to parse required fields from /proc/meminfo".to_string()),
    }
}

/// Reads system uptime in seconds from /proc/uptime.
pub fn read_uptime() -> Result<f64, String> {
    let content = fs::read_to_string("/proc/uptime")
        .map_err(|e| format!("Failed to read /proc/uptime: {}", e))?;

    content
        .split_whitespace()
        .next()
        .ok_or_else(|| "Invalid /proc/uptime format: no fields found".to_string())?
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse uptime: {}", e))
}

/// Node name from the uname syscall.
pub fn hostname() -> Result<String, String> {
    use std::ffi::CStr;
    use std::mem;

    unsafe {
        // SAFETY: libc::utsname only holds c_char arrays, zeroed memory is valid
        let mut utsname: libc::utsname = mem::zeroed();
        if libc::uname(&mut utsname) == 0 {
            Ok(CStr::from_ptr(utsname.nodename.as_ptr())
                .to_string_lossy()
                .into_owned())
        } else {
            Err("Failed to call uname".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load_average() {
        let load = parse_load_average("0.52 0.58 0.59 2/1190 12345").unwrap();
        assert!((load.one_min - 0.52).abs() < 0.001);
        assert!((load.five_min - 0.58).abs() < 0.001);
        assert!((load.fifteen_min - 0.59).abs() < 0.001);
    }

    #[test]
    fn test_parse_load_average_invalid() {
        assert!(parse_load_average("0.52 0.58").is_err());
        assert!(parse_load_average("abc def ghi 1/2 3").is_err());
    }

    #[test]
    fn test_load_percent_of_cpus() {
        let load = LoadAverage {
            one_min: 2.0,
            five_min: 4.0,
            fifteen_min: 1.0,
        };
        let (one, five, fifteen) = load.as_percent_of(4);
        assert!((one - 50.0).abs() < 1e-9);
        assert!((five - 100.0).abs() < 1e-9);
        assert!((fifteen - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_meminfo() {
        let content = "MemTotal:       16000000 kB\nMemFree:         1000000 kB\nMemAvailable:    4000000 kB\n";
        let info = parse_meminfo(content).unwrap();
        assert_eq!(info.total_bytes, 16_000_000 * 1024);
        assert_eq!(info.available_bytes, 4_000_000 * 1024);
        assert!((info.used_percent() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_meminfo_missing_fields() {
        assert!(parse_meminfo("MemTotal: 100 kB\n").is_err());
    }

    #[test]
    fn test_cpu_count_positive() {
        assert!(cpu_count() >= 1);
    }
}
