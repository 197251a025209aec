//! System status message.
//!
//! Markdown text with uptime, CPUs, memory, load and a disk table, sent as
//! startup greeting and served by `info` and `/info`.

use chrono::Local;
use std::fmt::Write as FmtWrite;
use tracing::warn;

use crate::collectors::filesystem::{disk_usage, list_disk_mounts, DiskMount, DiskUsage};
use crate::collectors::gpu::{read_gpus, GpuStatus};
use crate::system::{
    cpu_count, hostname, read_load_average, read_memory_info, read_uptime, LoadAverage,
    MemoryInfo,
};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Values shown in the status message.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    pub hostname: String,
    pub uptime_seconds: Option<f64>,
    pub cpus: usize,
    pub memory: Option<MemoryInfo>,
    pub load: Option<LoadAverage>,
    pub disks: Vec<(DiskMount, DiskUsage)>,
    /// Empty without GPUs, `Err` if they could not be queried.
    pub gpus: Result<Vec<GpuStatus>, String>,
}

impl SystemSnapshot {
    /// Reads the current values. Unreadable parts are left empty.
    pub fn collect() -> Self {
        let disks = match list_disk_mounts() {
            Ok(mounts) => mounts
                .into_iter()
                .filter_map(|m| match disk_usage(&m.mount_point) {
                    Ok(usage) => Some((m, usage)),
                    Err(e) => {
                        warn!("Skipping disk {}: {}", m.mount_point, e);
                        None
                    }
                })
                .collect(),
            Err(e) => {
                warn!("Failed to list disk mounts: {}", e);
                Vec::new()
            }
        };

        Self {
            hostname: local_machine_name(),
            uptime_seconds: read_uptime().ok(),
            cpus: cpu_count(),
            memory: read_memory_info().ok(),
            load: read_load_average().ok(),
            disks,
            gpus: read_gpus().map_err(|e| {
                warn!("Failed to query GPUs: {}", e);
                e
            }),
        }
    }
}

/// Host name, or "unknown" if uname fails.
pub fn local_machine_name() -> String {
    hostname().unwrap_or_else(|e| {
        warn!("{}", e);
        "unknown".to_string()
    })
}

/// Formats seconds like `3 days, 4:05:06`.
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let rest = seconds % 86_400;
    let clock = format!(
        "{}:{:02}:{:02}",
        rest / 3600,
        (rest % 3600) / 60,
        rest % 60
    );
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

/// Formats a byte count with a binary unit suffix, e.g. `1.5G`.
pub fn bytes_to_human(bytes: u64) -> String {
    const SYMBOLS: [&str; 8] = ["K", "M", "G", "T", "P", "E", "Z", "Y"];
    for (i, symbol) in SYMBOLS.iter().enumerate().rev() {
        let prefix = 1u128 << ((i + 1) * 10);
        if bytes as u128 >= prefix {
            return format!("{:.1}{}", bytes as f64 / prefix as f64, symbol);
        }
    }
    format!("{}B", bytes)
}

fn render_system_block(snapshot: &SystemSnapshot) -> String {
    let mut out = String::new();
    writeln!(out, "```").ok();

    let uptime = snapshot
        .uptime_seconds
        .map(|s| format_uptime(s as u64))
        .unwrap_or_else(|| "N/A".to_string());
    writeln!(out, "Uptime:  {}", uptime).ok();
    writeln!(out, "CPUs:    {}", snapshot.cpus).ok();

    let _ = match &snapshot.memory {
        Some(mem) => writeln!(out, "RAM:     {:.1} GB", mem.total_bytes as f64 / BYTES_PER_GB),
        None => writeln!(out, "RAM:     N/A"),
    };
    writeln!(out).ok();

    let _ = match &snapshot.load {
        Some(load) => {
            let (one, five, fifteen) = load.as_percent_of(snapshot.cpus);
            writeln!(
                out,
                "Load:    1min: {:.1}%, 5min: {:.1}%, 15min: {:.1}%",
                one, five, fifteen
            )
        }
        None => writeln!(out, "Load:    N/A"),
    };

    let _ = match &snapshot.memory {
        Some(mem) => writeln!(
            out,
            "Memory:  {:.1}% [used: {:.1} / {:.1} GB] [available: {:.1} GB]",
            mem.used_percent(),
            mem.used_bytes() as f64 / BYTES_PER_GB,
            mem.total_bytes as f64 / BYTES_PER_GB,
            mem.available_bytes as f64 / BYTES_PER_GB
        ),
        None => writeln!(out, "Memory:  N/A"),
    };

    write!(out, "```").ok();
    out
}

/// Renders rows as an aligned table inside a code block. The first
/// `text_columns` columns are left aligned, the rest right aligned.
fn render_code_table(header: &[&str], rows: &[Vec<String>], text_columns: usize) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, field) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(field.chars().count());
        }
    }

    let mut out = String::new();
    writeln!(out, "```").ok();

    let line: Vec<String> = header
        .iter()
        .zip(widths.iter())
        .map(|(h, w)| format!("{:<w$}", h, w = *w))
        .collect();
    writeln!(out, "{}", line.join(" | ")).ok();

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", separator.join(" | ")).ok();

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(widths.iter())
            .enumerate()
            .map(|(i, (field, w))| {
                if i < text_columns {
                    format!("{:<w$}", field, w = *w)
                } else {
                    format!("{:>w$}", field, w = *w)
                }
            })
            .collect();
        writeln!(out, "{}", line.join(" | ")).ok();
    }

    write!(out, "```").ok();
    out
}

fn render_disk_block(disks: &[(DiskMount, DiskUsage)]) -> Option<String> {
    if disks.is_empty() {
        return None;
    }

    let rows: Vec<Vec<String>> = disks
        .iter()
        .map(|(mount, usage)| {
            vec![
                mount.device.clone(),
                mount.mount_point.clone(),
                format!("{:.1} %", usage.used_percent()),
                bytes_to_human(usage.total_bytes),
                bytes_to_human(usage.used_bytes),
                bytes_to_human(usage.free_bytes),
            ]
        })
        .collect();

    Some(render_code_table(
        &["Device", "Mount", "Use", "Total", "Used", "Free"],
        &rows,
        2,
    ))
}

fn render_gpu_block(gpus: &[GpuStatus]) -> String {
    let rows: Vec<Vec<String>> = gpus
        .iter()
        .map(|gpu| {
            vec![
                gpu.index.to_string(),
                format!("{:.0} %", gpu.utilization),
                format!("{:.1} %", gpu.memory_percent()),
                format!("{:.1} °C", gpu.temperature),
                format!("{} / {} MB", gpu.memory_used_mib, gpu.memory_total_mib),
            ]
        })
        .collect();

    render_code_table(&["ID", "Util", "Mem", "Temp", "Memory (Used)"], &rows, 1)
}

/// Renders the status message for `snapshot` at time `date`.
pub fn render_info_message(snapshot: &SystemSnapshot, date: &str) -> String {
    let mut message = String::new();
    writeln!(message, "**Status of `{}`**", snapshot.hostname).ok();
    writeln!(message, "Date: `{}`", date).ok();
    writeln!(message).ok();

    writeln!(message, "System information:").ok();
    writeln!(message, "{}", render_system_block(snapshot)).ok();

    match render_disk_block(&snapshot.disks) {
        Some(block) => {
            writeln!(message, "Disk information:").ok();
            writeln!(message, "{}", block).ok();
        }
        None => {
            writeln!(message, "Disk information: N/A").ok();
        }
    }

    // GPU section only on hosts that have GPUs
    match &snapshot.gpus {
        Ok(gpus) if gpus.is_empty() => {}
        Ok(gpus) => {
            writeln!(message, "GPU information:").ok();
            writeln!(message, "{}", render_gpu_block(gpus)).ok();
        }
        Err(_) => {
            writeln!(message, "GPU information: N/A").ok();
        }
    }

    message
}

/// Collects and renders the current status message.
pub fn info_message() -> String {
    let date = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    render_info_message(&SystemSnapshot::collect(), &date)
}

/// Startup greeting sent once the notifier runs.
pub fn greeting_message(hostname: &str) -> String {
    format!("Running observer on `{}`...", hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SystemSnapshot {
        SystemSnapshot {
            hostname: "node-1".into(),
            uptime_seconds: Some(93_784.0),
            cpus: 4,
            memory: Some(MemoryInfo {
                total_bytes: 16 * 1024 * 1024 * 1024,
                available_bytes: 4 * 1024 * 1024 * 1024,
            }),
            load: Some(LoadAverage {
                one_min: 1.0,
                five_min: 2.0,
                fifteen_min: 4.0,
            }),
            disks: vec![(
                DiskMount {
                    device: "/dev/sda1".into(),
                    mount_point: "/".into(),
                    fstype: "ext4".into(),
                },
                DiskUsage {
                    total_bytes: 100 * 1024 * 1024 * 1024,
                    used_bytes: 50 * 1024 * 1024 * 1024,
                    free_bytes: 50 * 1024 * 1024 * 1024,
                },
            )],
            gpus: Ok(Vec::new()),
        }
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(59), "0:00:59");
        assert_eq!(format_uptime(3_725), "1:02:05");
        assert_eq!(format_uptime(93_784), "1 day, 2:03:04");
        assert_eq!(format_uptime(2 * 86_400), "2 days, 0:00:00");
    }

    #[test]
    fn test_bytes_to_human() {
        assert_eq!(bytes_to_human(512), "512B");
        assert_eq!(bytes_to_human(1024), "1.0K");
        assert_eq!(bytes_to_human(10 * 1024 * 1024 * 1024), "10.0G");
    }

    #[test]
    fn test_render_info_message() {
        let message = render_info_message(&snapshot(), "2024-01-01 12:00:00");
        assert!(message.starts_with("**Status of `node-1`**"));
        assert!(message.contains("Uptime:  1 day, 2:03:04"));
        assert!(message.contains("CPUs:    4"));
        assert!(message.contains("Load:    1min: 25.0%, 5min: 50.0%, 15min: 100.0%"));
        assert!(message.contains("Memory:  75.0% [used: 12.0 / 16.0 GB] [available: 4.0 GB]"));
        assert!(message.contains("Device    | Mount | Use"));
        assert!(message.contains("50.0 %"));
    }

    #[test]
    fn test_render_without_disks() {
        let mut snapshot = snapshot();
        snapshot.disks.clear();
        snapshot.load = None;
        let message = render_info_message(&snapshot, "now");
        assert!(message.contains("Disk information: N/A"));
        assert!(message.contains("Load:    N/A"));
        assert!(!message.contains("GPU information"));
    }

    #[test]
    fn test_render_gpu_section() {
        let mut snapshot = snapshot();
        snapshot.gpus = Ok(vec![GpuStatus {
            index: 0,
            utilization: 37.0,
            memory_used_mib: 2048,
            memory_total_mib: 8192,
            temperature: 61.0,
        }]);
        let message = render_info_message(&snapshot, "now");
        assert!(message.contains("GPU information:"));
        assert!(message.contains("ID | Util | Mem    | Temp    | Memory (Used)"));
        assert!(message.contains("0  | 37 % | 25.0 % | 61.0 °C | 2048 / 8192 MB"));

        snapshot.gpus = Err("nvidia-smi failed".into());
        let message = render_info_message(&snapshot, "now");
        assert!(message.contains("GPU information: N/A"));
    }
}
