//! NVIDIA GPU collector.
//!
//! Queries `nvidia-smi` when it is installed. Hosts without it simply report
//! no GPUs.

use std::process::Command;
use tracing::debug;

const QUERY_FIELDS: &str = "index,utilization.gpu,memory.used,memory.total,temperature.gpu";

/// Current state of one GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuStatus {
    pub index: u32,
    /// Utilisation in percent.
    pub utilization: f64,
    pub memory_used_mib: u64,
    pub memory_total_mib: u64,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
}

impl GpuStatus {
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total_mib == 0 {
            return 0.0;
        }
        self.memory_used_mib as f64 / self.memory_total_mib as f64 * 100.0
    }
}

/// Parses `nvidia-smi --format=csv,noheader,nounits` output for the queried fields.
pub fn parse_gpu_csv(output: &str) -> Result<Vec<GpuStatus>, String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != 5 {
                return Err(format!("unexpected nvidia-smi line: {}", line));
            }
            let bad = |name: &str| format!("invalid {} in nvidia-smi line: {}", name, line);
            Ok(GpuStatus {
                index: fields[0].parse().map_err(|_| bad("index"))?,
                utilization: fields[1].parse().map_err(|_| bad("utilization"))?,
                memory_used_mib: fields[2].parse().map_err(|_| bad("memory.used"))?,
                memory_total_mib: fields[3].parse().map_err(|_| bad("memory.total"))?,
                temperature: fields[4].parse().map_err(|_| bad("temperature"))?,
            })
        })
        .collect()
}

/// Lists GPUs via `nvidia-smi`. `Ok(vec![])` if the tool is not available.
pub fn read_gpus() -> Result<Vec<GpuStatus>, String> {
    let output = match Command::new("nvidia-smi")
        .arg(format!("--query-gpu={}", QUERY_FIELDS))
        .arg("--format=csv,noheader,nounits")
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            debug!("nvidia-smi not available: {}", e);
            return Ok(Vec::new());
        }
    };

    if !output.status.success() {
        return Err(format!(
            "nvidia-smi failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    parse_gpu_csv(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gpu_csv() {
        let gpus = parse_gpu_csv("0, 37, 2048, 8192, 61\n1, 0, 0, 8192, 35\n\n").unwrap();
        assert_eq!(gpus.len(), 2);
        assert_eq!(
            gpus[0],
            GpuStatus {
                index: 0,
                utilization: 37.0,
                memory_used_mib: 2048,
                memory_total_mib: 8192,
                temperature: 61.0,
            }
        );
        assert_eq!(gpus[0].memory_percent(), 25.0);
        assert_eq!(gpus[1].memory_percent(), 0.0);
    }

    #[test]
    fn test_parse_gpu_csv_rejects_unsupported_values() {
        assert!(parse_gpu_csv("0, [N/A], 1, 2, 40").is_err());
        assert!(parse_gpu_csv("0, 1, 2").is_err());
    }
}
