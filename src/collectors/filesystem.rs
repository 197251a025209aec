//! Disk mounts and their usage.
//!
//! Mounts come from /proc/mounts, usage from libc statvfs. Pseudo
//! filesystems, loop devices and boot partitions are not observed.

use std::fs;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A mounted block device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskMount {
    pub device: String,
    pub mount_point: String,
    pub fstype: String,
}

/// Space usage of one mount point.
#[derive(Debug, Clone, Copy)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    /// Space available to unprivileged users.
    pub free_bytes: u64,
}

impl DiskUsage {
    /// Used space in percent, computed like `df` (used / (used + avail)).
    pub fn used_percent(&self) -> f64 {
        let denominator = self.used_bytes + self.free_bytes;
        if denominator == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / denominator as f64 * 100.0
    }

    pub fn free_gib(&self) -> f64 {
        bytes_to_gib(self.free_bytes)
    }
}

pub fn bytes_to_gib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GIB
}

/// Lists observable disk mounts from /proc/mounts.
pub fn list_disk_mounts() -> Result<Vec<DiskMount>, String> {
    let content = fs::read_to_string("/proc/mounts")
        .map_err(|e| format!("Failed to read /proc/mounts: {}", e))?;
    Ok(parse_mounts(&content))
}

fn parse_mounts(content: &str) -> Vec<DiskMount> {
    let mut mounts: Vec<DiskMount> = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }

        let device = unescape_mount_field(parts[0]);
        let mount_point = unescape_mount_field(parts[1]);
        let fstype = parts[2];
        if should_skip_mount(&device, fstype, &mount_point) {
            continue;
        }
        // bind mounts show up more than once
        if mounts.iter().any(|m| m.mount_point == mount_point) {
            continue;
        }

        mounts.push(DiskMount {
            device,
            mount_point,
            fstype: fstype.to_string(),
        });
    }

    mounts
}

/// Decodes the octal escapes the kernel uses in /proc/mounts
/// (`\040` space, `\011` tab, `\012` newline, `\134` backslash).
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn should_skip_mount(device: &str, fstype: &str, mount_point: &str) -> bool {
    let skip_types = [
        "proc",
        "sysfs",
        "devpts",
        "devtmpfs",
        "tmpfs",
        "cgroup",
        "cgroup2",
        "pstore",
        "bpf",
        "debugfs",
        "tracefs",
        "fusectl",
        "configfs",
        "securityfs",
        "hugetlbfs",
        "mqueue",
        "autofs",
        "binfmt_misc",
        "overlay",
        "squashfs",
        "nsfs",
    ];

    if skip_types.contains(&fstype) {
        return true;
    }

    if device.contains("loop") || !device.starts_with('/') {
        return true;
    }

    mount_point.starts_with("/boot")
        || mount_point.starts_with("/proc")
        || mount_point.starts_with("/sys")
        || mount_point.starts_with("/dev")
        || mount_point.starts_with("/run")
        || mount_point.starts_with("/snap")
}

/// Reads space usage of `path` using libc statvfs.
pub fn disk_usage(path: &str) -> Result<DiskUsage, String> {
    use std::ffi::CString;
    use std::mem;

    let c_path = CString::new(path).map_err(|e| format!("Invalid path: {}", e))?;

    unsafe {
        // SAFETY: statvfs is a plain C struct, zeroed memory is valid
        let mut stat: libc::statvfs = mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(format!(
                "statvfs failed for {}: {}",
                path,
                std::io::Error::last_os_error()
            ));
        }

        let block_size = stat.f_frsize as u64;
        let total_bytes = block_size * stat.f_blocks as u64;
        let free_bytes = block_size * stat.f_bavail as u64;
        let used_bytes = total_bytes.saturating_sub(block_size * stat.f_bfree as u64);

        Ok(DiskUsage {
            total_bytes,
            used_bytes,
            free_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUNTS: &str = "\
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid 0 0
tmpfs /run tmpfs rw 0 0
/dev/nvme0n1p1 /boot/efi vfat rw 0 0
/dev/loop3 /snap/core/123 squashfs ro 0 0
/dev/sda1 /data xfs rw 0 0
/dev/sda1 /data xfs rw 0 0
";

    #[test]
    fn test_parse_mounts_filters_and_dedups() {
        let mounts = parse_mounts(MOUNTS);
        let points: Vec<&str> = mounts.iter().map(|m| m.mount_point.as_str()).collect();
        assert_eq!(points, vec!["/", "/data"]);
        assert_eq!(mounts[1].fstype, "xfs");
    }

    #[test]
    fn test_mount_points_with_spaces_are_decoded() {
        let mounts = parse_mounts(
            "/dev/sdb1 /media/usb\\040stick vfat rw 0 0\n/dev/sdc1 /srv/a\\134b ext4 rw 0 0\n",
        );
        let points: Vec<&str> = mounts.iter().map(|m| m.mount_point.as_str()).collect();
        assert_eq!(points, vec!["/media/usb stick", "/srv/a\\b"]);
    }

    #[test]
    fn test_unescape_mount_field() {
        assert_eq!(unescape_mount_field("/plain"), "/plain");
        assert_eq!(unescape_mount_field("/a\\011b"), "/a\tb");
        // incomplete or non-octal escapes stay as they are
        assert_eq!(unescape_mount_field("/x\\04"), "/x\\04");
        assert_eq!(unescape_mount_field("/x\\9zz"), "/x\\9zz");
    }

    #[test]
    fn test_should_skip_mount() {
        assert!(should_skip_mount("proc", "proc", "/proc"));
        assert!(should_skip_mount("/dev/loop0", "ext4", "/mnt/image"));
        assert!(should_skip_mount("/dev/sda1", "ext4", "/boot"));
        assert!(!should_skip_mount("/dev/sda2", "ext4", "/"));
    }

    #[test]
    fn test_used_percent_like_df() {
        let usage = DiskUsage {
            total_bytes: 100,
            used_bytes: 45,
            free_bytes: 45,
        };
        assert!((usage.used_percent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_disk_usage_of_root() {
        let usage = disk_usage("/").unwrap();
        assert!(usage.total_bytes > 0);
        assert!(usage.used_percent() >= 0.0 && usage.used_percent() <= 100.0);
    }

    #[test]
    fn test_disk_usage_invalid_path() {
        assert!(disk_usage("/definitely/not/a/mount/point").is_err());
    }
}
