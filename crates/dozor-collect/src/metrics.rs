//! Instant host metrics (§4.2.4). Deliberately not retained as a series —
//! every call re-samples from scratch.

use sysinfo::{Disks, System};

#[derive(Debug, Clone)]
pub struct DiskUsage {
    pub mount: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
}

impl DiskUsage {
    pub fn used_pct(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.used_bytes as f64 / self.total_bytes as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostMetrics {
    pub cpu_usage_pct: f64,
    pub load_avg_1m: f64,
    pub load_avg_5m: f64,
    pub load_avg_15m: f64,
    pub mem_total_mb: u64,
    pub mem_used_mb: u64,
    pub mem_usage_pct: f64,
    pub swap_total_mb: u64,
    pub swap_used_mb: u64,
    pub disks: Vec<DiskUsage>,
    pub uptime_secs: u64,
}

/// Samples CPU, memory, swap, and per-filesystem disk usage once.
pub fn sample() -> HostMetrics {
    let mut sys = System::new_all();
    sys.refresh_all();

    let mem_total = sys.total_memory();
    let mem_used = sys.used_memory();
    let mem_usage_pct = if mem_total > 0 { (mem_used as f64 / mem_total as f64) * 100.0 } else { 0.0 };
    let load = System::load_average();

    let disks = Disks::new_with_refreshed_list()
        .iter()
        .map(|d| DiskUsage {
            mount: d.mount_point().to_string_lossy().into_owned(),
            total_bytes: d.total_space(),
            used_bytes: d.total_space() - d.available_space(),
            available_bytes: d.available_space(),
        })
        .collect();

    HostMetrics {
        cpu_usage_pct: sys.global_cpu_usage() as f64,
        load_avg_1m: load.one,
        load_avg_5m: load.five,
        load_avg_15m: load.fifteen,
        mem_total_mb: mem_total / 1024 / 1024,
        mem_used_mb: mem_used / 1024 / 1024,
        mem_usage_pct,
        swap_total_mb: sys.total_swap() / 1024 / 1024,
        swap_used_mb: sys.used_swap() / 1024 / 1024,
        disks,
        uptime_secs: System::uptime(),
    }
}

/// Filesystem(s) above `critical_pct` usage, used to gate the triage
/// disk-pressure section (§4.3).
pub fn disks_above_threshold(metrics: &HostMetrics, threshold_pct: f64) -> Vec<&DiskUsage> {
    metrics.disks.iter().filter(|d| d.used_pct() >= threshold_pct).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_pct_handles_zero_total() {
        let disk = DiskUsage { mount: "/x".into(), total_bytes: 0, used_bytes: 0, available_bytes: 0 };
        assert_eq!(disk.used_pct(), 0.0);
    }

    #[test]
    fn disks_above_threshold_filters_correctly() {
        let metrics = HostMetrics {
            cpu_usage_pct: 0.0,
            load_avg_1m: 0.0,
            load_avg_5m: 0.0,
            load_avg_15m: 0.0,
            mem_total_mb: 0,
            mem_used_mb: 0,
            mem_usage_pct: 0.0,
            swap_total_mb: 0,
            swap_used_mb: 0,
            disks: vec![
                DiskUsage { mount: "/".into(), total_bytes: 100, used_bytes: 95, available_bytes: 5 },
                DiskUsage { mount: "/data".into(), total_bytes: 100, used_bytes: 10, available_bytes: 90 },
            ],
            uptime_secs: 0,
        };
        let above = disks_above_threshold(&metrics, 90.0);
        assert_eq!(above.len(), 1);
        assert_eq!(above[0].mount, "/");
    }
}
