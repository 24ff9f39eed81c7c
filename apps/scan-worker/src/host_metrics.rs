// [apps/scan-worker/src/host_metrics.rs]

//! Samples the host's CPU and memory load for the heartbeat's
//! [`NodeMetrics`] (§4.6). Grounded on the teacher's `cpu_manager.rs`
//! procfs readers, trimmed to the two fields the orchestrator's load
//! score actually uses — this worker has no thermal-throttling concern
//! of its own to report.

use std::fs;

use scancore_domain_models::node::NodeMetrics;

/// Tracks in-flight task count and a rolling completed-task counter
/// between heartbeats, the two fields [`sample`] can't read from procfs.
#[derive(Default)]
pub struct WorkerActivity {
    active: std::sync::atomic::AtomicU32,
    completed_since_heartbeat: std::sync::atomic::AtomicU32,
}

impl WorkerActivity {
    pub fn task_started(&self) {
        self.active.store(1, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn task_finished(&self) {
        self.active.store(0, std::sync::atomic::Ordering::Relaxed);
        self.completed_since_heartbeat.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    /// Samples current host load plus this worker's activity counters,
    /// resetting the completed-task counter for the next window.
    pub fn sample(&self) -> NodeMetrics {
        let task_count = self.active.load(std::sync::atomic::Ordering::Relaxed);
        let throughput_last_minute = self.completed_since_heartbeat.swap(0, std::sync::atomic::Ordering::Relaxed);
        NodeMetrics {
            task_count,
            cpu_percent: cpu_load_percent(),
            mem_percent: memory_used_percent(),
            throughput_last_minute: throughput_last_minute as f32,
        }
    }
}

/// Approximates CPU load as the 1-minute load average against core count,
/// clamped to [0, 100].
fn cpu_load_percent() -> f32 {
    let load_average = fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|content| content.split_whitespace().next().and_then(|v| v.parse::<f32>().ok()))
        .unwrap_or(0.0);
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as f32;
    (load_average / cores * 100.0).clamp(0.0, 100.0)
}

/// Reads `/proc/meminfo` and returns `(total - available) / total * 100`.
fn memory_used_percent() -> f32 {
    let Ok(content) = fs::read_to_string("/proc/meminfo") else { return 0.0 };
    let mut total_kb = 0u64;
    let mut available_kb = 0u64;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total_kb = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available_kb = parse_kb(rest);
        }
    }
    if total_kb == 0 {
        return 0.0;
    }
    (total_kb.saturating_sub(available_kb) as f32 / total_kb as f32 * 100.0).clamp(0.0, 100.0)
}

fn parse_kb(field: &str) -> u64 {
    field.split_whitespace().next().and_then(|v| v.parse::<u64>().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_reports_zero_when_idle() {
        let activity = WorkerActivity::default();
        let metrics = activity.sample();
        assert_eq!(metrics.task_count, 0);
        assert_eq!(metrics.throughput_last_minute, 0.0);
    }

    #[test]
    fn completed_count_resets_after_sample() {
        let activity = WorkerActivity::default();
        activity.task_started();
        activity.task_finished();
        let first = activity.sample();
        assert_eq!(first.throughput_last_minute, 1.0);
        let second = activity.sample();
        assert_eq!(second.throughput_last_minute, 0.0);
    }
}
