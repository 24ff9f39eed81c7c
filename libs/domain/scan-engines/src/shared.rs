// [libs/domain/scan-engines/src/shared.rs]

//! The cross-engine shapes every engine in this crate dispatches through:
//! the `ResultSink` callback (the generalized `FindingHandler` from
//! `executor.rs`), the terminal `EngineOutcome`, and a progress-cadence
//! gate shared by all three engines.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Callback an engine streams its results through. Implementors decide
/// whether that means an in-process channel, a direct write to the Asset
/// Repository, or a test harness's `Vec`. `Send + Sync` so an engine can
/// hold one behind an `Arc` across concurrently spawned workers.
pub trait ResultSink<T>: Send + Sync {
    fn emit(&self, item: T);
}

impl<T, F: Fn(T) + Send + Sync> ResultSink<T> for F {
    fn emit(&self, item: T) {
        self(item)
    }
}

/// Terminal report an engine run produces, the generalization of the
/// teacher's `AuditReport`: duration and volume instead of hashes-audited,
/// a plain completed/cancelled/failed verdict instead of a mission status
/// string.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineOutcome {
    pub verdict: EngineVerdict,
    pub duration_ms: u64,
    pub units_processed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineVerdict {
    Completed,
    Cancelled,
    Failed,
}

/// Times a run and folds the cancellation flag into the final verdict,
/// mirroring `execute_mission_sequence`'s duration/interruption bookkeeping
/// without the hardware-signature and hash-rate fields that have no
/// counterpart here.
pub struct RunTimer {
    started_at: Instant,
    processed: AtomicU64,
}

impl RunTimer {
    pub fn start() -> Self {
        Self { started_at: Instant::now(), processed: AtomicU64::new(0) }
    }

    pub fn record_unit(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_units(&self, n: u64) {
        self.processed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn finish(&self, cancel: &CancellationToken, failed: bool) -> EngineOutcome {
        let verdict = if failed {
            EngineVerdict::Failed
        } else if cancel.is_cancelled() {
            EngineVerdict::Cancelled
        } else {
            EngineVerdict::Completed
        };
        EngineOutcome {
            verdict,
            duration_ms: self.started_at.elapsed().as_millis() as u64,
            units_processed: self.processed.load(Ordering::Relaxed),
        }
    }
}

/// Gates progress publication to "at least every 1s or every 1% of work,
/// whichever is coarser" (§4.2, §4.3), generalized from the teacher's raw
/// `effort_telemetry_accumulator: Arc<AtomicU64>` counter.
pub struct ProgressThrottle {
    last_emit: std::sync::Mutex<Instant>,
    last_fraction: std::sync::Mutex<f64>,
    min_interval: Duration,
    min_fraction_delta: f64,
}

impl ProgressThrottle {
    pub fn new(min_interval: Duration, min_fraction_delta: f64) -> Self {
        Self {
            last_emit: std::sync::Mutex::new(Instant::now() - min_interval),
            last_fraction: std::sync::Mutex::new(-1.0),
            min_interval,
            min_fraction_delta,
        }
    }

    /// Returns whether `fraction` should be published now, updating its
    /// internal gate if so. `fraction` is expected monotonic non-decreasing
    /// per §5's ordering guarantee; the gate does not enforce this itself.
    pub fn should_emit(&self, fraction: f64) -> bool {
        let mut last_emit = self.last_emit.lock().expect("progress throttle lock poisoned");
        let mut last_fraction = self.last_fraction.lock().expect("progress throttle lock poisoned");

        let time_due = last_emit.elapsed() >= self.min_interval;
        let fraction_due = fraction - *last_fraction >= self.min_fraction_delta || fraction >= 1.0;
        if time_due || fraction_due {
            *last_emit = Instant::now();
            *last_fraction = fraction;
            true
        } else {
            false
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 0.01)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_always_emits() {
        let throttle = ProgressThrottle::default();
        assert!(throttle.should_emit(0.0));
    }

    #[test]
    fn suppresses_rapid_small_deltas() {
        let throttle = ProgressThrottle::default();
        assert!(throttle.should_emit(0.0));
        assert!(!throttle.should_emit(0.001));
    }
}
