// [libs/domain/scan-engines/src/monitor/mod.rs]

//! Page monitoring (§4.4): fetch, a five-step preprocessing pipeline, a
//! four-part weighted similarity score against the previous snapshot,
//! diff generation on change, and a backoff-aware due-time scheduler.

mod diff;
mod fetch;
mod preprocess;
mod similarity;

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::instrument;

use scancore_domain_models::task::PageMonitorConfig;

pub use diff::ContentDiff;
pub use fetch::{AuthMode, FetchResult};
pub use similarity::similarity;

use crate::errors::EngineError;

#[derive(Debug, Clone, Serialize)]
pub struct MonitorResult {
    pub url: String,
    pub changed: bool,
    pub similarity_score: f64,
    pub content_hash: String,
    pub diff: Option<ContentDiff>,
    pub checked_at: DateTime<Utc>,
    pub status_code: u16,
    /// Raw fetched body, handed back so a caller can persist it and replay
    /// it as `previous_raw` on the next call.
    pub raw_body: String,
    pub extracted_text: String,
    pub size_bytes: u64,
    pub load_time_ms: u64,
}

pub struct MonitorEngine {
    client: reqwest::Client,
}

impl MonitorEngine {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    /// Fetches `config.url`, preprocesses both the new and previous
    /// snapshots, and scores their similarity. `previous_raw` is the
    /// raw (unprocessed) body from the last check, if any.
    #[instrument(skip(self, config, previous_raw))]
    pub async fn check_once(
        &self,
        config: &PageMonitorConfig,
        previous_raw: Option<&str>,
    ) -> Result<MonitorResult, EngineError> {
        let auth = AuthMode::from_config(config.authentication.as_ref());
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let started = std::time::Instant::now();

        let fetched: FetchResult =
            fetch::fetch_page(&self.client, &config.url, &auth, &config.headers, timeout).await?;
        let load_time_ms = started.elapsed().as_millis() as u64;
        let size_bytes = fetched.body.len() as u64;

        let new_text = preprocess::extract_text(&fetched.body);
        let new_processed = preprocess::preprocess(&new_text, config.ignore_numbers, &config.ignore_patterns)?;

        let result = match previous_raw {
            None => MonitorResult {
                url: config.url.clone(),
                changed: true,
                similarity_score: 0.0,
                content_hash: fetched.content_hash,
                diff: None,
                checked_at: Utc::now(),
                status_code: fetched.status,
                raw_body: fetched.body,
                extracted_text: new_text,
                size_bytes,
                load_time_ms,
            },
            Some(previous_raw) => {
                let previous_text = preprocess::extract_text(previous_raw);
                let previous_processed =
                    preprocess::preprocess(&previous_text, config.ignore_numbers, &config.ignore_patterns)?;
                let score = similarity::similarity(&previous_processed, &new_processed);
                let changed = score < config.similarity_threshold;
                let diff = if changed { Some(diff::build_diff(&previous_processed, &new_processed)) } else { None };

                MonitorResult {
                    url: config.url.clone(),
                    changed,
                    similarity_score: score,
                    content_hash: fetched.content_hash,
                    diff,
                    checked_at: Utc::now(),
                    status_code: fetched.status,
                    raw_body: fetched.body,
                    extracted_text: new_text,
                    size_bytes,
                    load_time_ms,
                }
            }
        };

        Ok(result)
    }
}

impl Default for MonitorEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// A single monitored target's position in the due-time schedule, with
/// exponential backoff applied after consecutive fetch failures.
#[derive(Debug, Clone)]
struct ScheduledMonitor {
    task_id: uuid::Uuid,
    next_due: DateTime<Utc>,
    interval: Duration,
    consecutive_failures: u32,
}

const MAX_BACKOFF_MULTIPLIER: u32 = 16;

impl ScheduledMonitor {
    fn backoff_interval(&self) -> Duration {
        let multiplier = 2u32.saturating_pow(self.consecutive_failures).min(MAX_BACKOFF_MULTIPLIER);
        self.interval * multiplier
    }
}

impl PartialEq for ScheduledMonitor {
    fn eq(&self, other: &Self) -> bool {
        self.next_due == other.next_due
    }
}
impl Eq for ScheduledMonitor {}
impl PartialOrd for ScheduledMonitor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScheduledMonitor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.next_due.cmp(&other.next_due)
    }
}

/// A due target popped off the schedule, carrying its prior failure
/// streak so the caller can reschedule it with compounding backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueMonitor {
    pub task_id: uuid::Uuid,
    pub consecutive_failures: u32,
}

/// Bounded worker pool pulling from a min-heap ordered by next-due
/// time, doubling a target's effective interval on consecutive
/// failures up to [`MAX_BACKOFF_MULTIPLIER`].
pub struct MonitorScheduler {
    due: std::sync::Mutex<BinaryHeap<Reverse<ScheduledMonitor>>>,
    workers: Arc<Semaphore>,
}

impl MonitorScheduler {
    pub fn new(max_concurrent: usize) -> Self {
        Self { due: std::sync::Mutex::new(BinaryHeap::new()), workers: Arc::new(Semaphore::new(max_concurrent.max(1))) }
    }

    pub fn schedule(&self, task_id: uuid::Uuid, interval_hours: u32, now: DateTime<Utc>) {
        let interval = Duration::from_secs(u64::from(interval_hours.max(1)) * 3600);
        let entry = ScheduledMonitor { task_id, next_due: now, interval, consecutive_failures: 0 };
        self.due.lock().expect("monitor schedule lock poisoned").push(Reverse(entry));
    }

    /// Pops the next due target if its `next_due` has passed, without
    /// consuming a worker slot (callers check [`MonitorScheduler::try_acquire`]
    /// separately so a full pool leaves the schedule untouched). Carries the
    /// entry's `consecutive_failures` count out so a caller can thread it
    /// back into [`MonitorScheduler::reschedule`] and let backoff compound.
    pub fn pop_due(&self, now: DateTime<Utc>) -> Option<DueMonitor> {
        let mut heap = self.due.lock().expect("monitor schedule lock poisoned");
        match heap.peek() {
            Some(Reverse(top)) if top.next_due <= now => heap.pop().map(|Reverse(entry)| DueMonitor {
                task_id: entry.task_id,
                consecutive_failures: entry.consecutive_failures,
            }),
            _ => None,
        }
    }

    /// Re-queues `task_id` after a check, backing off from `previous_failures`
    /// (the count [`MonitorScheduler::pop_due`] handed back) rather than
    /// rebuilding a fresh count from scratch — this is what lets
    /// [`ScheduledMonitor::backoff_interval`] actually compound past a single
    /// doubling (§4.4 "until manual reset").
    pub fn reschedule(
        &self,
        task_id: uuid::Uuid,
        interval_hours: u32,
        now: DateTime<Utc>,
        previous_failures: u32,
        failed: bool,
    ) {
        let interval = Duration::from_secs(u64::from(interval_hours.max(1)) * 3600);
        let consecutive_failures = if failed { previous_failures + 1 } else { 0 };
        let mut entry = ScheduledMonitor { task_id, next_due: now, interval, consecutive_failures };
        let wait = if failed { entry.backoff_interval() } else { entry.interval };
        entry.next_due = now + chrono::Duration::from_std(wait).unwrap_or(chrono::Duration::seconds(0));
        self.due.lock().expect("monitor schedule lock poisoned").push(Reverse(entry));
    }

    /// Re-queues `task_id` a short interval from now, preserving its current
    /// failure streak unchanged. Used when a poller finds the previous
    /// check still in flight — that isn't an outcome backoff should react
    /// to, just a schedule that needs to try again shortly.
    pub fn defer(&self, task_id: uuid::Uuid, consecutive_failures: u32, retry_after: Duration, now: DateTime<Utc>) {
        let entry = ScheduledMonitor {
            task_id,
            next_due: now + chrono::Duration::from_std(retry_after).unwrap_or(chrono::Duration::seconds(0)),
            interval: retry_after,
            consecutive_failures,
        };
        self.due.lock().expect("monitor schedule lock poisoned").push(Reverse(entry));
    }

    pub fn try_acquire(&self) -> Option<tokio::sync::OwnedSemaphorePermit> {
        Arc::clone(&self.workers).try_acquire_owned().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut entry = ScheduledMonitor {
            task_id: uuid::Uuid::nil(),
            next_due: Utc::now(),
            interval: Duration::from_secs(3600),
            consecutive_failures: 0,
        };
        entry.consecutive_failures = 1;
        assert_eq!(entry.backoff_interval(), Duration::from_secs(7200));
        entry.consecutive_failures = 10;
        assert_eq!(entry.backoff_interval(), Duration::from_secs(3600 * MAX_BACKOFF_MULTIPLIER as u64));
    }

    #[test]
    fn pop_due_only_returns_past_due_entries() {
        let scheduler = MonitorScheduler::new(2);
        let id = uuid::Uuid::new_v4();
        let now = Utc::now();
        scheduler.schedule(id, 1, now + chrono::Duration::hours(1));
        assert!(scheduler.pop_due(now).is_none());
        assert_eq!(
            scheduler.pop_due(now + chrono::Duration::hours(2)),
            Some(DueMonitor { task_id: id, consecutive_failures: 0 })
        );
    }

    #[test]
    fn reschedule_compounds_backoff_across_consecutive_failures() {
        let scheduler = MonitorScheduler::new(2);
        let id = uuid::Uuid::new_v4();
        let now = Utc::now();
        scheduler.schedule(id, 1, now);

        // Each failure should double the wait from the *previous* count
        // (1h base -> 2h -> 4h -> 8h), not reset to a single doubling.
        let mut clock = now;
        for expected_failures_before in 0..3 {
            let due = scheduler.pop_due(clock).expect("entry due");
            assert_eq!(due.task_id, id);
            assert_eq!(due.consecutive_failures, expected_failures_before);
            scheduler.reschedule(id, 1, clock, due.consecutive_failures, true);
            clock += chrono::Duration::hours(1i64 << (expected_failures_before + 1));
            assert!(scheduler.pop_due(clock - chrono::Duration::seconds(1)).is_none());
        }

        let due = scheduler.pop_due(clock).expect("entry due after third backoff window");
        assert_eq!(due.consecutive_failures, 3);

        scheduler.reschedule(id, 1, clock, due.consecutive_failures, false);
        let reset = scheduler.pop_due(clock + chrono::Duration::hours(1)).expect("entry due after success reset");
        assert_eq!(reset.consecutive_failures, 0);
    }
}
