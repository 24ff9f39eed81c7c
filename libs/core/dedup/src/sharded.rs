// [libs/core/dedup/src/sharded.rs]

use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use tracing::error;

use crate::errors::FilterError;
use crate::filter::HostFilter;

/// Partitions hostname dedup across N Bloom-filter shards, routed by
/// SipHash-1-3, so concurrent discovery workers don't contend on one lock
/// (§4.2's dedup is expected to run alongside `concurrency`-bounded I/O).
pub struct ShardedFilter {
    shards: Vec<RwLock<HostFilter>>,
    partition_count: usize,
}

impl ShardedFilter {
    /// Builds `partition_count` shards, each sized for roughly
    /// `expected_items / partition_count` entries. Errors if
    /// `partition_count` is zero.
    pub fn new(partition_count: usize, expected_items: usize, false_positive_rate: f64) -> Result<Self, FilterError> {
        if partition_count == 0 {
            return Err(FilterError::NoShards);
        }
        let per_shard = (expected_items / partition_count).max(64);
        let shards = (0..partition_count)
            .map(|_| RwLock::new(HostFilter::new(per_shard, false_positive_rate)))
            .collect();
        Ok(Self { shards, partition_count })
    }

    fn route(&self, host: &str) -> usize {
        let mut hasher = siphasher::sip::SipHasher13::new_with_keys(0, 0);
        host.to_ascii_lowercase().hash(&mut hasher);
        (hasher.finish() as usize) % self.partition_count
    }

    /// Marks `host` as seen in its routed shard. Logs and drops the insert
    /// if that shard's lock is poisoned rather than propagating a panic.
    pub fn insert(&self, host: &str) {
        let idx = self.route(host);
        match self.shards[idx].write() {
            Ok(mut shard) => shard.insert(host),
            Err(poisoned) => error!(shard = idx, %poisoned, "dedup shard lock poisoned"),
        }
    }

    /// Returns `true` on a probable collision in `host`'s shard. A poisoned
    /// shard reads as absent rather than panicking.
    #[must_use]
    pub fn contains(&self, host: &str) -> bool {
        let idx = self.route(host);
        self.shards[idx].read().map(|shard| shard.contains(host)).unwrap_or(false)
    }

    /// Total inserts summed across all shards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().filter_map(|s| s.read().ok()).map(|s| s.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_deterministically_and_dedups() {
        let filter = ShardedFilter::new(4, 1000, 0.001).unwrap();
        filter.insert("api.example.com");
        filter.insert("api.example.com");
        assert!(filter.contains("api.example.com"));
        assert!(!filter.contains("unseen.example.com"));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn rejects_zero_partitions() {
        assert!(matches!(ShardedFilter::new(0, 100, 0.01), Err(FilterError::NoShards)));
    }
}
