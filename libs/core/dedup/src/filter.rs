// [libs/core/dedup/src/filter.rs]

use bloomfilter::Bloom;
use tracing::{debug, instrument};

/// A single Bloom filter over hostnames, used for in-task dedup during
/// subdomain enumeration (§4.2) and asset natural-key pre-checks (§4.5).
pub struct HostFilter {
    bloom: Bloom<String>,
    indexed_count: usize,
}

impl HostFilter {
    /// Allocates a filter sized for `expected_items` entries at the given
    /// false-positive rate.
    #[must_use]
    #[instrument(level = "debug", skip(expected_items, false_positive_rate))]
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let capacity = expected_items.max(1);
        let fp_rate = if false_positive_rate <= 0.0 { 0.0000001 } else { false_positive_rate };
        debug!(capacity, fp_rate, "allocating host dedup filter");
        Self { bloom: Bloom::new_for_fp_rate(capacity, fp_rate), indexed_count: 0 }
    }

    /// Marks `host` as seen. Case-insensitive.
    #[inline]
    pub fn insert(&mut self, host: &str) {
        self.bloom.set(&host.to_ascii_lowercase());
        self.indexed_count += 1;
    }

    /// Returns `true` on a probable collision (bounded false-positive rate),
    /// `false` on definite absence.
    #[inline]
    #[must_use]
    pub fn contains(&self, host: &str) -> bool {
        self.bloom.check(&host.to_ascii_lowercase())
    }

    /// Number of hosts inserted so far (not deduplicated — a repeat insert
    /// still counts).
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexed_count
    }

    /// `true` if nothing has been inserted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexed_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_false_negatives() {
        let mut filter = HostFilter::new(1000, 0.001);
        for i in 0..500 {
            filter.insert(&format!("host-{i}.example.com"));
        }
        for i in 0..500 {
            assert!(filter.contains(&format!("host-{i}.example.com")));
        }
    }

    #[test]
    fn case_insensitive() {
        let mut filter = HostFilter::new(16, 0.001);
        filter.insert("WWW.Example.com");
        assert!(filter.contains("www.example.com"));
    }
}
