use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::TaskType;

/// A task waiting in a per-type [`crate::task::TaskType`] queue, ordered by
/// `(priority desc, created_at asc)` per §4.1's dispatch policy. `Ord` is
/// implemented so a `BinaryHeap<QueuedTask>` pops the highest-priority,
/// oldest task first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedTask {
    pub task_id: Uuid,
    pub kind: TaskType,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

/// Per-type queue configuration (§2 row C, §4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueConfig {
    pub capacity: usize,
    pub max_in_flight: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 1000, max_in_flight: 8 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn higher_priority_pops_first_ties_broken_by_fifo() {
        let base = Utc::now();
        let low = QueuedTask { task_id: Uuid::new_v4(), kind: TaskType::PortScan, priority: 1, created_at: base };
        let high = QueuedTask { task_id: Uuid::new_v4(), kind: TaskType::PortScan, priority: 5, created_at: base };
        let high_older = QueuedTask {
            task_id: Uuid::new_v4(),
            kind: TaskType::PortScan,
            priority: 5,
            created_at: base - chrono::Duration::seconds(10),
        };
        let mut heap = BinaryHeap::new();
        heap.push(low.clone());
        heap.push(high.clone());
        heap.push(high_older.clone());

        assert_eq!(heap.pop().unwrap().task_id, high_older.task_id);
        assert_eq!(heap.pop().unwrap().task_id, high.task_id);
        assert_eq!(heap.pop().unwrap().task_id, low.task_id);
    }
}
