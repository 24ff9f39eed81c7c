// [libs/domain/store/src/tasks.rs]

//! In-memory task board (§4.1, §2 row C), grounded on
//! `mission_control.rs`'s `Mutex<VecDeque<WorkOrder>>` dispatch queue, with
//! priority ordering added via `BinaryHeap<QueuedTask>` and a per-type
//! `Semaphore` enforcing `max_in_flight`.

use std::collections::{BinaryHeap, HashMap};
use std::sync::Mutex;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};
use std::sync::Arc;

use scancore_domain_models::queue::{QueueConfig, QueuedTask};
use scancore_domain_models::task::{TaskError, TaskType};

struct TypeQueue {
    heap: Mutex<BinaryHeap<QueuedTask>>,
    in_flight: Arc<Semaphore>,
    capacity: usize,
}

/// One priority queue + in-flight ceiling per [`TaskType`] (§4.1).
pub struct TaskQueue {
    queues: HashMap<TaskType, TypeQueue>,
}

impl TaskQueue {
    /// Builds a queue for every task type named in `configs`, defaulting
    /// any type left unlisted to [`QueueConfig::default`].
    pub fn new(configs: HashMap<TaskType, QueueConfig>) -> Self {
        let task_types =
            [TaskType::SubdomainEnum, TaskType::PortScan, TaskType::PageMonitor, TaskType::VulnScan];
        let queues = task_types
            .into_iter()
            .map(|kind| {
                let config = configs.get(&kind).copied().unwrap_or_default();
                let queue = TypeQueue {
                    heap: Mutex::new(BinaryHeap::new()),
                    in_flight: Arc::new(Semaphore::new(config.max_in_flight)),
                    capacity: config.capacity,
                };
                (kind, queue)
            })
            .collect();
        Self { queues }
    }

    /// Pushes a task onto its type's queue, rejecting with
    /// [`TaskError::QueueFull`] once `capacity` is reached (§4.1).
    #[instrument(skip(self))]
    pub fn push(&self, task: QueuedTask) -> Result<(), TaskError> {
        let type_queue = self.queue_for(task.kind);
        let mut heap = type_queue.heap.lock().expect("task queue lock poisoned");
        if heap.len() >= type_queue.capacity {
            return Err(TaskError::QueueFull);
        }
        heap.push(task);
        debug!(depth = heap.len(), "task enqueued");
        Ok(())
    }

    /// Re-enqueues a task that failed mid-flight, same priority ordering as
    /// a fresh push — the priority/age comparator already puts it ahead of
    /// newer, lower-priority work (mirrors `rollback_mission`'s intent
    /// without needing FIFO-front semantics on a heap).
    pub fn requeue(&self, task: QueuedTask) -> Result<(), TaskError> {
        self.push(task)
    }

    /// Pops the highest-priority, oldest task of `kind`, if any is queued.
    pub fn pop(&self, kind: TaskType) -> Option<QueuedTask> {
        self.queue_for(kind).heap.lock().expect("task queue lock poisoned").pop()
    }

    pub fn len(&self, kind: TaskType) -> usize {
        self.queue_for(kind).heap.lock().expect("task queue lock poisoned").len()
    }

    pub fn is_empty(&self, kind: TaskType) -> bool {
        self.len(kind) == 0
    }

    /// Acquires one in-flight slot for `kind`, returning `None` immediately
    /// if the ceiling is already saturated rather than waiting.
    pub fn try_acquire_slot(&self, kind: TaskType) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.queue_for(kind).in_flight).try_acquire_owned().ok()
    }

    fn queue_for(&self, kind: TaskType) -> &TypeQueue {
        self.queues.get(&kind).expect("every TaskType has a configured queue")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn task(priority: i32) -> QueuedTask {
        QueuedTask { task_id: Uuid::new_v4(), kind: TaskType::PortScan, priority, created_at: Utc::now() }
    }

    #[test]
    fn queue_full_is_rejected_at_capacity() {
        let mut configs = HashMap::new();
        configs.insert(TaskType::PortScan, QueueConfig { capacity: 1, max_in_flight: 1 });
        let queue = TaskQueue::new(configs);
        queue.push(task(1)).unwrap();
        assert!(matches!(queue.push(task(1)), Err(TaskError::QueueFull)));
    }

    #[test]
    fn pop_respects_priority_order() {
        let queue = TaskQueue::new(HashMap::new());
        queue.push(task(1)).unwrap();
        let high = task(9);
        let high_id = high.task_id;
        queue.push(high).unwrap();
        assert_eq!(queue.pop(TaskType::PortScan).unwrap().task_id, high_id);
    }

    #[test]
    fn in_flight_slots_are_bounded() {
        let mut configs = HashMap::new();
        configs.insert(TaskType::PortScan, QueueConfig { capacity: 10, max_in_flight: 1 });
        let queue = TaskQueue::new(configs);
        let permit = queue.try_acquire_slot(TaskType::PortScan);
        assert!(permit.is_some());
        assert!(queue.try_acquire_slot(TaskType::PortScan).is_none());
        drop(permit);
        assert!(queue.try_acquire_slot(TaskType::PortScan).is_some());
    }
}
