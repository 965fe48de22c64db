//! Bounded write-behind queue of classified conditions.
//!
//! Request handlers append, the flush worker drains everything at once.
//! The queue has a fixed capacity and an explicit policy for what happens
//! when it is full.

use log::warn;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

use crate::config::OverflowPolicy;
use crate::models::NewCondition;

/// The buffer was full and the policy is `Reject`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFull {
    pub capacity: usize,
}

impl fmt::Display for BufferFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ingestion buffer is full ({} records)", self.capacity)
    }
}

impl std::error::Error for BufferFull {}

pub struct ConditionBuffer {
    queue: Mutex<VecDeque<NewCondition>>,
    capacity: usize,
    policy: OverflowPolicy,
    space_freed: Notify,
    dropped: AtomicU64,
}

impl ConditionBuffer {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            policy,
            space_freed: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<NewCondition>> {
        // every critical section leaves the deque consistent, so poisoning is ignored
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append one record, applying the overflow policy when full
    pub async fn push(&self, record: NewCondition) -> Result<(), BufferFull> {
        match self.policy {
            OverflowPolicy::Block => loop {
                let notified = self.space_freed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                {
                    let mut queue = self.lock();
                    if queue.len() < self.capacity {
                        queue.push_back(record);
                        return Ok(());
                    }
                }

                notified.await;
            },
            OverflowPolicy::DropOldest => {
                let mut queue = self.lock();
                if queue.len() >= self.capacity {
                    if let Some(evicted) = queue.pop_front() {
                        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(
                            "Ingestion buffer full, dropped oldest condition of {} at {} ({} dropped so far)",
                            evicted.jia_isu_uuid, evicted.timestamp, total
                        );
                    }
                }
                queue.push_back(record);
                Ok(())
            }
            OverflowPolicy::Reject => {
                let mut queue = self.lock();
                if queue.len() >= self.capacity {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return Err(BufferFull {
                        capacity: self.capacity,
                    });
                }
                queue.push_back(record);
                Ok(())
            }
        }
    }

    /// Take every queued record, leaving the buffer empty
    pub fn drain(&self) -> Vec<NewCondition> {
        let drained: Vec<NewCondition> = std::mem::take(&mut *self.lock()).into();
        if !drained.is_empty() {
            self.space_freed.notify_waiters();
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Records evicted or refused because the buffer was full
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ConditionLevel;
    use std::sync::Arc;
    use std::time::Duration;

    fn record(timestamp: i64) -> NewCondition {
        NewCondition {
            jia_isu_uuid: "isu-1".to_string(),
            timestamp,
            is_sitting: false,
            condition: "is_dirty=false,is_overweight=false,is_broken=false".to_string(),
            message: String::new(),
            condition_level: ConditionLevel::Info,
        }
    }

    fn timestamps(records: &[NewCondition]) -> Vec<i64> {
        records.iter().map(|r| r.timestamp).collect()
    }

    #[tokio::test]
    async fn test_drain_preserves_insertion_order() {
        let buffer = ConditionBuffer::new(10, OverflowPolicy::Block);
        for ts in [5, 3, 9] {
            buffer.push(record(ts)).await.unwrap();
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(timestamps(&buffer.drain()), vec![5, 3, 9]);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[tokio::test]
    async fn test_drop_oldest_policy() {
        let buffer = ConditionBuffer::new(2, OverflowPolicy::DropOldest);
        for ts in 1..=4 {
            buffer.push(record(ts)).await.unwrap();
        }

        assert_eq!(buffer.dropped_count(), 2);
        assert_eq!(timestamps(&buffer.drain()), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_reject_policy() {
        let buffer = ConditionBuffer::new(2, OverflowPolicy::Reject);
        buffer.push(record(1)).await.unwrap();
        buffer.push(record(2)).await.unwrap();

        assert_eq!(
            buffer.push(record(3)).await,
            Err(BufferFull { capacity: 2 })
        );
        assert_eq!(buffer.dropped_count(), 1);
        assert_eq!(timestamps(&buffer.drain()), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_block_policy_waits_for_drain() {
        let buffer = Arc::new(ConditionBuffer::new(1, OverflowPolicy::Block));
        buffer.push(record(1)).await.unwrap();

        let pusher = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.push(record(2)).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pusher.is_finished());
        assert_eq!(buffer.len(), 1);

        assert_eq!(timestamps(&buffer.drain()), vec![1]);
        tokio::time::timeout(Duration::from_secs(5), pusher)
            .await
            .expect("blocked push should complete after drain")
            .unwrap()
            .unwrap();
        assert_eq!(timestamps(&buffer.drain()), vec![2]);
    }
}
