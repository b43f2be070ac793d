//! # Bucketed observer registry and garbage list.
//!
//! A fixed number of buckets indexed by `event_type % NUM_BUCKETS`, all
//! guarded by one `tokio::sync::RwLock`. Entries removed from a bucket are
//! appended to the garbage list under the same lock (O(1)) and drained
//! (disable side effect plus drop) strictly **outside** the lock, because a
//! disable hook is allowed to re-enter the registry.
//!
//! ## Rules
//! - The registry lock is never held across an observer callback or a group
//!   enable/disable hook. That single discipline keeps the subsystem
//!   deadlock-free under re-entrancy.
//! - Within a bucket, entries keep registration order; dispatch visits them
//!   in that order.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::manager::entry::EventEntry;
use crate::observer::EventObserver;
use crate::types::{DomainId, EventType, ParticipantId};

/// Bucket count; event types hash by dense index modulo this.
pub(crate) const NUM_BUCKETS: usize = 64;

/// The bucket table. Access goes through [`Registry::buckets`].
pub(crate) struct BucketTable {
    lists: Vec<Vec<Arc<EventEntry>>>,
}

impl BucketTable {
    fn new() -> Self {
        Self {
            lists: (0..NUM_BUCKETS).map(|_| Vec::new()).collect(),
        }
    }

    #[inline]
    pub(crate) fn bucket(&self, event_type: EventType) -> &Vec<Arc<EventEntry>> {
        &self.lists[event_type.index() % NUM_BUCKETS]
    }

    #[inline]
    pub(crate) fn bucket_mut(&mut self, event_type: EventType) -> &mut Vec<Arc<EventEntry>> {
        &mut self.lists[event_type.index() % NUM_BUCKETS]
    }

    /// All buckets, for whole-registry scans (`unregister_all_for_app`,
    /// shutdown, iteration).
    #[inline]
    pub(crate) fn all(&self) -> impl Iterator<Item = &Vec<Arc<EventEntry>>> {
        self.lists.iter()
    }

    #[inline]
    pub(crate) fn all_mut(&mut self) -> impl Iterator<Item = &mut Vec<Arc<EventEntry>>> {
        self.lists.iter_mut()
    }

    /// Finds a live-or-garbage-pending entry by identity tuple.
    pub(crate) fn find_tuple(
        &self,
        event_type: EventType,
        participant_filter: ParticipantId,
        domain_filter: DomainId,
        observer: &Arc<dyn EventObserver>,
        context: u64,
    ) -> Option<Arc<EventEntry>> {
        self.bucket(event_type)
            .iter()
            .find(|e| e.matches_tuple(event_type, participant_filter, domain_filter, observer, context))
            .cloned()
    }

    /// Removes an entry from its bucket by `Arc` identity. Returns true if it
    /// was present.
    pub(crate) fn remove_entry(&mut self, entry: &Arc<EventEntry>) -> bool {
        let bucket = self.bucket_mut(entry.event_type());
        match bucket.iter().position(|e| Arc::ptr_eq(e, entry)) {
            Some(pos) => {
                bucket.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Moves every entry out of every bucket. Shutdown only.
    pub(crate) fn drain_all(&mut self) -> Vec<Arc<EventEntry>> {
        let mut out = Vec::new();
        for bucket in self.all_mut() {
            out.append(bucket);
        }
        out
    }
}

/// Registry state: the locked bucket table plus the garbage holding area.
pub(crate) struct Registry {
    pub(crate) buckets: RwLock<BucketTable>,
    garbage: Mutex<VecDeque<Arc<EventEntry>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            buckets: RwLock::new(BucketTable::new()),
            garbage: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends an entry to the garbage list. O(1); callers hold the bucket
    /// write lock, which is fine because this lock is only ever taken briefly
    /// and never while awaiting external code.
    pub(crate) async fn push_garbage(&self, entry: Arc<EventEntry>) {
        self.garbage.lock().await.push_back(entry);
    }

    /// Takes the entire garbage list for draining. The caller invokes disable
    /// hooks on the result with no registry lock held; draining an already
    /// empty list is a no-op, so speculative calls after any mutation are
    /// safe.
    pub(crate) async fn take_garbage(&self) -> Vec<Arc<EventEntry>> {
        self.garbage.lock().await.drain(..).collect()
    }

    /// True if the garbage list has nothing pending.
    #[cfg(test)]
    pub(crate) async fn garbage_is_empty(&self) -> bool {
        self.garbage.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EventError;
    use crate::types::{EventData, EventDescriptor};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl EventObserver for Noop {
        async fn on_event(
            &self,
            _context: u64,
            _participant: ParticipantId,
            _domain: DomainId,
            _descriptor: &EventDescriptor,
            _payload: Option<&EventData>,
        ) -> Result<(), EventError> {
            Ok(())
        }
    }

    fn entry(ty: EventType, context: u64) -> Arc<EventEntry> {
        EventEntry::new(
            EventDescriptor::for_type(ty),
            ParticipantId::ANY,
            DomainId::ANY,
            Arc::new(Noop),
            context,
        )
    }

    #[test]
    fn test_bucket_selection_by_index() {
        let mut table = BucketTable::new();
        let e = entry(EventType::DisplayOff, 1);
        table.bucket_mut(EventType::DisplayOff).push(e.clone());

        assert_eq!(table.bucket(EventType::DisplayOff).len(), 1);
        assert!(table.remove_entry(&e));
        assert!(!table.remove_entry(&e));
    }

    #[tokio::test]
    async fn test_garbage_drain_is_idempotent() {
        let registry = Registry::new();
        registry.push_garbage(entry(EventType::DisplayOn, 2)).await;

        assert!(!registry.garbage_is_empty().await);
        assert_eq!(registry.take_garbage().await.len(), 1);
        assert!(registry.take_garbage().await.is_empty());
        assert!(registry.garbage_is_empty().await);
    }

    #[test]
    fn test_drain_all_empties_every_bucket() {
        let mut table = BucketTable::new();
        table
            .bucket_mut(EventType::DisplayOff)
            .push(entry(EventType::DisplayOff, 1));
        table
            .bucket_mut(EventType::LidStateChanged)
            .push(entry(EventType::LidStateChanged, 2));

        assert_eq!(table.drain_all().len(), 2);
        assert!(table.all().all(|b| b.is_empty()));
    }
}
