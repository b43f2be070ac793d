//! # Registration entry.
//!
//! [`EventEntry`] is the central entity of the registry: one live subscription
//! with an immutable identity tuple and a mutable reference count.
//!
//! ## Identity
//! The tuple `(event_type, participant_filter, domain_filter, context,
//! observer Arc identity)` is unique among live entries. A second `register`
//! with the same tuple increments `ref_count` instead of creating a new entry.
//!
//! ## Lifecycle flags
//! - `ref_count`: successful registers minus successful unregisters, plus a
//!   transient +1 held by the dispatch worker around each callback.
//! - `in_use`: true exactly while a dispatch holds that borrowed reference.
//! - `marked_for_delete`: soft-cancellation set by `unregister_all_for_app`;
//!   checked before every delivery and again after each callback returns.
//!
//! All three are mutated only under the registry write lock; they are atomics
//! so `is_registered` and the iterator can read them under the read lock.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use crate::observer::EventObserver;
use crate::platform::ParticipantCatalog;
use crate::types::{DomainId, EventDescriptor, EventType, ParticipantId};

/// One live (or garbage-pending) event subscription.
pub(crate) struct EventEntry {
    pub(crate) descriptor: EventDescriptor,
    pub(crate) participant_filter: ParticipantId,
    pub(crate) domain_filter: DomainId,
    pub(crate) observer: Arc<dyn EventObserver>,
    pub(crate) context: u64,
    pub(crate) ref_count: AtomicI64,
    pub(crate) in_use: AtomicBool,
    pub(crate) marked_for_delete: AtomicBool,
}

impl EventEntry {
    pub(crate) fn new(
        descriptor: EventDescriptor,
        participant_filter: ParticipantId,
        domain_filter: DomainId,
        observer: Arc<dyn EventObserver>,
        context: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            participant_filter,
            domain_filter,
            observer,
            context,
            ref_count: AtomicI64::new(1),
            in_use: AtomicBool::new(false),
            marked_for_delete: AtomicBool::new(false),
        })
    }

    #[inline]
    pub(crate) fn event_type(&self) -> EventType {
        self.descriptor.event_type
    }

    #[inline]
    pub(crate) fn ref_count(&self) -> i64 {
        self.ref_count.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn is_marked(&self) -> bool {
        self.marked_for_delete.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// True if this entry may still receive deliveries.
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.ref_count() > 0 && !self.is_marked()
    }

    /// Identity-tuple comparison for dedup on register and lookup on
    /// unregister. Observer identity is the `Arc` pointer.
    pub(crate) fn matches_tuple(
        &self,
        event_type: EventType,
        participant_filter: ParticipantId,
        domain_filter: DomainId,
        observer: &Arc<dyn EventObserver>,
        context: u64,
    ) -> bool {
        self.event_type() == event_type
            && self.participant_filter == participant_filter
            && self.domain_filter == domain_filter
            && self.context == context
            && Arc::ptr_eq(&self.observer, observer)
    }

    /// True if the entry belongs to the app identified by `(observer, context)`,
    /// regardless of event type. Used by `unregister_all_for_app`.
    pub(crate) fn matches_app(&self, observer: &Arc<dyn EventObserver>, context: u64) -> bool {
        self.context == context && Arc::ptr_eq(&self.observer, observer)
    }

    /// Wildcard-aware match of a signaled `(event_type, participant, domain)`
    /// against this entry's filters.
    ///
    /// A signaled domain of `NA` matches every domain filter; a filter of
    /// `PRIMARY` matches whichever concrete id currently holds the primary
    /// role.
    pub(crate) fn matches_signal(
        &self,
        catalog: &dyn ParticipantCatalog,
        event_type: EventType,
        participant: ParticipantId,
        domain: DomainId,
    ) -> bool {
        if self.event_type() != event_type {
            return false;
        }
        let participant_ok = self.participant_filter == participant
            || self.participant_filter == ParticipantId::ANY
            || (self.participant_filter == ParticipantId::PRIMARY && catalog.is_primary(participant));
        let domain_ok = self.domain_filter == domain
            || self.domain_filter == DomainId::ANY
            || domain == DomainId::NA;
        participant_ok && domain_ok
    }
}

impl std::fmt::Debug for EventEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEntry")
            .field("event_type", &self.event_type())
            .field("participant_filter", &self.participant_filter)
            .field("domain_filter", &self.domain_filter)
            .field("context", &self.context)
            .field("observer", &self.observer.name())
            .field("ref_count", &self.ref_count())
            .field("in_use", &self.is_in_use())
            .field("marked_for_delete", &self.is_marked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EventError;
    use crate::platform::NullPlatform;
    use crate::types::EventData;
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

    fn entry(participant: ParticipantId, domain: DomainId) -> Arc<EventEntry> {
        EventEntry::new(
            EventDescriptor::for_type(EventType::TemperatureThresholdCrossed),
            participant,
            domain,
            Arc::new(Noop),
            7,
        )
    }

    #[test]
    fn test_tuple_identity_uses_arc_pointer() {
        let observer: Arc<dyn EventObserver> = Arc::new(Noop);
        let e = EventEntry::new(
            EventDescriptor::for_type(EventType::LidStateChanged),
            ParticipantId(1),
            DomainId::D0,
            observer.clone(),
            42,
        );
        assert!(e.matches_tuple(
            EventType::LidStateChanged,
            ParticipantId(1),
            DomainId::D0,
            &observer,
            42
        ));
        let other: Arc<dyn EventObserver> = Arc::new(Noop);
        assert!(!e.matches_tuple(
            EventType::LidStateChanged,
            ParticipantId(1),
            DomainId::D0,
            &other,
            42
        ));
    }

    #[test]
    fn test_signal_matching_wildcards() {
        let catalog = NullPlatform;
        let ty = EventType::TemperatureThresholdCrossed;

        let exact = entry(ParticipantId(4), DomainId::D0);
        assert!(exact.matches_signal(&catalog, ty, ParticipantId(4), DomainId::D0));
        assert!(!exact.matches_signal(&catalog, ty, ParticipantId(5), DomainId::D0));

        let any = entry(ParticipantId::ANY, DomainId::ANY);
        assert!(any.matches_signal(&catalog, ty, ParticipantId(9), DomainId(0x3145)));

        // A signaled NA domain matches any domain filter.
        let d0_only = entry(ParticipantId::ANY, DomainId::D0);
        assert!(d0_only.matches_signal(&catalog, ty, ParticipantId(1), DomainId::NA));

        // PRIMARY filter matches via the role predicate.
        let primary = entry(ParticipantId::PRIMARY, DomainId::ANY);
        assert!(primary.matches_signal(&catalog, ty, ParticipantId::PRIMARY, DomainId::D0));
        assert!(!primary.matches_signal(&catalog, ty, ParticipantId(3), DomainId::D0));
    }

    #[test]
    fn test_liveness_flags() {
        let e = entry(ParticipantId::ANY, DomainId::ANY);
        assert!(e.is_live());
        e.marked_for_delete.store(true, Ordering::Release);
        assert!(!e.is_live());
    }
}
