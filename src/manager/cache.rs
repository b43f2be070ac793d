//! # Event cache.
//!
//! Tracks the last-known value of cacheable event types, keyed by
//! `(event_type, participant, domain)`. The dispatch worker updates the cache
//! *before* fan-out, so observers invoked during a pass that read the cache
//! observe the new value. Cache reads feed exactly one consumer: the baseline
//! delivery a brand-new registration receives so a late subscriber learns the
//! current state without waiting for the next hardware edge.
//!
//! Which types are cacheable is decided by the platform catalog, queried once
//! at construction to build a dense lookup table.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::platform::ParticipantCatalog;
use crate::types::{DomainId, EventData, EventType, ParticipantId, MAX_EVENT_TYPES};

type CacheKey = (EventType, ParticipantId, DomainId);

/// Last-value store for cacheable event types.
pub(crate) struct EventCache {
    cacheable: [bool; MAX_EVENT_TYPES],
    values: RwLock<HashMap<CacheKey, EventData>>,
}

impl EventCache {
    /// Builds the dense cacheable table by querying the catalog for every
    /// event type once.
    pub(crate) fn new(catalog: &dyn ParticipantCatalog) -> Self {
        let mut cacheable = [false; MAX_EVENT_TYPES];
        for ty in EventType::ALL {
            cacheable[ty.index()] = catalog.is_cacheable(ty);
        }
        Self {
            cacheable,
            values: RwLock::new(HashMap::new()),
        }
    }

    #[inline]
    pub(crate) fn is_cacheable(&self, event_type: EventType) -> bool {
        self.cacheable[event_type.index()]
    }

    /// Records the latest value. No-op for non-cacheable types and empty
    /// payloads.
    pub(crate) async fn update(
        &self,
        event_type: EventType,
        participant: ParticipantId,
        domain: DomainId,
        payload: Option<&EventData>,
    ) {
        if !self.is_cacheable(event_type) {
            return;
        }
        let Some(data) = payload else { return };
        self.values
            .write()
            .await
            .insert((event_type, participant, domain), data.clone());
    }

    /// Last-known value for the key, if one has been recorded.
    pub(crate) async fn get(
        &self,
        event_type: EventType,
        participant: ParticipantId,
        domain: DomainId,
    ) -> Option<EventData> {
        self.values
            .read()
            .await
            .get(&(event_type, participant, domain))
            .cloned()
    }

    pub(crate) async fn clear(&self) {
        self.values.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::NullPlatform;

    struct CacheAll;

    impl ParticipantCatalog for CacheAll {
        fn participant_exists(&self, _p: ParticipantId) -> bool {
            true
        }
        fn is_primary(&self, p: ParticipantId) -> bool {
            p == ParticipantId::PRIMARY
        }
        fn event_descriptor(
            &self,
            _p: ParticipantId,
            ty: EventType,
        ) -> Option<crate::types::EventDescriptor> {
            Some(crate::types::EventDescriptor::for_type(ty))
        }
        fn remap_lf_participant(&self, raw: ParticipantId) -> Option<ParticipantId> {
            Some(raw)
        }
        fn is_cacheable(&self, _ty: EventType) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_update_then_get() {
        let cache = EventCache::new(&CacheAll);
        let key = (EventType::PowerSourceChanged, ParticipantId(1), DomainId::D0);

        assert!(cache.get(key.0, key.1, key.2).await.is_none());
        cache
            .update(key.0, key.1, key.2, Some(&EventData::u32(1)))
            .await;
        assert_eq!(cache.get(key.0, key.1, key.2).await, Some(EventData::u32(1)));

        // Later updates replace the value.
        cache
            .update(key.0, key.1, key.2, Some(&EventData::u32(0)))
            .await;
        assert_eq!(cache.get(key.0, key.1, key.2).await, Some(EventData::u32(0)));
    }

    #[tokio::test]
    async fn test_non_cacheable_types_are_ignored() {
        let cache = EventCache::new(&NullPlatform);
        cache
            .update(
                EventType::PowerSourceChanged,
                ParticipantId(1),
                DomainId::D0,
                Some(&EventData::u32(1)),
            )
            .await;
        assert!(cache
            .get(EventType::PowerSourceChanged, ParticipantId(1), DomainId::D0)
            .await
            .is_none());
    }
}
