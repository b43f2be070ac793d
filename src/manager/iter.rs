//! # Diagnostic registration iterator.
//!
//! A stateless, restartable cursor over live registrations. The position is
//! `(event_type index, offset within that type's entries)`, never a pointer
//! to a specific entry, so concurrent removals cannot invalidate it. Each
//! step takes the registry read lock only for the duration of its scan; no
//! isolation is promised across steps: entries added or removed between two
//! calls may or may not be observed.

use crate::types::{DomainId, EventType, ParticipantId};

/// Cursor state for [`EventManager::next_registration`](crate::EventManager::next_registration).
///
/// Create with [`EventManager::init_iterator`](crate::EventManager::init_iterator);
/// a fresh cursor restarts from the lowest event type.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationIter {
    pub(crate) type_idx: usize,
    pub(crate) offset: usize,
}

impl RegistrationIter {
    pub(crate) fn new() -> Self {
        Self {
            type_idx: 0,
            offset: 0,
        }
    }
}

/// Snapshot of one live registration, for diagnostics.
#[derive(Debug, Clone)]
pub struct RegistrationSummary {
    pub event_type: EventType,
    pub participant_filter: ParticipantId,
    pub domain_filter: DomainId,
    pub context: u64,
    pub observer_name: &'static str,
    pub ref_count: i64,
}
