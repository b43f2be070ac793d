//! # Event filter table.
//!
//! A dense bitset over the event-type space used to suppress externally
//! sourced events while a simulation/test harness injects synthetic ones.
//! Only `signal` consults it; `signal_unfiltered` and the lower-layer path
//! bypass it.
//!
//! Toggling is idempotent: filtering a filtered type or unfiltering an
//! unfiltered one is a no-op.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{EventType, MAX_EVENT_TYPES};

// One u64 covers the whole space.
const _: () = assert!(MAX_EVENT_TYPES <= 64);

/// Dense per-type suppression bits.
#[derive(Debug, Default)]
pub(crate) struct FilterTable {
    bits: AtomicU64,
}

impl FilterTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn mask(event_type: EventType) -> u64 {
        1u64 << event_type.index()
    }

    /// Suppress normal-path delivery of this type.
    pub(crate) fn set(&self, event_type: EventType) {
        self.bits.fetch_or(Self::mask(event_type), Ordering::AcqRel);
    }

    /// Restore normal-path delivery of this type.
    pub(crate) fn clear(&self, event_type: EventType) {
        self.bits.fetch_and(!Self::mask(event_type), Ordering::AcqRel);
    }

    /// Clear every bit regardless of prior state.
    pub(crate) fn clear_all(&self) {
        self.bits.store(0, Ordering::Release);
    }

    pub(crate) fn is_filtered(&self, event_type: EventType) -> bool {
        self.bits.load(Ordering::Acquire) & Self::mask(event_type) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_is_idempotent() {
        let table = FilterTable::new();
        let ty = EventType::PowerSourceChanged;

        table.set(ty);
        table.set(ty);
        assert!(table.is_filtered(ty));

        table.clear(ty);
        table.clear(ty);
        assert!(!table.is_filtered(ty));
    }

    #[test]
    fn test_clear_all_resets_every_bit() {
        let table = FilterTable::new();
        table.set(EventType::DisplayOff);
        table.set(EventType::LidStateChanged);
        table.set(EventType::AcpiThermalEvent);

        table.clear_all();
        for ty in EventType::ALL {
            assert!(!table.is_filtered(ty));
        }
    }

    #[test]
    fn test_bits_are_independent() {
        let table = FilterTable::new();
        table.set(EventType::DisplayOff);
        assert!(table.is_filtered(EventType::DisplayOff));
        assert!(!table.is_filtered(EventType::DisplayOn));
    }
}
