//! # Platform collaborator traits.
//!
//! The event manager is a pure in-process bus; everything that touches
//! hardware or the OS lives behind the two traits here and is injected at
//! construction time:
//!
//! - [`ParticipantCatalog`]: participant lookup/metadata, the primary-role
//!   predicate, lower-layer id remapping, and the cacheable-event predicate.
//! - [`GroupActions`]: the per-group enable/disable side effects invoked when
//!   the first observer of a primary-participant event appears and when the
//!   last one is garbage-collected.
//!
//! ## Re-entrancy
//! Implementations of either trait are allowed to call back into the event
//! manager (e.g. a disable hook that unregisters a now-stale observer). The
//! manager guarantees the registry lock is never held across these calls.

use async_trait::async_trait;

use crate::error::EventError;
use crate::types::{EventDescriptor, EventKey, EventType, ParticipantId};

/// Participant enumeration and metadata, provided by the participant manager.
pub trait ParticipantCatalog: Send + Sync + 'static {
    /// True if a participant with this concrete id currently exists.
    fn participant_exists(&self, participant: ParticipantId) -> bool;

    /// True if this concrete id currently holds the primary-participant role.
    ///
    /// Participant instances may be re-enumerated; the role is stable even
    /// when the concrete id is not.
    fn is_primary(&self, participant: ParticipantId) -> bool;

    /// Metadata this participant declares for an event type, or `None` if the
    /// participant does not support it.
    fn event_descriptor(
        &self,
        participant: ParticipantId,
        event_type: EventType,
    ) -> Option<EventDescriptor>;

    /// Maps a lower-layer (kernel-origin) participant id to the process's
    /// logical participant id. `None` if no mapping exists yet.
    fn remap_lf_participant(&self, raw: ParticipantId) -> Option<ParticipantId>;

    /// True if the latest value of this event type should be cached for
    /// baseline delivery to late subscribers. Queried once at init to build a
    /// dense lookup table.
    fn is_cacheable(&self, event_type: EventType) -> bool;
}

/// Hardware/OS notification hooks, keyed by event group.
///
/// Only registrations filtered to the primary participant reach these hooks;
/// `Dptf` and `Acpi` group events require no action and are never passed in.
#[async_trait]
pub trait GroupActions: Send + Sync + 'static {
    /// Enable OS power notifications for `key`.
    async fn enable_power_notification(&self, key: &EventKey) -> Result<(), EventError>;
    /// Disable OS power notifications for `key`.
    async fn disable_power_notification(&self, key: &EventKey) -> Result<(), EventError>;

    /// Enable OS system-metrics notifications for `key`.
    async fn enable_system_metrics_notification(&self, key: &EventKey) -> Result<(), EventError>;
    /// Disable OS system-metrics notifications for `key`.
    async fn disable_system_metrics_notification(&self, key: &EventKey) -> Result<(), EventError>;

    /// Start sensor-subsystem delivery of `event_type`.
    async fn enable_sensor_events(&self, event_type: EventType) -> Result<(), EventError>;
    /// Stop sensor-subsystem delivery of `event_type`.
    async fn disable_sensor_events(&self, event_type: EventType) -> Result<(), EventError>;

    /// Hook for process-internal code events.
    async fn enable_code_event(&self, event_type: EventType) -> Result<(), EventError>;
    /// Inverse of [`GroupActions::enable_code_event`].
    async fn disable_code_event(&self, event_type: EventType) -> Result<(), EventError>;
}

/// Inert platform: every participant exists, id 0 is primary, LF ids map to
/// themselves, nothing is cacheable, and all group hooks succeed.
///
/// Useful as a starting point for embedders and throughout the test suite.
#[derive(Debug, Default)]
pub struct NullPlatform;

impl ParticipantCatalog for NullPlatform {
    fn participant_exists(&self, _participant: ParticipantId) -> bool {
        true
    }

    fn is_primary(&self, participant: ParticipantId) -> bool {
        participant == ParticipantId::PRIMARY
    }

    fn event_descriptor(
        &self,
        _participant: ParticipantId,
        event_type: EventType,
    ) -> Option<EventDescriptor> {
        Some(EventDescriptor::for_type(event_type))
    }

    fn remap_lf_participant(&self, raw: ParticipantId) -> Option<ParticipantId> {
        Some(raw)
    }

    fn is_cacheable(&self, _event_type: EventType) -> bool {
        false
    }
}

#[async_trait]
impl GroupActions for NullPlatform {
    async fn enable_power_notification(&self, _key: &EventKey) -> Result<(), EventError> {
        Ok(())
    }

    async fn disable_power_notification(&self, _key: &EventKey) -> Result<(), EventError> {
        Ok(())
    }

    async fn enable_system_metrics_notification(&self, _key: &EventKey) -> Result<(), EventError> {
        Ok(())
    }

    async fn disable_system_metrics_notification(&self, _key: &EventKey) -> Result<(), EventError> {
        Ok(())
    }

    async fn enable_sensor_events(&self, _event_type: EventType) -> Result<(), EventError> {
        Ok(())
    }

    async fn disable_sensor_events(&self, _event_type: EventType) -> Result<(), EventError> {
        Ok(())
    }

    async fn enable_code_event(&self, _event_type: EventType) -> Result<(), EventError> {
        Ok(())
    }

    async fn disable_code_event(&self, _event_type: EventType) -> Result<(), EventError> {
        Ok(())
    }
}
