//! # Core observer trait
//!
//! [`EventObserver`] is the extension point for components that react to
//! platform events: policy engines, hardware action backends, bridges to
//! external applications. Observers are invoked one at a time from the
//! dispatch worker, never while the registry lock is held.
//!
//! ## Contract
//! - `on_event` may be slow; it delays later deliveries of the same pass but
//!   never blocks producers (they only touch the queue).
//! - The returned status is informational. An error (or a panic) is logged
//!   and delivery continues to the remaining matching observers.
//! - The same observer instance (`Arc`) identifies its registrations: the
//!   pair `(Arc identity, context)` is the subscriber identity used by
//!   `unregister` and `unregister_all_for_app`.

use async_trait::async_trait;

use crate::error::EventError;
use crate::types::{DomainId, EventData, EventDescriptor, ParticipantId};

/// Contract for event observers.
///
/// Called from the dedicated dispatch worker. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait EventObserver: Send + Sync + 'static {
    /// Handle a single event delivery.
    ///
    /// # Parameters
    /// - `context`: the opaque value supplied at registration
    /// - `participant`, `domain`: the signaled source (never wildcards)
    /// - `descriptor`: metadata of the event type
    /// - `payload`: the owned copy taken at enqueue time, if any
    async fn on_event(
        &self,
        context: u64,
        participant: ParticipantId,
        domain: DomainId,
        descriptor: &EventDescriptor,
        payload: Option<&EventData>,
    ) -> Result<(), EventError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
