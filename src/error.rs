//! Error types used by the event manager.
//!
//! [`EventError`] covers every synchronous failure the API surface can
//! return. Asynchronous dispatch failures (an observer returning an error or
//! panicking, a group disable hook failing) are logged by the worker and never
//! propagate to the signaling caller; `signal` only reports whether the event
//! was accepted into the pipeline.

use thiserror::Error;

use crate::types::{EventType, ParticipantId};

/// Errors produced by the event manager API.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EventError {
    /// The participant named in a registration filter does not exist.
    #[error("participant {0} not found")]
    ParticipantNotFound(ParticipantId),

    /// The participant exists but does not declare the requested event type.
    #[error("event {event_type} not declared by participant {participant}")]
    EventNotFound {
        participant: ParticipantId,
        event_type: EventType,
    },

    /// Registration raced with teardown of the same entry; the caller may
    /// retry once the in-flight unregistration completes.
    #[error("entry is mid-teardown; retry registration")]
    NoCreate,

    /// The event type is currently suppressed by the filter table. Not an
    /// operational error: the event was simply not delivered.
    #[error("event {0} is filtered")]
    Filtered(EventType),

    /// The delivery queue has been shut down; no further events are accepted.
    #[error("event queue is closed")]
    QueueClosed,

    /// Operation attempted before `start` or after shutdown on a subsystem
    /// that requires an initialized state.
    #[error("event manager not initialized")]
    NotInitialized,

    /// A group enable hook rejected the registration; the entry was rolled
    /// back and the registry left unchanged.
    #[error("event enable failed: {0}")]
    EnableFailed(String),

    /// An observer reported a failure. Informational; never aborts dispatch.
    #[error("observer error: {0}")]
    Observer(String),

    /// Invariant violation that should never happen.
    #[error("unspecified internal error: {0}")]
    Unspecified(&'static str),
}

impl EventError {
    /// Short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventError::ParticipantNotFound(_) => "participant_not_found",
            EventError::EventNotFound { .. } => "event_not_found",
            EventError::NoCreate => "no_create",
            EventError::Filtered(_) => "event_filtered",
            EventError::QueueClosed => "queue_closed",
            EventError::NotInitialized => "not_initialized",
            EventError::EnableFailed(_) => "enable_failed",
            EventError::Observer(_) => "observer_error",
            EventError::Unspecified(_) => "unspecified",
        }
    }
}
