//! # Delayed app unregistration.
//!
//! Two-state machine guarding `unregister_all_for_app` across low-power
//! windows:
//!
//! ```text
//!            display off / low-power entry
//!   NORMAL ─────────────────────────────────► SUSPENDED
//!      ▲                                          │
//!      └──────────────────────────────────────────┘
//!            display on / low-power exit
//!            (queued removals drain in FIFO order)
//! ```
//!
//! While `SUSPENDED`, app-removal requests are queued instead of executed, so
//! subscribers that must survive a suspend/resume cycle (sensor bridges in
//! particular) are not torn down mid-suspend. On resume every queued request
//! runs through the normal removal path, oldest first, before any new
//! suspension is honored.
//!
//! After shutdown the state is gone; operations return `NotInitialized`.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::EventError;
use crate::observer::EventObserver;

/// A deferred "unregister everything for this app" request.
pub(crate) struct AppRemoval {
    pub(crate) observer: Arc<dyn EventObserver>,
    pub(crate) context: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PowerState {
    Normal,
    Suspended,
}

struct SuspendInner {
    state: PowerState,
    pending: VecDeque<AppRemoval>,
}

/// Holder for the delayed-unregistration state machine.
pub(crate) struct SuspendGate {
    inner: Mutex<Option<SuspendInner>>,
}

impl SuspendGate {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Some(SuspendInner {
                state: PowerState::Normal,
                pending: VecDeque::new(),
            })),
        }
    }

    /// Enters the suspended window. Idempotent.
    pub(crate) async fn suspend(&self) -> Result<(), EventError> {
        let mut guard = self.inner.lock().await;
        let inner = guard.as_mut().ok_or(EventError::NotInitialized)?;
        inner.state = PowerState::Suspended;
        Ok(())
    }

    /// Leaves the suspended window, handing back every queued removal in FIFO
    /// order for the caller to execute through the normal path.
    pub(crate) async fn resume(&self) -> Result<Vec<AppRemoval>, EventError> {
        let mut guard = self.inner.lock().await;
        let inner = guard.as_mut().ok_or(EventError::NotInitialized)?;
        inner.state = PowerState::Normal;
        Ok(inner.pending.drain(..).collect())
    }

    /// If suspended, queues the removal and returns `true`; otherwise returns
    /// `false` and the caller executes immediately.
    pub(crate) async fn defer(&self, removal: AppRemoval) -> Result<bool, EventError> {
        let mut guard = self.inner.lock().await;
        let inner = guard.as_mut().ok_or(EventError::NotInitialized)?;
        if inner.state == PowerState::Suspended {
            inner.pending.push_back(removal);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// True while inside the suspended window.
    #[cfg(test)]
    pub(crate) async fn is_suspended(&self) -> bool {
        matches!(
            self.inner.lock().await.as_ref(),
            Some(inner) if inner.state == PowerState::Suspended
        )
    }

    /// Drops the state, including any queued removals; shutdown takes
    /// priority over delayed semantics. Subsequent operations return
    /// `NotInitialized`.
    pub(crate) async fn teardown(&self) {
        *self.inner.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DomainId, EventData, EventDescriptor, ParticipantId};
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

    fn removal(context: u64) -> AppRemoval {
        AppRemoval {
            observer: Arc::new(Noop),
            context,
        }
    }

    #[tokio::test]
    async fn test_normal_state_does_not_defer() {
        let gate = SuspendGate::new();
        assert!(!gate.defer(removal(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_suspended_defers_and_resume_drains_fifo() {
        let gate = SuspendGate::new();
        gate.suspend().await.unwrap();

        assert!(gate.defer(removal(1)).await.unwrap());
        assert!(gate.defer(removal(2)).await.unwrap());
        assert!(gate.defer(removal(3)).await.unwrap());

        let drained = gate.resume().await.unwrap();
        let contexts: Vec<u64> = drained.iter().map(|r| r.context).collect();
        assert_eq!(contexts, vec![1, 2, 3]);

        // Back to normal: no more deferral.
        assert!(!gate.defer(removal(4)).await.unwrap());
    }

    #[tokio::test]
    async fn test_teardown_invalidates_operations() {
        let gate = SuspendGate::new();
        gate.teardown().await;
        assert!(matches!(
            gate.suspend().await,
            Err(EventError::NotInitialized)
        ));
        assert!(matches!(
            gate.resume().await,
            Err(EventError::NotInitialized)
        ));
        assert!(matches!(
            gate.defer(removal(1)).await,
            Err(EventError::NotInitialized)
        ));
    }
}
