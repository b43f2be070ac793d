//! # thermbus: process-wide event distribution for platform power management.
//!
//! A publish/subscribe core connecting event producers (OS notifications,
//! kernel drivers, policies, simulation sources) to observers, with per-event
//! participant and domain filtering, refcounted registrations, and a single
//! dedicated dispatch worker.
//!
//! ```text
//!   OS hooks ─┐                                   ┌─► policy observers
//!   kernel  ──┼─► signal ─► [FIFO queue] ─► worker┼─► app observers
//!   policies ─┘                │                  └─► built-in power watch
//!                        filter table
//! ```
//!
//! ## Quick start
//! ```no_run
//! use std::sync::Arc;
//! use thermbus::{
//!     DomainId, EventConfig, EventManager, EventObserver, NullPlatform, ParticipantId,
//! };
//! use thermbus::{EventData, EventDescriptor, EventError, EventType};
//!
//! struct Thermal;
//!
//! #[async_trait::async_trait]
//! impl EventObserver for Thermal {
//!     async fn on_event(
//!         &self,
//!         _context: u64,
//!         participant: ParticipantId,
//!         _domain: DomainId,
//!         descriptor: &EventDescriptor,
//!         _payload: Option<&EventData>,
//!     ) -> Result<(), EventError> {
//!         println!("{} from {participant}", descriptor.event_type);
//!         Ok(())
//!     }
//! }
//!
//! # async fn demo() -> Result<(), EventError> {
//! let platform = Arc::new(NullPlatform);
//! let mgr = EventManager::new(EventConfig::default(), platform.clone(), platform);
//! mgr.start().await?;
//!
//! let observer: Arc<dyn EventObserver> = Arc::new(Thermal);
//! mgr.register(
//!     EventType::TemperatureThresholdCrossed,
//!     ParticipantId::ANY,
//!     DomainId::ANY,
//!     &observer,
//!     0,
//! )
//! .await?;
//!
//! mgr.signal(
//!     ParticipantId(1),
//!     DomainId::D0,
//!     EventType::TemperatureThresholdCrossed,
//!     None,
//! )
//! .await?;
//!
//! mgr.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//! - One signal, one queue slot, strict FIFO delivery.
//! - The registry lock is never held across an observer callback or a
//!   platform enable/disable hook; both may re-enter the manager.
//! - A registration that reached refcount zero is never invoked again.
//! - A panicking observer is isolated; delivery continues.

mod config;
mod error;
mod manager;
mod observer;
mod platform;
mod types;

pub use config::EventConfig;
pub use error::EventError;
pub use manager::{EventManager, RegistrationIter, RegistrationSummary};
pub use observer::EventObserver;
pub use platform::{GroupActions, NullPlatform, ParticipantCatalog};
pub use types::{
    DomainId, EventData, EventDataType, EventDescriptor, EventGroup, EventKey, EventType,
    ParticipantId, MAX_EVENT_TYPES,
};
