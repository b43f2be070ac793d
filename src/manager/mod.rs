//! # Event manager: registry, delivery queue, and lifecycle.
//!
//! [`EventManager`] is the process-wide publish/subscribe core. Producers
//! signal events from arbitrary tasks; one dedicated worker drains the
//! bounded queue and fans each event out to matching observers.
//!
//! ## Architecture
//! ```text
//! Producers (many):                           Worker (one):
//!   signal ────────┐
//!   signal_unfiltered ──► [bounded FIFO] ───► run_worker
//!   signal_lf_origin ┘      (mpsc)              ├─ LF id remap
//!                                               ├─ cache update
//!   register / unregister                       └─ bucket walk ──► observer
//!   unregister_all_for_app ──► Registry              │              callbacks
//!        (write lock, O(bucket))  64 buckets         ▼
//!                                 + garbage ◄── refcount 0 / marked
//!                                      │
//!                                      └──► drain: group disable hooks
//!                                           (no lock held)
//! ```
//!
//! ## Rules
//! - The registry lock is never held across an observer callback or a group
//!   enable/disable hook; both are allowed to re-enter this subsystem.
//! - Producers block only on the queue, never on the registry lock.
//! - Queue delivery is strict FIFO; within one event, observers in a bucket
//!   are visited in registration order.
//! - Shutdown is cooperative: cancellation token, worker join, then teardown
//!   of every remaining entry and the garbage list.

mod cache;
mod entry;
mod filter;
mod iter;
mod registry;
mod suspend;
mod worker;

pub use iter::{RegistrationIter, RegistrationSummary};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EventConfig;
use crate::error::EventError;
use crate::observer::EventObserver;
use crate::platform::{GroupActions, ParticipantCatalog};
use crate::types::{
    DomainId, EventData, EventDescriptor, EventGroup, EventType, ParticipantId,
};

use cache::EventCache;
use entry::EventEntry;
use filter::FilterTable;
use registry::Registry;
use suspend::{AppRemoval, SuspendGate};
use worker::QueueItem;

/// State shared between the API surface and the dispatch worker.
pub(crate) struct Shared {
    pub(crate) cfg: EventConfig,
    pub(crate) catalog: Arc<dyn ParticipantCatalog>,
    pub(crate) actions: Arc<dyn GroupActions>,
    pub(crate) registry: Registry,
    pub(crate) filter: FilterTable,
    pub(crate) cache: EventCache,
    pub(crate) suspend: SuspendGate,
    /// Set once at the start of shutdown; mutating entry points check it.
    pub(crate) closed: AtomicBool,
}

impl Shared {
    fn ensure_open(&self) -> Result<(), EventError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EventError::NotInitialized);
        }
        Ok(())
    }

    /// Group enable side effect for a brand-new entry. Only registrations
    /// filtered to the primary participant reach the OS hooks; everything
    /// else (and the DPTF/ACPI groups) needs no action.
    async fn enable_entry(&self, entry: &EventEntry) -> Result<(), EventError> {
        if entry.participant_filter != ParticipantId::PRIMARY {
            return Ok(());
        }
        match entry.descriptor.group {
            EventGroup::Power => {
                self.actions
                    .enable_power_notification(&entry.descriptor.key)
                    .await
            }
            EventGroup::SystemMetrics => {
                self.actions
                    .enable_system_metrics_notification(&entry.descriptor.key)
                    .await
            }
            EventGroup::Sensor => self.actions.enable_sensor_events(entry.event_type()).await,
            EventGroup::Code => self.actions.enable_code_event(entry.event_type()).await,
            EventGroup::Dptf | EventGroup::Acpi => Ok(()),
        }
    }

    /// Inverse of [`Shared::enable_entry`], invoked while draining garbage.
    async fn disable_entry(&self, entry: &EventEntry) -> Result<(), EventError> {
        if entry.participant_filter != ParticipantId::PRIMARY {
            return Ok(());
        }
        match entry.descriptor.group {
            EventGroup::Power => {
                self.actions
                    .disable_power_notification(&entry.descriptor.key)
                    .await
            }
            EventGroup::SystemMetrics => {
                self.actions
                    .disable_system_metrics_notification(&entry.descriptor.key)
                    .await
            }
            EventGroup::Sensor => self.actions.disable_sensor_events(entry.event_type()).await,
            EventGroup::Code => self.actions.disable_code_event(entry.event_type()).await,
            EventGroup::Dptf | EventGroup::Acpi => Ok(()),
        }
    }

    /// Drains the garbage list: disable hook plus drop for each entry, with
    /// no registry lock held. Idempotent; safe to call speculatively after
    /// any mutation.
    pub(crate) async fn dump_garbage(&self) {
        for entry in self.registry.take_garbage().await {
            if let Err(err) = self.disable_entry(&entry).await {
                warn!(
                    event = entry.event_type().as_label(),
                    error = err.as_label(),
                    "event disable hook failed during garbage drain"
                );
            }
        }
    }

    /// Immediate removal of every registration belonging to
    /// `(observer, context)`, across all buckets. Entries currently in use by
    /// a dispatch pass are only marked; the worker sweeps them when their
    /// borrowed reference returns.
    pub(crate) async fn remove_app_now(&self, observer: &Arc<dyn EventObserver>, context: u64) {
        {
            let mut table = self.registry.buckets.write().await;
            let mut to_garbage = Vec::new();
            for bucket in table.all_mut() {
                let mut i = 0;
                while i < bucket.len() {
                    let e = &bucket[i];
                    if e.matches_app(observer, context) {
                        e.marked_for_delete.store(true, Ordering::Release);
                        if !e.is_in_use() {
                            to_garbage.push(bucket.remove(i));
                            continue;
                        }
                    }
                    i += 1;
                }
            }
            for e in to_garbage {
                self.registry.push_garbage(e).await;
            }
        }
        self.dump_garbage().await;
    }

    /// Cache key for baseline delivery: wildcard filters fall back to the
    /// primary participant's first domain, the only source a late subscriber
    /// with wildcards could plausibly want current state for.
    async fn baseline_value(&self, entry: &EventEntry) -> Option<(ParticipantId, DomainId, EventData)> {
        if !self.cache.is_cacheable(entry.event_type()) {
            return None;
        }
        let participant = if entry.participant_filter == ParticipantId::ANY {
            ParticipantId::PRIMARY
        } else {
            entry.participant_filter
        };
        let domain = if entry.domain_filter == DomainId::ANY {
            DomainId::D0
        } else {
            entry.domain_filter
        };
        let value = self.cache.get(entry.event_type(), participant, domain).await?;
        Some((participant, domain, value))
    }
}

/// The process-wide event distribution service.
///
/// Construct with [`EventManager::new`] (requires a tokio runtime; the
/// dispatch worker is spawned immediately), wire the built-in power-state
/// subscriptions with [`EventManager::start`], and tear down with
/// [`EventManager::shutdown`].
pub struct EventManager {
    shared: Arc<Shared>,
    tx: mpsc::Sender<QueueItem>,
    token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    watch: Mutex<Option<Arc<PowerStateWatch>>>,
}

impl EventManager {
    /// Creates the manager and spawns its dispatch worker.
    pub fn new(
        cfg: EventConfig,
        catalog: Arc<dyn ParticipantCatalog>,
        actions: Arc<dyn GroupActions>,
    ) -> Arc<Self> {
        let cache = EventCache::new(catalog.as_ref());
        let shared = Arc::new(Shared {
            cfg: cfg.clone(),
            catalog,
            actions,
            registry: Registry::new(),
            filter: FilterTable::new(),
            cache,
            suspend: SuspendGate::new(),
            closed: AtomicBool::new(false),
        });

        let (tx, rx) = mpsc::channel(cfg.queue_capacity_clamped());
        let token = CancellationToken::new();
        let handle = tokio::spawn(worker::run_worker(
            Arc::clone(&shared),
            rx,
            token.clone(),
        ));

        Arc::new(Self {
            shared,
            tx,
            token,
            worker: Mutex::new(Some(handle)),
            watch: Mutex::new(None),
        })
    }

    // ---------------------------
    // Registration
    // ---------------------------

    /// Registers `(observer, context)` for an event type, with participant
    /// and domain filters.
    ///
    /// A second registration of the same tuple increments the entry's
    /// reference count instead of creating a duplicate. Registering against a
    /// tuple that is mid-teardown fails with [`EventError::NoCreate`]; the
    /// caller may retry once the teardown completes.
    ///
    /// A brand-new entry triggers the group enable side effect (rolled back
    /// on failure) and, for cacheable types with a recorded value, one
    /// synchronous baseline delivery to this observer only.
    pub async fn register(
        &self,
        event_type: EventType,
        participant_filter: ParticipantId,
        domain_filter: DomainId,
        observer: &Arc<dyn EventObserver>,
        context: u64,
    ) -> Result<(), EventError> {
        self.shared.ensure_open()?;
        let descriptor = self.resolve_descriptor(event_type, participant_filter)?;

        let entry = EventEntry::new(
            descriptor,
            participant_filter,
            domain_filter,
            Arc::clone(observer),
            context,
        );

        {
            let mut table = self.shared.registry.buckets.write().await;
            // Dedup scan: an existing live tuple just gains a reference.
            if let Some(existing) = table.find_tuple(
                event_type,
                participant_filter,
                domain_filter,
                observer,
                context,
            ) {
                if existing.is_marked() {
                    return Err(EventError::NoCreate);
                }
                existing.ref_count.fetch_add(1, Ordering::AcqRel);
                debug!(
                    event = event_type.as_label(),
                    ref_count = existing.ref_count(),
                    "registration reference added"
                );
                return Ok(());
            }
            table.bucket_mut(event_type).push(Arc::clone(&entry));
        }

        // Enable runs with no lock held; it may re-enter the registry.
        if let Err(err) = self.shared.enable_entry(&entry).await {
            let mut table = self.shared.registry.buckets.write().await;
            table.remove_entry(&entry);
            return Err(err);
        }

        debug!(
            event = event_type.as_label(),
            participant = %participant_filter,
            domain = %domain_filter,
            observer = entry.observer.name(),
            "event registered"
        );

        if self.shared.cfg.baseline_delivery {
            if let Some((participant, domain, value)) = self.shared.baseline_value(&entry).await {
                // Best effort; baseline failures are the observer's problem.
                let _ = entry
                    .observer
                    .on_event(
                        entry.context,
                        participant,
                        domain,
                        &entry.descriptor,
                        Some(&value),
                    )
                    .await;
            }
        }

        Ok(())
    }

    /// Drops one reference from the matching registration. Removing a tuple
    /// that does not exist is a no-op success. When the last reference goes,
    /// the entry moves to garbage and its disable hook runs before return.
    pub async fn unregister(
        &self,
        event_type: EventType,
        participant_filter: ParticipantId,
        domain_filter: DomainId,
        observer: &Arc<dyn EventObserver>,
        context: u64,
    ) -> Result<(), EventError> {
        self.shared.ensure_open()?;
        // Same resolution as register: the participant must still resolve
        // unless the filter is the wildcard.
        self.resolve_descriptor(event_type, participant_filter)?;

        {
            let mut table = self.shared.registry.buckets.write().await;
            if let Some(entry) = table.find_tuple(
                event_type,
                participant_filter,
                domain_filter,
                observer,
                context,
            ) {
                let remaining = entry.ref_count.fetch_sub(1, Ordering::AcqRel) - 1;
                if remaining <= 0 || entry.is_marked() {
                    table.remove_entry(&entry);
                    self.shared.registry.push_garbage(entry).await;
                }
            }
        }

        self.shared.dump_garbage().await;
        Ok(())
    }

    /// Removes every registration belonging to `(observer, context)`,
    /// regardless of event type.
    ///
    /// During a low-power window ([`EventManager::start`] wires the driving
    /// subscriptions) the request is queued and executed on resume, in FIFO
    /// order.
    pub async fn unregister_all_for_app(
        &self,
        observer: &Arc<dyn EventObserver>,
        context: u64,
    ) -> Result<(), EventError> {
        let deferred = self
            .shared
            .suspend
            .defer(AppRemoval {
                observer: Arc::clone(observer),
                context,
            })
            .await?;
        if deferred {
            debug!(context, "app unregistration deferred until resume");
            return Ok(());
        }
        self.shared.remove_app_now(observer, context).await;
        Ok(())
    }

    /// True if a live registration with this context matches
    /// `(event_type, participant, domain)` under the usual wildcard rules.
    /// Diagnostic; dispatch does not use this.
    pub async fn is_registered(
        &self,
        event_type: EventType,
        context: u64,
        participant: ParticipantId,
        domain: DomainId,
    ) -> bool {
        let table = self.shared.registry.buckets.read().await;
        table.bucket(event_type).iter().any(|e| {
            e.context == context
                && e.is_live()
                && e.matches_signal(self.shared.catalog.as_ref(), event_type, participant, domain)
        })
    }

    fn resolve_descriptor(
        &self,
        event_type: EventType,
        participant_filter: ParticipantId,
    ) -> Result<EventDescriptor, EventError> {
        if participant_filter.is_any() {
            // Wildcard registrations never consult the catalog.
            return Ok(EventDescriptor::for_type(event_type));
        }
        if !self.shared.catalog.participant_exists(participant_filter) {
            return Err(EventError::ParticipantNotFound(participant_filter));
        }
        self.shared
            .catalog
            .event_descriptor(participant_filter, event_type)
            .ok_or(EventError::EventNotFound {
                participant: participant_filter,
                event_type,
            })
    }

    // ---------------------------
    // Signaling
    // ---------------------------

    /// Queues an event for delivery, honoring the filter table. Returns once
    /// the event is accepted into the pipeline; delivery is asynchronous.
    pub async fn signal(
        &self,
        participant: ParticipantId,
        domain: DomainId,
        event_type: EventType,
        data: Option<&EventData>,
    ) -> Result<(), EventError> {
        self.enqueue(participant, domain, event_type, data, false, true)
            .await
    }

    /// Queues an event bypassing the filter table (simulation/test source).
    pub async fn signal_unfiltered(
        &self,
        participant: ParticipantId,
        domain: DomainId,
        event_type: EventType,
        data: Option<&EventData>,
    ) -> Result<(), EventError> {
        self.enqueue(participant, domain, event_type, data, false, false)
            .await
    }

    /// Queues a lower-layer (kernel-origin) event. The participant id is
    /// remapped to the logical id space by the worker before dispatch; the
    /// filter table does not apply.
    pub async fn signal_lf_origin(
        &self,
        raw_participant: ParticipantId,
        domain: DomainId,
        event_type: EventType,
        data: Option<&EventData>,
    ) -> Result<(), EventError> {
        self.enqueue(raw_participant, domain, event_type, data, true, false)
            .await
    }

    async fn enqueue(
        &self,
        participant: ParticipantId,
        domain: DomainId,
        event_type: EventType,
        data: Option<&EventData>,
        is_lf_origin: bool,
        apply_filter: bool,
    ) -> Result<(), EventError> {
        self.shared.ensure_open()?;
        if apply_filter && self.shared.filter.is_filtered(event_type) {
            return Err(EventError::Filtered(event_type));
        }

        // Deep copy: the producer's buffer may be transient. Empty buffers
        // carry no information and queue as "no data".
        let payload = data
            .filter(|d| !d.bytes.is_empty())
            .map(|d| EventData::copied(d.data_type, &d.bytes));

        debug!(
            event = event_type.as_label(),
            participant = %participant,
            domain = %domain,
            lf = is_lf_origin,
            "queuing event"
        );

        self.tx
            .send(QueueItem {
                participant,
                domain,
                event_type,
                payload,
                is_lf_origin,
            })
            .await
            .map_err(|_| EventError::QueueClosed)
    }

    // ---------------------------
    // Filtering
    // ---------------------------

    /// Suppresses normal-path (`signal`) delivery of this event type.
    pub fn filter_event_type(&self, event_type: EventType) {
        self.shared.filter.set(event_type);
    }

    /// Restores normal-path delivery of this event type.
    pub fn unfilter_event_type(&self, event_type: EventType) {
        self.shared.filter.clear(event_type);
    }

    /// Clears the whole filter table.
    pub fn unfilter_all(&self) {
        self.shared.filter.clear_all();
    }

    /// True if `signal` would currently reject this type.
    pub fn is_event_filtered(&self, event_type: EventType) -> bool {
        self.shared.filter.is_filtered(event_type)
    }

    // ---------------------------
    // Iteration
    // ---------------------------

    /// Creates a cursor over live registrations, starting at the lowest
    /// event type.
    pub fn init_iterator(&self) -> RegistrationIter {
        RegistrationIter::new()
    }

    /// Advances the cursor and returns the next live registration, or `None`
    /// once every event type is exhausted. Tolerates concurrent mutation; no
    /// isolation across calls.
    pub async fn next_registration(
        &self,
        iter: &mut RegistrationIter,
    ) -> Option<RegistrationSummary> {
        while iter.type_idx < EventType::ALL.len() {
            let event_type = EventType::ALL[iter.type_idx];
            let found = {
                let table = self.shared.registry.buckets.read().await;
                table
                    .bucket(event_type)
                    .iter()
                    .filter(|e| e.event_type() == event_type && e.is_live())
                    .nth(iter.offset)
                    .map(|e| RegistrationSummary {
                        event_type,
                        participant_filter: e.participant_filter,
                        domain_filter: e.domain_filter,
                        context: e.context,
                        observer_name: e.observer.name(),
                        ref_count: e.ref_count(),
                    })
            };
            match found {
                Some(summary) => {
                    iter.offset += 1;
                    return Some(summary);
                }
                None => {
                    iter.type_idx += 1;
                    iter.offset = 0;
                }
            }
        }
        None
    }

    /// Number of live registrations across all buckets. Diagnostic.
    pub async fn live_registration_count(&self) -> usize {
        let table = self.shared.registry.buckets.read().await;
        table.all().map(|b| b.iter().filter(|e| e.is_live()).count()).sum()
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Wires the built-in display and low-power subscriptions that drive the
    /// delayed app-unregistration window. Idempotent.
    pub async fn start(self: &Arc<Self>) -> Result<(), EventError> {
        let mut slot = self.watch.lock().await;
        if slot.is_some() {
            return Ok(());
        }
        let watch = Arc::new(PowerStateWatch {
            shared: Arc::downgrade(&self.shared),
        });
        let observer: Arc<dyn EventObserver> = watch.clone();
        for ty in PowerStateWatch::EVENTS {
            self.register(ty, ParticipantId::ANY, DomainId::ANY, &observer, 0)
                .await?;
        }
        *slot = Some(watch);
        Ok(())
    }

    /// Stops the dispatch worker without tearing down registrations. Used as
    /// a pre-shutdown step; events signaled afterwards fail with
    /// [`EventError::QueueClosed`].
    pub async fn disable(&self) {
        self.token.cancel();
        if let Some(handle) = self.worker.lock().await.take() {
            if handle.await.is_err() {
                warn!("event dispatch worker panicked");
            }
        }
    }

    /// Full teardown: stops the worker, disables and drops every remaining
    /// registration, drains the garbage list, discards queued app removals
    /// (shutdown takes priority over delayed semantics), and clears the
    /// cache. Still-enqueued events are dropped with their payload copies.
    /// Subsequent register/unregister/signal calls fail with
    /// [`EventError::NotInitialized`].
    pub async fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.disable().await;

        let entries = {
            let mut table = self.shared.registry.buckets.write().await;
            table.drain_all()
        };
        for entry in entries {
            if let Err(err) = self.shared.disable_entry(&entry).await {
                warn!(
                    event = entry.event_type().as_label(),
                    error = err.as_label(),
                    "event disable hook failed during shutdown"
                );
            }
        }

        self.shared.dump_garbage().await;
        self.shared.suspend.teardown().await;
        self.shared.cache.clear().await;
        *self.watch.lock().await = None;
        debug!("event manager shut down");
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

/// Built-in observer driving the delayed-unregistration state machine from
/// display and low-power OS events.
struct PowerStateWatch {
    shared: std::sync::Weak<Shared>,
}

impl PowerStateWatch {
    const EVENTS: [EventType; 4] = [
        EventType::DisplayOff,
        EventType::DisplayOn,
        EventType::LowPowerModeEntry,
        EventType::LowPowerModeExit,
    ];
}

#[async_trait]
impl EventObserver for PowerStateWatch {
    async fn on_event(
        &self,
        _context: u64,
        _participant: ParticipantId,
        _domain: DomainId,
        descriptor: &EventDescriptor,
        _payload: Option<&EventData>,
    ) -> Result<(), EventError> {
        let Some(shared) = self.shared.upgrade() else {
            return Ok(());
        };
        match descriptor.event_type {
            EventType::DisplayOff | EventType::LowPowerModeEntry => shared.suspend.suspend().await,
            EventType::DisplayOn | EventType::LowPowerModeExit => {
                let removals = shared.suspend.resume().await?;
                for removal in removals {
                    shared
                        .remove_app_now(&removal.observer, removal.context)
                        .await;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "power_state_watch"
    }
}
