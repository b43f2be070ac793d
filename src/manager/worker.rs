//! # Delivery queue items and the dispatch worker.
//!
//! A single dedicated worker task drains the bounded FIFO and performs all
//! fan-out. Producers only ever touch the queue; they never take the registry
//! lock.
//!
//! ## Dispatch pass (per queue item)
//! ```text
//! dequeue ──► LF remap (kernel-origin ids only)
//!         ──► cache update (cacheable types, before fan-out)
//!         ──► collect: write-lock bucket, bump ref_count + set in_use
//!             on every matching live entry, unlock
//!         ──► invoke callbacks one at a time, panic-isolated, no lock held
//!         ──► re-lock: clear in_use, drop ref_count, sweep entries that hit
//!             zero or were marked for delete into the garbage list
//!         ──► drain garbage (disable hooks run outside the lock)
//! ```
//!
//! A failing or panicking observer never aborts the pass; delivery continues
//! to the remaining matching entries and processing continues with the next
//! queued event. Nothing is retried.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::manager::entry::EventEntry;
use crate::manager::Shared;
use crate::types::{DomainId, EventData, EventType, ParticipantId};

/// One queued event. Owns the payload copy taken at enqueue time; dropping
/// the item (worker consumption or queue teardown) frees it.
pub(crate) struct QueueItem {
    pub(crate) participant: ParticipantId,
    pub(crate) domain: DomainId,
    pub(crate) event_type: EventType,
    pub(crate) payload: Option<EventData>,
    /// True if the event originated from a lower-layer/kernel source and its
    /// participant id still needs remapping to the logical id space.
    pub(crate) is_lf_origin: bool,
}

/// Worker loop; runs until the token fires or the queue closes. Items left
/// in the queue at shutdown are dropped with the receiver, payloads included.
pub(crate) async fn run_worker(
    shared: Arc<Shared>,
    mut rx: mpsc::Receiver<QueueItem>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            item = rx.recv() => match item {
                Some(item) => shared.process_item(item).await,
                None => break,
            },
        }
    }
    debug!("event dispatch worker stopped");
}

impl Shared {
    /// Processes one dequeued event end to end.
    pub(crate) async fn process_item(&self, item: QueueItem) {
        let QueueItem {
            mut participant,
            domain,
            event_type,
            payload,
            is_lf_origin,
        } = item;

        if is_lf_origin {
            participant = match self.catalog.remap_lf_participant(participant) {
                Some(mapped) => mapped,
                // Participant-create announces an id that is not mapped yet;
                // it targets the primary participant. Anything else without a
                // mapping has no destination.
                None if event_type == EventType::ParticipantCreate => ParticipantId::PRIMARY,
                None => {
                    debug!(
                        event = event_type.as_label(),
                        raw_participant = %participant,
                        "dropping lower-layer event with no participant mapping"
                    );
                    return;
                }
            };
        }

        // Update the cache before fan-out so observers that read it during
        // this pass see the new value.
        self.cache
            .update(event_type, participant, domain, payload.as_ref())
            .await;

        self.dispatch(event_type, participant, domain, payload.as_ref())
            .await;
    }

    /// Fan-out of one event to every matching live entry.
    pub(crate) async fn dispatch(
        &self,
        event_type: EventType,
        participant: ParticipantId,
        domain: DomainId,
        payload: Option<&EventData>,
    ) {
        debug!(
            event = event_type.as_label(),
            participant = %participant,
            domain = %domain,
            has_payload = payload.is_some(),
            "dispatching event"
        );

        // Collect pass: borrow every matching live entry under the lock.
        // The ref_count bump plus in_use keeps each one out of teardown
        // while its callback runs with no lock held.
        let targets: Vec<Arc<EventEntry>> = {
            let table = self.registry.buckets.write().await;
            table
                .bucket(event_type)
                .iter()
                .filter(|e| {
                    e.is_live()
                        && e.matches_signal(self.catalog.as_ref(), event_type, participant, domain)
                })
                .map(|e| {
                    e.ref_count.fetch_add(1, Ordering::AcqRel);
                    e.in_use.store(true, Ordering::Release);
                    Arc::clone(e)
                })
                .collect()
        };

        for entry in &targets {
            self.invoke(entry, participant, domain, payload).await;
        }

        // Return pass: drop the borrowed references and sweep anything that
        // reached zero or was marked for delete while in use.
        let mut swept = false;
        {
            let mut table = self.registry.buckets.write().await;
            for entry in &targets {
                entry.in_use.store(false, Ordering::Release);
                let remaining = entry.ref_count.fetch_sub(1, Ordering::AcqRel) - 1;
                if remaining <= 0 || entry.is_marked() {
                    if table.remove_entry(entry) {
                        self.registry.push_garbage(Arc::clone(entry)).await;
                        swept = true;
                    }
                }
            }
        }

        if swept {
            self.dump_garbage().await;
        }
    }

    /// Invokes one callback, isolating panics and logging failures. The
    /// observer status is informational only.
    async fn invoke(
        &self,
        entry: &Arc<EventEntry>,
        participant: ParticipantId,
        domain: DomainId,
        payload: Option<&EventData>,
    ) {
        let fut = entry.observer.on_event(
            entry.context,
            participant,
            domain,
            &entry.descriptor,
            payload,
        );
        match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(
                observer = entry.observer.name(),
                event = entry.event_type().as_label(),
                error = err.as_label(),
                "observer returned an error"
            ),
            Err(_) => warn!(
                observer = entry.observer.name(),
                event = entry.event_type().as_label(),
                "observer panicked during delivery"
            ),
        }
    }
}
