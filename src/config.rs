//! # Event manager configuration.
//!
//! Provides [`EventConfig`], settings for the delivery queue and dispatch
//! worker, passed to [`EventManager::new`](crate::EventManager::new).
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → clamped to 1 (the queue is always bounded).

/// Configuration for the event manager.
///
/// All fields are public for flexibility; prefer the clamped accessors so
/// sentinel handling stays in one place.
#[derive(Clone, Debug)]
pub struct EventConfig {
    /// Capacity of the bounded delivery queue.
    ///
    /// Producers calling `signal` suspend once the queue holds this many
    /// undelivered events; they never block on the registry lock. Minimum
    /// effective value is 1.
    pub queue_capacity: usize,

    /// Whether a newly registered observer synchronously receives one
    /// baseline event carrying the cached last-known value for its event
    /// type, if one exists.
    pub baseline_delivery: bool,
}

impl EventConfig {
    /// Queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

impl Default for EventConfig {
    /// Default configuration:
    ///
    /// - `queue_capacity = 1024`
    /// - `baseline_delivery = true`
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            baseline_delivery: true,
        }
    }
}
