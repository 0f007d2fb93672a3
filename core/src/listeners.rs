//! Listener registry
//!
//! The registry bridges transport-level events into the session state. The
//! façade only relies on the subscribe/unsubscribe contract of
//! [`BlueveryListeners`]; [`BroadcastListeners`] is the stock implementation
//! fed by a `tokio::sync::broadcast` channel.

use crate::state::{BlueveryState, DiscoveredPeripheral};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

/// Default capacity of the event channel created by [`BroadcastListeners::new`]
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Opaque subscription handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Domain events produced by the native event bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralEvent {
    /// A peripheral advertised (or refreshed its advertisement)
    Discovered(DiscoveredPeripheral),
    /// A peripheral stopped being reachable
    Lost { id: String },
}

/// Subscription contract consumed by the façade
#[cfg_attr(test, automock)]
pub trait BlueveryListeners: Send + Sync {
    /// Start delivering events into `state`
    fn subscribe(&self, state: BlueveryState) -> ListenerHandle;

    /// Stop a subscription. Unknown handles are ignored.
    fn unsubscribe(&self, handle: ListenerHandle);
}

/// Listener registry backed by a broadcast channel of [`PeripheralEvent`]s.
///
/// Each subscription runs a forwarding task on the current tokio runtime, so
/// `subscribe` must be called from within one.
pub struct BroadcastListeners {
    events: broadcast::Sender<PeripheralEvent>,
    next_handle: AtomicU64,
    tasks: Mutex<HashMap<ListenerHandle, JoinHandle<()>>>,
}

impl BroadcastListeners {
    /// Create a registry with its own event channel
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self::with_sender(events)
    }

    /// Create a registry listening on an existing event channel
    pub fn with_sender(events: broadcast::Sender<PeripheralEvent>) -> Self {
        Self {
            events,
            next_handle: AtomicU64::new(1),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Sender the native event bridge publishes into
    pub fn sender(&self) -> broadcast::Sender<PeripheralEvent> {
        self.events.clone()
    }

    /// Number of live subscriptions
    pub fn active_subscriptions(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl Default for BroadcastListeners {
    fn default() -> Self {
        Self::new()
    }
}

impl BlueveryListeners for BroadcastListeners {
    fn subscribe(&self, state: BlueveryState) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let mut receiver = self.events.subscribe();

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => apply_event(&state, event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("{} dropped {} peripheral event(s)", handle, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.tasks.lock().insert(handle, task);
        debug!("Subscribed {}", handle);
        handle
    }

    fn unsubscribe(&self, handle: ListenerHandle) {
        if let Some(task) = self.tasks.lock().remove(&handle) {
            task.abort();
            debug!("Unsubscribed {}", handle);
        }
    }
}

impl Drop for BroadcastListeners {
    fn drop(&mut self) {
        for (_, task) in self.tasks.lock().drain() {
            task.abort();
        }
    }
}

fn apply_event(state: &BlueveryState, event: PeripheralEvent) {
    match event {
        PeripheralEvent::Discovered(peripheral) => {
            debug!("Peripheral discovered: {}", peripheral.id);
            state.record_peripheral(peripheral);
        }
        PeripheralEvent::Lost { id } => {
            debug!("Peripheral lost: {}", id);
            state.forget_peripheral(&id);
        }
    }
}
