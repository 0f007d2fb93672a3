//! Session state store
//!
//! Holds the process-wide flags (`is_initialized`, `is_scanning`), the set of
//! peripherals discovered during the current scan cycle, and the cycle
//! generation used to invalidate continuations of aborted cycles.
//!
//! Every operation takes the lock once, so related fields never change
//! independently of each other.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Snapshot of the session flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub is_initialized: bool,
    pub is_scanning: bool,
}

/// Partial update merged by [`BlueveryState::set`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatePatch {
    pub is_initialized: Option<bool>,
    pub is_scanning: Option<bool>,
}

/// A peripheral reported during the current scan cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeripheral {
    pub id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

#[derive(Debug, Default)]
struct StateInner {
    session: SessionState,
    generation: u64,
    peripherals: HashMap<String, DiscoveredPeripheral>,
}

/// Shared handle to the session state. Clones observe the same store.
#[derive(Debug, Clone, Default)]
pub struct BlueveryState {
    inner: Arc<RwLock<StateInner>>,
}

impl BlueveryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous snapshot of the session flags
    pub fn get(&self) -> SessionState {
        self.inner.read().session
    }

    /// Merge the given fields into the session flags
    pub fn set(&self, patch: SessionStatePatch) {
        let mut inner = self.inner.write();
        if let Some(is_initialized) = patch.is_initialized {
            inner.session.is_initialized = is_initialized;
        }
        if let Some(is_scanning) = patch.is_scanning {
            inner.session.is_scanning = is_scanning;
        }
    }

    /// Restore defaults, forget discovered peripherals and invalidate any
    /// in-flight cycle.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.session = SessionState::default();
        inner.peripherals.clear();
        inner.generation = inner.generation.wrapping_add(1);
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.read().session.is_initialized
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.read().session.is_scanning
    }

    /// Claim the scanning flag for a new cycle.
    ///
    /// Returns the new cycle's generation, or `None` when a cycle is already
    /// in flight.
    pub fn begin_cycle(&self) -> Option<u64> {
        let mut inner = self.inner.write();
        if inner.session.is_scanning {
            return None;
        }
        inner.session.is_scanning = true;
        inner.generation = inner.generation.wrapping_add(1);
        Some(inner.generation)
    }

    /// Whether `generation` still identifies the live cycle
    pub fn is_current_cycle(&self, generation: u64) -> bool {
        let inner = self.inner.read();
        inner.session.is_scanning && inner.generation == generation
    }

    /// Release the scanning flag held by `generation`.
    ///
    /// A stale generation (the cycle was torn down meanwhile) leaves the
    /// state alone and returns `false`.
    pub fn finish_cycle(&self, generation: u64) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        inner.session.is_scanning = false;
        true
    }

    /// Insert or refresh a discovered peripheral
    pub fn record_peripheral(&self, peripheral: DiscoveredPeripheral) {
        let mut inner = self.inner.write();
        match inner.peripherals.get_mut(&peripheral.id) {
            Some(existing) => {
                if peripheral.name.is_some() {
                    existing.name = peripheral.name;
                }
                if peripheral.rssi.is_some() {
                    existing.rssi = peripheral.rssi;
                }
            }
            None => {
                inner.peripherals.insert(peripheral.id.clone(), peripheral);
            }
        }
    }

    pub fn forget_peripheral(&self, id: &str) -> Option<DiscoveredPeripheral> {
        self.inner.write().peripherals.remove(id)
    }

    pub fn clear_discovered_peripherals(&self) {
        self.inner.write().peripherals.clear();
    }

    /// Snapshot of the discovered peripherals, in no particular order
    pub fn discovered_peripherals(&self) -> Vec<DiscoveredPeripheral> {
        self.inner.read().peripherals.values().cloned().collect()
    }

    pub fn discovered_count(&self) -> usize {
        self.inner.read().peripherals.len()
    }
}
