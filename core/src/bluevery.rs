//! Bluevery façade
//!
//! The only object callers touch. It owns the state store, the listener
//! subscription and the scan scheduler, and passes characteristic reads and
//! writes straight through to the transport.
//!
//! BLE hardware is a single process-wide resource, so a process builds one
//! `Bluevery` at startup and hands clones of it to whoever needs it. Clones
//! share the same state store and the same in-flight scan cycle.

use crate::error::BlueveryError;
use crate::listeners::{BlueveryListeners, ListenerHandle};
use crate::options::{BlueveryOptions, ScanOptions};
use crate::scan::omoiyari::{Omoiyari, TimerOmoiyari};
use crate::scan::scheduler::ScanScheduler;
use crate::state::{BlueveryState, DiscoveredPeripheral, SessionState, SessionStatePatch};
use crate::transport::{BlueveryCore, CharacteristicAddress, WriteConfirmation};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of [`Bluevery::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized,
    /// `init` had already run; nothing was changed
    AlreadyInitialized,
}

#[derive(Clone)]
pub struct Bluevery {
    core: Arc<dyn BlueveryCore>,
    listeners: Arc<dyn BlueveryListeners>,
    state: BlueveryState,
    scheduler: ScanScheduler,
    subscription: Arc<Mutex<Option<ListenerHandle>>>,
    options: BlueveryOptions,
}

impl Bluevery {
    /// Create a façade using the timer-backed cooldown
    pub fn new(
        core: Arc<dyn BlueveryCore>,
        listeners: Arc<dyn BlueveryListeners>,
        options: BlueveryOptions,
    ) -> Self {
        Self::with_omoiyari(core, listeners, Arc::new(TimerOmoiyari), options)
    }

    /// Create a façade with a custom cooldown implementation
    pub fn with_omoiyari(
        core: Arc<dyn BlueveryCore>,
        listeners: Arc<dyn BlueveryListeners>,
        omoiyari: Arc<dyn Omoiyari>,
        options: BlueveryOptions,
    ) -> Self {
        let state = BlueveryState::new();
        let scheduler = ScanScheduler::new(
            core.clone(),
            omoiyari,
            state.clone(),
            options.consideration(),
        );

        Self {
            core,
            listeners,
            state,
            scheduler,
            subscription: Arc::new(Mutex::new(None)),
            options,
        }
    }

    /// Subscribe the listener registry and mark the session initialized.
    ///
    /// A second call is a no-op reported as [`InitOutcome::AlreadyInitialized`].
    pub async fn init(&self) -> InitOutcome {
        let mut subscription = self.subscription.lock();
        if self.state.is_initialized() {
            debug!("init called on an initialized instance, ignoring");
            return InitOutcome::AlreadyInitialized;
        }

        let handle = self.listeners.subscribe(self.state.clone());
        *subscription = Some(handle);
        self.state.set(SessionStatePatch {
            is_initialized: Some(true),
            ..Default::default()
        });

        info!("Bluevery initialized ({})", handle);
        InitOutcome::Initialized
    }

    pub fn check_is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    /// Run one scan cycle. Resolves after the last burst's cooldown.
    pub async fn start_scan(&self, options: ScanOptions) -> Result<(), BlueveryError> {
        if !self.state.is_initialized() {
            return Err(BlueveryError::NotInitialized);
        }
        self.scheduler.run_scan_cycle(&options).await
    }

    /// Tear everything down: unsubscribe listeners, abandon any in-flight
    /// cycle and reset the state store. The instance then behaves as freshly
    /// constructed.
    pub fn stop_bluevery(&self) {
        let mut subscription = self.subscription.lock();
        if let Some(handle) = subscription.take() {
            self.listeners.unsubscribe(handle);
        }

        let was_scanning = self.state.is_scanning();
        self.state.reset();

        if was_scanning {
            info!("Bluevery stopped, in-flight scan cycle abandoned");
        } else {
            info!("Bluevery stopped");
        }
    }

    pub async fn read_value(&self, address: &CharacteristicAddress) -> Result<Vec<u8>, BlueveryError> {
        debug!("Reading {}", address);
        self.core
            .read_value(address)
            .await
            .map_err(BlueveryError::ReadFailed)
    }

    pub async fn write_value(
        &self,
        address: &CharacteristicAddress,
        payload: &[u8],
    ) -> Result<WriteConfirmation, BlueveryError> {
        debug!("Writing {} byte(s) to {}", payload.len(), address);
        self.core
            .write_value(address, payload)
            .await
            .map_err(BlueveryError::WriteFailed)
    }

    /// Snapshot of the session flags
    pub fn get_state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_scanning(&self) -> bool {
        self.state.is_scanning()
    }

    /// Peripherals reported since the current (or last) cycle started
    pub fn discovered_peripherals(&self) -> Vec<DiscoveredPeripheral> {
        self.state.discovered_peripherals()
    }

    pub fn options(&self) -> &BlueveryOptions {
        &self.options
    }
}
