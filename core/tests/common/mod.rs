// Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bluevery_core::{
    BlueveryCore, BlueveryListeners, BlueveryState, CharacteristicAddress, ListenerHandle,
    ScanningSettings, TransportError, WriteConfirmation,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{self, Instant};

/// What the fake transport saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Clear,
    Scan(Duration),
}

/// Transport fake that timestamps every call against the (paused) tokio clock
pub struct RecordingCore {
    origin: Instant,
    calls: Mutex<Vec<TransportCall>>,
    fail_on_burst: Option<usize>,
    read_reply: Vec<u8>,
    write_reply: WriteConfirmation,
}

impl RecordingCore {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            calls: Mutex::new(Vec::new()),
            fail_on_burst: None,
            read_reply: b"read to peripheral".to_vec(),
            write_reply: WriteConfirmation {
                bytes_written: 0,
                acknowledged: true,
            },
        }
    }

    /// Make the `n`-th burst (1-based) fail
    pub fn failing_on_burst(mut self, n: usize) -> Self {
        self.fail_on_burst = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    pub fn scan_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, TransportCall::Scan(_)))
            .count()
    }

    pub fn clear_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, TransportCall::Clear))
            .count()
    }

    /// Offsets from construction of every burst
    pub fn scan_offsets(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                TransportCall::Scan(at) => Some(*at),
                TransportCall::Clear => None,
            })
            .collect()
    }
}

#[async_trait]
impl BlueveryCore for RecordingCore {
    async fn scan(&self, _settings: &ScanningSettings) -> Result<(), TransportError> {
        let mut calls = self.calls.lock();
        calls.push(TransportCall::Scan(self.origin.elapsed()));
        let bursts = calls
            .iter()
            .filter(|c| matches!(c, TransportCall::Scan(_)))
            .count();
        if Some(bursts) == self.fail_on_burst {
            return Err(TransportError::ScanFailed("radio busy".to_string()));
        }
        Ok(())
    }

    fn clear_scanned_peripherals(&self) {
        self.calls.lock().push(TransportCall::Clear);
    }

    async fn read_value(&self, _address: &CharacteristicAddress) -> Result<Vec<u8>, TransportError> {
        Ok(self.read_reply.clone())
    }

    async fn write_value(
        &self,
        _address: &CharacteristicAddress,
        payload: &[u8],
    ) -> Result<WriteConfirmation, TransportError> {
        Ok(WriteConfirmation {
            bytes_written: payload.len(),
            ..self.write_reply.clone()
        })
    }
}

/// Transport fake whose bursts stay in flight until `release` is called
pub struct GatedCore {
    gate: Notify,
    scans: AtomicUsize,
    fail: bool,
}

impl GatedCore {
    pub fn new() -> Self {
        Self {
            gate: Notify::new(),
            scans: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// Released bursts fail instead of succeeding
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Let the burst in flight (or the next one) complete
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlueveryCore for GatedCore {
    async fn scan(&self, _settings: &ScanningSettings) -> Result<(), TransportError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        if self.fail {
            return Err(TransportError::ScanFailed("radio reset".to_string()));
        }
        Ok(())
    }

    fn clear_scanned_peripherals(&self) {}

    async fn read_value(&self, address: &CharacteristicAddress) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::PeripheralNotFound(address.peripheral_id.clone()))
    }

    async fn write_value(
        &self,
        address: &CharacteristicAddress,
        _payload: &[u8],
    ) -> Result<WriteConfirmation, TransportError> {
        Err(TransportError::PeripheralNotFound(address.peripheral_id.clone()))
    }
}

/// Listener registry that delivers nothing
pub struct NoopListeners;

impl BlueveryListeners for NoopListeners {
    fn subscribe(&self, _state: BlueveryState) -> ListenerHandle {
        ListenerHandle::new(0)
    }

    fn unsubscribe(&self, _handle: ListenerHandle) {}
}

/// Let every ready task run without moving the clock
pub async fn flush() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Flush, move the paused clock forward by `ms`, flush again
pub async fn flush_advance(ms: u64) {
    flush().await;
    time::advance(Duration::from_millis(ms)).await;
    flush().await;
}
