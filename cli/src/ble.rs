// Desktop transport backed by btleplug
//
// Implements `BlueveryCore` on top of a host Bluetooth adapter and bridges the
// adapter's central events into `PeripheralEvent`s for the listener registry.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bluevery_core::{
    BlueveryCore, CharacteristicAddress, DiscoveredPeripheral, PeripheralEvent,
    ScanningSettings, TransportError, WriteConfirmation,
};
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, PeripheralProperties,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct BtleplugCore {
    adapter: Adapter,
    /// Peripherals seen since the last clear, keyed by address
    peripherals: Arc<RwLock<HashMap<String, Peripheral>>>,
    /// Ids already reported to the listeners since the last clear
    sightings: Arc<Mutex<SightingFilter>>,
    /// Whether the current burst reports repeated advertisements
    allow_duplicates: Arc<AtomicBool>,
}

impl BtleplugCore {
    /// Open the adapter at `adapter_index`
    pub async fn open(adapter_index: usize) -> Result<Self> {
        let manager = Manager::new()
            .await
            .context("Failed to start Bluetooth manager")?;
        let adapter = manager
            .adapters()
            .await
            .context("Failed to list Bluetooth adapters")?
            .into_iter()
            .nth(adapter_index)
            .with_context(|| format!("No Bluetooth adapter at index {}", adapter_index))?;

        if let Ok(info) = adapter.adapter_info().await {
            info!("Using Bluetooth adapter {}", info);
        }

        Ok(Self {
            adapter,
            peripherals: Arc::new(RwLock::new(HashMap::new())),
            sightings: Arc::new(Mutex::new(SightingFilter::default())),
            allow_duplicates: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Number of peripherals currently cached
    pub fn cached_count(&self) -> usize {
        self.peripherals.read().len()
    }

    /// Forward adapter events into `events` until the adapter stream ends
    pub fn spawn_event_bridge(&self, events: broadcast::Sender<PeripheralEvent>) -> JoinHandle<()> {
        let adapter = self.adapter.clone();
        let cache = self.peripherals.clone();
        let sightings = self.sightings.clone();
        let allow_duplicates = self.allow_duplicates.clone();

        tokio::spawn(async move {
            let mut stream = match adapter.events().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to subscribe to adapter events: {}", e);
                    return;
                }
            };

            while let Some(event) = stream.next().await {
                let event = match event {
                    CentralEvent::DeviceDiscovered(id) => {
                        let duplicates = allow_duplicates.load(Ordering::Relaxed);
                        sighted(&adapter, &cache, &sightings, &id, Sighting::Discovered, duplicates)
                            .await
                    }
                    // Peripherals the host stack already knows only ever send updates
                    CentralEvent::DeviceUpdated(id) => {
                        let duplicates = allow_duplicates.load(Ordering::Relaxed);
                        sighted(&adapter, &cache, &sightings, &id, Sighting::Updated, duplicates)
                            .await
                    }
                    CentralEvent::DeviceDisconnected(id) => match adapter.peripheral(&id).await {
                        Ok(peripheral) => Some(PeripheralEvent::Lost {
                            id: peripheral_key(&peripheral),
                        }),
                        Err(e) => {
                            debug!("Disconnected peripheral {:?} unavailable: {}", id, e);
                            None
                        }
                    },
                    _ => None,
                };

                if let Some(event) = event {
                    // No receivers just means nobody is subscribed right now
                    let _ = events.send(event);
                }
            }
            debug!("Adapter event stream ended");
        })
    }

    async fn find_peripheral(&self, id: &str) -> Result<Peripheral, TransportError> {
        let cached = self.peripherals.read().get(id).cloned();
        if let Some(peripheral) = cached {
            return Ok(peripheral);
        }

        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        let peripheral = peripherals
            .into_iter()
            .find(|p| peripheral_key(p).eq_ignore_ascii_case(id) || p.id().to_string() == id)
            .ok_or_else(|| TransportError::PeripheralNotFound(id.to_string()))?;

        self.peripherals
            .write()
            .insert(peripheral_key(&peripheral), peripheral.clone());
        Ok(peripheral)
    }

    async fn resolve_characteristic(
        &self,
        address: &CharacteristicAddress,
    ) -> Result<(Peripheral, Characteristic), TransportError> {
        let peripheral = self.find_peripheral(&address.peripheral_id).await?;

        if !peripheral.is_connected().await.unwrap_or(false) {
            debug!("Connecting to {}", address.peripheral_id);
            peripheral
                .connect()
                .await
                .map_err(|e| TransportError::NotConnected(format!("{}: {}", address.peripheral_id, e)))?;
        }
        peripheral
            .discover_services()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == address.service_uuid && c.uuid == address.characteristic_uuid)
            .ok_or_else(|| TransportError::CharacteristicNotFound(address.to_string()))?;

        Ok((peripheral, characteristic))
    }
}

#[async_trait]
impl BlueveryCore for BtleplugCore {
    async fn scan(&self, settings: &ScanningSettings) -> Result<(), TransportError> {
        self.allow_duplicates
            .store(settings.allow_duplicates, Ordering::Relaxed);

        self.adapter
            .start_scan(scan_filter(settings))
            .await
            .map_err(|e| TransportError::ScanFailed(e.to_string()))?;

        tokio::time::sleep(Duration::from_secs(settings.seconds as u64)).await;

        self.adapter
            .stop_scan()
            .await
            .map_err(|e| TransportError::ScanFailed(e.to_string()))?;

        let found = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        let mut cache = self.peripherals.write();
        for peripheral in found {
            cache.insert(peripheral_key(&peripheral), peripheral);
        }
        debug!("Burst finished, {} peripherals cached", cache.len());
        Ok(())
    }

    fn clear_scanned_peripherals(&self) {
        self.peripherals.write().clear();
        self.sightings.lock().clear();
    }

    async fn read_value(&self, address: &CharacteristicAddress) -> Result<Vec<u8>, TransportError> {
        let (peripheral, characteristic) = self.resolve_characteristic(address).await?;
        peripheral
            .read(&characteristic)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn write_value(
        &self,
        address: &CharacteristicAddress,
        payload: &[u8],
    ) -> Result<WriteConfirmation, TransportError> {
        let (peripheral, characteristic) = self.resolve_characteristic(address).await?;
        peripheral
            .write(&characteristic, payload, WriteType::WithResponse)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        Ok(WriteConfirmation {
            bytes_written: payload.len(),
            acknowledged: true,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sighting {
    Discovered,
    Updated,
}

/// Decides which adapter sightings reach the listeners
#[derive(Debug, Default)]
struct SightingFilter {
    reported: HashSet<String>,
}

impl SightingFilter {
    /// Discoveries always pass. Updates pass the first time an id is seen
    /// since the last clear, and every time while duplicates are allowed.
    fn admit(&mut self, key: &str, sighting: Sighting, allow_duplicates: bool) -> bool {
        let first = self.reported.insert(key.to_string());
        match sighting {
            Sighting::Discovered => true,
            Sighting::Updated => first || allow_duplicates,
        }
    }

    fn clear(&mut self) {
        self.reported.clear();
    }
}

async fn sighted(
    adapter: &Adapter,
    cache: &RwLock<HashMap<String, Peripheral>>,
    sightings: &Mutex<SightingFilter>,
    id: &PeripheralId,
    sighting: Sighting,
    allow_duplicates: bool,
) -> Option<PeripheralEvent> {
    let peripheral = match adapter.peripheral(id).await {
        Ok(peripheral) => peripheral,
        Err(e) => {
            debug!("Sighted peripheral {:?} unavailable: {}", id, e);
            return None;
        }
    };
    let key = peripheral_key(&peripheral);
    if !sightings.lock().admit(&key, sighting, allow_duplicates) {
        return None;
    }

    let properties = peripheral.properties().await.ok().flatten();
    cache.write().insert(key.clone(), peripheral);
    Some(PeripheralEvent::Discovered(describe(key, properties)))
}

fn peripheral_key(peripheral: &Peripheral) -> String {
    peripheral.address().to_string()
}

fn scan_filter(settings: &ScanningSettings) -> ScanFilter {
    ScanFilter {
        services: settings.service_uuids.clone(),
    }
}

fn describe(id: String, properties: Option<PeripheralProperties>) -> DiscoveredPeripheral {
    match properties {
        Some(props) => DiscoveredPeripheral {
            id,
            name: props.local_name,
            rssi: props.rssi,
        },
        None => DiscoveredPeripheral {
            id,
            name: None,
            rssi: None,
        },
    }
}
