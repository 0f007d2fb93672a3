//! Transport core contract
//!
//! The core never talks to a radio directly. Platform code implements
//! [`BlueveryCore`] on top of its native BLE stack and hands it to the façade.

use crate::error::TransportError;
use crate::options::ScanningSettings;
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

/// Identifies a GATT characteristic on a peripheral
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharacteristicAddress {
    pub peripheral_id: String,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
}

impl CharacteristicAddress {
    pub fn new(
        peripheral_id: impl Into<String>,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Self {
        Self {
            peripheral_id: peripheral_id.into(),
            service_uuid,
            characteristic_uuid,
        }
    }
}

impl fmt::Display for CharacteristicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.peripheral_id, self.service_uuid, self.characteristic_uuid
        )
    }
}

/// Acknowledgement returned by a transport after a characteristic write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteConfirmation {
    pub bytes_written: usize,
    /// Whether the peripheral acknowledged the write (write-with-response)
    pub acknowledged: bool,
}

/// Native BLE operations consumed by the scan scheduler and the façade
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlueveryCore: Send + Sync {
    /// Run one radio burst with the given filter
    async fn scan(&self, settings: &ScanningSettings) -> Result<(), TransportError>;

    /// Drop the transport's cache of peripherals seen by earlier scans
    fn clear_scanned_peripherals(&self);

    async fn read_value(&self, address: &CharacteristicAddress) -> Result<Vec<u8>, TransportError>;

    async fn write_value(
        &self,
        address: &CharacteristicAddress,
        payload: &[u8],
    ) -> Result<WriteConfirmation, TransportError>;
}
