/// Scan and façade configuration
///
/// `ScanOptions` describes one scan cycle: what each radio burst looks for,
/// how long to wait before each burst and how many bursts to fire.
/// `BlueveryOptions` holds the settings that stay fixed for a façade's lifetime.

use crate::error::BlueveryError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Default consideration period applied after the last burst of a cycle
pub const DEFAULT_CONSIDERATION_MS: u64 = 1000;

/// Transport-level filter and mode for a single radio burst
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanningSettings {
    /// Only report peripherals advertising one of these services (empty = all)
    pub service_uuids: Vec<Uuid>,
    /// How long a burst keeps the radio scanning, in seconds
    pub seconds: u32,
    /// Report repeated advertisements from the same peripheral
    pub allow_duplicates: bool,
}

impl Default for ScanningSettings {
    fn default() -> Self {
        Self {
            service_uuids: Vec::new(),
            seconds: 1,
            allow_duplicates: false,
        }
    }
}

/// Options for one scan cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub scanning_settings: ScanningSettings,
    /// Delay before each burst in milliseconds (0 still yields)
    pub interval_length: u64,
    /// Number of bursts in the cycle (>= 1)
    pub iterations: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            scanning_settings: ScanningSettings::default(),
            interval_length: 0,
            iterations: 1,
        }
    }
}

impl ScanOptions {
    /// Create validated scan options
    pub fn new(
        scanning_settings: ScanningSettings,
        interval_length: u64,
        iterations: u32,
    ) -> Result<Self, BlueveryError> {
        let options = Self {
            scanning_settings,
            interval_length,
            iterations,
        };
        options.validate()?;
        Ok(options)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), BlueveryError> {
        if self.iterations == 0 {
            return Err(BlueveryError::InvalidOptions(
                "iterations must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_length)
    }
}

/// Settings fixed for the lifetime of a façade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueveryOptions {
    /// Cooldown applied after the last burst, in milliseconds
    pub consideration_ms: u64,
}

impl Default for BlueveryOptions {
    fn default() -> Self {
        Self {
            consideration_ms: DEFAULT_CONSIDERATION_MS,
        }
    }
}

impl BlueveryOptions {
    pub fn consideration(&self) -> Duration {
        Duration::from_millis(self.consideration_ms)
    }
}
