// Configuration management for the bluevery CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/bluevery/config.json
// - Linux: ~/.config/bluevery/config.json
// - Windows: %APPDATA%\bluevery\config.json

use anyhow::{Context, Result};
use bluevery_core::{BlueveryOptions, ScanOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Index of the Bluetooth adapter to drive
    pub adapter_index: usize,

    /// Cooldown applied after every scan cycle, in milliseconds
    pub consideration_ms: u64,

    /// Directory for daily rolling log files (stderr only when unset)
    pub log_dir: Option<String>,

    /// Defaults for `bluevery scan`
    pub scan: ScanOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            consideration_ms: BlueveryOptions::default().consideration_ms,
            log_dir: None,
            scan: ScanOptions::default(),
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("bluevery");

        std::fs::create_dir_all(&config_dir)
            .context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the platform location, creating defaults on first use
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    /// Load config from `path`, writing defaults there if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .context("Failed to read config file")?;
            let config: Config = serde_json::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save config to the platform location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Options handed to the façade
    pub fn bluevery_options(&self) -> BlueveryOptions {
        BlueveryOptions {
            consideration_ms: self.consideration_ms,
        }
    }

    /// Set a config value (in memory; call `save` to persist)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "adapter_index" => {
                self.adapter_index = value.parse()
                    .context("Invalid adapter index")?;
            }
            "consideration_ms" => {
                self.consideration_ms = value.parse()
                    .context("Invalid number")?;
            }
            "log_dir" => {
                self.log_dir = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "interval_ms" => {
                self.scan.interval_length = value.parse()
                    .context("Invalid number")?;
            }
            "iterations" => {
                let iterations: u32 = value.parse()
                    .context("Invalid number")?;
                if iterations == 0 {
                    anyhow::bail!("iterations must be >= 1");
                }
                self.scan.iterations = iterations;
            }
            "burst_seconds" => {
                self.scan.scanning_settings.seconds = value.parse()
                    .context("Invalid number")?;
            }
            "allow_duplicates" => {
                self.scan.scanning_settings.allow_duplicates = value.parse()
                    .context("Invalid boolean value")?;
            }
            "service_uuids" => {
                self.scan.scanning_settings.service_uuids = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Uuid::parse_str(s).with_context(|| format!("Invalid UUID: {}", s)))
                    .collect::<Result<Vec<_>>>()?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "adapter_index" => Some(self.adapter_index.to_string()),
            "consideration_ms" => Some(self.consideration_ms.to_string()),
            "log_dir" => self.log_dir.clone(),
            "interval_ms" => Some(self.scan.interval_length.to_string()),
            "iterations" => Some(self.scan.iterations.to_string()),
            "burst_seconds" => Some(self.scan.scanning_settings.seconds.to_string()),
            "allow_duplicates" => Some(self.scan.scanning_settings.allow_duplicates.to_string()),
            "service_uuids" => Some(self.service_uuids_string()),
            _ => None,
        }
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            ("adapter_index".to_string(), self.adapter_index.to_string()),
            ("consideration_ms".to_string(), format!("{}ms", self.consideration_ms)),
            ("log_dir".to_string(), self.log_dir.clone().unwrap_or_else(|| "(stderr)".to_string())),
            ("interval_ms".to_string(), format!("{}ms", self.scan.interval_length)),
            ("iterations".to_string(), self.scan.iterations.to_string()),
            ("burst_seconds".to_string(), format!("{}s", self.scan.scanning_settings.seconds)),
            ("allow_duplicates".to_string(), self.scan.scanning_settings.allow_duplicates.to_string()),
            ("service_uuids".to_string(), {
                let uuids = self.service_uuids_string();
                if uuids.is_empty() { "(any)".to_string() } else { uuids }
            }),
        ]
    }

    fn service_uuids_string(&self) -> String {
        self.scan
            .scanning_settings
            .service_uuids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}
