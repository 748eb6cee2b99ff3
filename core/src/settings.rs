//! Advertising and scanning parameters
//!
//! Defaults favour immediate visibility: low-latency advertising at high transmit power
//! that never expires, and low-latency scanning with no batching delay.

use serde::{Deserialize, Serialize};

use crate::BeaconsError;

/// Longest advertising timeout radio stacks accept (0 disables the timeout)
pub const MAX_ADVERTISE_TIMEOUT_MS: u32 = 180_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvertiseMode {
    LowPower,
    Balanced,
    LowLatency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPowerLevel {
    UltraLow,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    Opportunistic,
    LowPower,
    Balanced,
    LowLatency,
}

/// Parameters handed to the advertiser with every frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvertiseSettings {
    pub mode: AdvertiseMode,
    pub tx_power: TxPowerLevel,
    pub connectable: bool,
    /// 0 = advertise until stopped
    pub timeout_ms: u32,
}

impl Default for AdvertiseSettings {
    fn default() -> Self {
        Self {
            mode: AdvertiseMode::LowLatency,
            tx_power: TxPowerLevel::High,
            connectable: false,
            timeout_ms: 0,
        }
    }
}

impl AdvertiseSettings {
    pub fn validate(&self) -> Result<(), BeaconsError> {
        if self.timeout_ms > MAX_ADVERTISE_TIMEOUT_MS {
            return Err(BeaconsError::InvalidConfig(format!(
                "Advertise timeout must be <= {} ms",
                MAX_ADVERTISE_TIMEOUT_MS
            )));
        }
        Ok(())
    }
}

/// Parameters handed to the scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub mode: ScanMode,
    /// Batching delay; 0 delivers every packet as it arrives
    pub report_delay_ms: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            mode: ScanMode::LowLatency,
            report_delay_ms: 0,
        }
    }
}

/// Everything a [`crate::BeaconPlugin`] can be tuned with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconsConfig {
    pub advertise: AdvertiseSettings,
    pub scan: ScanSettings,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for BeaconsConfig {
    fn default() -> Self {
        Self {
            advertise: AdvertiseSettings::default(),
            scan: ScanSettings::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl BeaconsConfig {
    pub fn validate(&self) -> Result<(), BeaconsError> {
        self.advertise.validate()?;
        if self.log_filter.trim().is_empty() {
            return Err(BeaconsError::InvalidConfig(
                "Log filter cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
