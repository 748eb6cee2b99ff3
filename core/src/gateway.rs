//! Radio gateway contract
//!
//! The core never touches a radio directly. Platform code (Android/iOS bindings, BlueZ,
//! btleplug, a test fake) implements these traits and the core only queries them.
//! Any missing capability is reported as `None`/`false`, never as a panic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::beacon::frame::{AdvertisementFrame, APPLE_COMPANY_ID};
use crate::settings::{AdvertiseSettings, ScanSettings};

// ============================================================================
// HANDLES
// ============================================================================

/// Identifies one advertisement for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdvertisementHandle(pub u64);

/// Identifies one scan registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanHandle(pub u64);

impl fmt::Display for AdvertisementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "adv#{}", self.0)
    }
}

impl fmt::Display for ScanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scan#{}", self.0)
    }
}

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Failures reported by the radio stack
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Advertisement data too large")]
    DataTooLarge,
    #[error("Too many advertisers")]
    TooManyAdvertisers,
    #[error("Already started")]
    AlreadyStarted,
    #[error("Application registration failed")]
    RegistrationFailed,
    #[error("Feature unsupported")]
    FeatureUnsupported,
    #[error("Internal radio error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Map an advertise-failure code (1..=5) from the platform stack
    pub fn from_advertise_code(code: i32) -> Self {
        match code {
            1 => GatewayError::DataTooLarge,
            2 => GatewayError::TooManyAdvertisers,
            3 => GatewayError::AlreadyStarted,
            5 => GatewayError::FeatureUnsupported,
            other => GatewayError::Internal(format!("advertise error code {}", other)),
        }
    }

    /// Map a scan-failure code (1..=4) from the platform stack
    pub fn from_scan_code(code: i32) -> Self {
        match code {
            1 => GatewayError::AlreadyStarted,
            2 => GatewayError::RegistrationFailed,
            4 => GatewayError::FeatureUnsupported,
            other => GatewayError::Internal(format!("scan error code {}", other)),
        }
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// Advertisement payload: one manufacturer-specific record, nothing else
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertiseData {
    pub company_id: u16,
    pub manufacturer_data: Vec<u8>,
    pub include_device_name: bool,
    pub include_tx_power_level: bool,
}

impl AdvertiseData {
    pub fn for_frame(frame: &AdvertisementFrame) -> Self {
        Self {
            company_id: APPLE_COMPANY_ID,
            manufacturer_data: frame.to_vec(),
            include_device_name: false,
            include_tx_power_level: false,
        }
    }
}

/// One raw advertisement as delivered by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub bytes: Vec<u8>,
    /// Received signal strength in dBm
    pub rssi: i16,
}

impl ScanRecord {
    pub fn new(bytes: Vec<u8>, rssi: i16) -> Self {
        Self { bytes, rssi }
    }
}

/// Invoked by the scanner, on its own thread, for every advertisement it sees
pub type ScanCallback = Box<dyn Fn(ScanRecord) + Send + Sync>;

// ============================================================================
// CAPABILITY TRAITS
// ============================================================================

/// Broadcasts advertisements
#[async_trait]
pub trait Advertiser: Send + Sync {
    /// Begin advertising. Resolves once the radio confirms or rejects the request.
    async fn start_advertising(
        &self,
        handle: AdvertisementHandle,
        settings: &AdvertiseSettings,
        data: &AdvertiseData,
    ) -> Result<(), GatewayError>;

    /// Stop advertising. Unknown handles are ignored.
    fn stop_advertising(&self, handle: AdvertisementHandle);
}

/// Listens for advertisements
pub trait Scanner: Send + Sync {
    /// Register `callback` for every advertisement seen until [`Scanner::stop_scan`].
    fn start_scan(
        &self,
        handle: ScanHandle,
        settings: &ScanSettings,
        callback: ScanCallback,
    ) -> Result<(), GatewayError>;

    fn stop_scan(&self, handle: ScanHandle);
}

/// Access point to the local radio
#[cfg_attr(test, mockall::automock)]
pub trait AdapterGateway: Send + Sync {
    /// A radio adapter exists on this device
    fn radio_available(&self) -> bool;

    /// The radio adapter is powered on
    fn radio_enabled(&self) -> bool;

    /// Advertising capability; `None` if absent or the radio is off
    fn advertiser(&self) -> Option<Arc<dyn Advertiser>>;

    /// Scanning capability; `None` if absent or the radio is off
    fn scanner(&self) -> Option<Arc<dyn Scanner>>;

    /// Human-readable platform description
    fn platform_version(&self) -> String;
}

// ============================================================================
// FAKE RADIO (for testing)
// ============================================================================
