// Beacons Core: proximity beacon engine
#![allow(clippy::empty_line_after_doc_comments)]
//
// Encodes and decodes the 23-byte beacon frame, keeps one advertisement per beacon id,
// and turns raw scan records into sightings. All radio access goes through the
// `AdapterGateway` trait so the whole crate runs against a fake radio in tests.

pub mod beacon;
pub mod gateway;
pub mod plugin;
pub mod settings;

use thiserror::Error;

pub use beacon::{
    decode, encode, AdvertisementFrame, BeaconIdentity, BeaconLifecycleManager, BeaconSetting,
    BeaconSighting, BeaconState, DecodeError, EncodeError, Proximity, ScanSession, ScanStats,
    StartCompletion,
};
pub use gateway::{
    AdapterGateway, AdvertiseData, AdvertisementHandle, Advertiser, GatewayError, ScanCallback,
    ScanHandle, ScanRecord, Scanner,
};
pub use plugin::{BeaconEvents, BeaconPlugin, MethodCall, StartBeaconArgs};
pub use settings::{
    AdvertiseMode, AdvertiseSettings, BeaconsConfig, ScanMode, ScanSettings, TxPowerLevel,
};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BeaconsError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Invalid beacon identifier: {0}")]
    InvalidIdentifier(String),
    #[error("No async runtime available")]
    RuntimeUnavailable,
    #[error("Start of beacon {0} superseded before the radio answered")]
    Superseded(String),
    #[error("Method not implemented: {0}")]
    NotImplemented(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<EncodeError> for BeaconsError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::InvalidIdentifier(uuid) => BeaconsError::InvalidIdentifier(uuid),
        }
    }
}
