/// Proximity beacons
///
/// - **identity**: beacon identity, advertising setting and scan sighting value types
/// - **frame**: the 23-byte manufacturer-specific frame codec
/// - **registry**: per-id advertisement lifecycle with asynchronous completion
/// - **scan**: the single scan session feeding decoded beacons to a sink
///
/// Radio access goes through [`crate::gateway`], so everything here runs without hardware.

pub mod frame;
pub mod identity;
pub mod registry;
pub mod scan;

pub use frame::{
    decode, encode, wrap_manufacturer_data, AdvertisementFrame, DecodeError, EncodeError,
    APPLE_COMPANY_ID, FRAME_LEN, MIN_RECORD_LEN,
};

pub use identity::{BeaconIdentity, BeaconSetting, BeaconSighting, Proximity};

pub use registry::{BeaconLifecycleManager, BeaconState, StartCompletion};

pub use scan::{BeaconSink, ScanSession, ScanStats};
