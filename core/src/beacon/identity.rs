/// Beacon identity value types
///
/// A beacon is identified on the air by a 128-bit UUID, two 16-bit sub-identifiers
/// (major/minor) and a calibrated power byte. Advertising adds a caller-chosen key that
/// never leaves the process; scanning adds the per-packet RSSI.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::frame::EncodeError;

/// The identity carried inside a proximity-beacon frame
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconIdentity {
    /// 128-bit identifier in canonical textual form
    pub uuid: String,
    pub major: u16,
    pub minor: u16,
    /// Calibrated RSSI at 1 m, in dBm
    pub power_level: i8,
}

impl BeaconIdentity {
    pub fn new(uuid: impl Into<String>, major: u16, minor: u16, power_level: i8) -> Self {
        Self {
            uuid: uuid.into(),
            major,
            minor,
            power_level,
        }
    }

    /// Parse the textual identifier
    pub fn parsed_uuid(&self) -> Result<Uuid, EncodeError> {
        Uuid::parse_str(self.uuid.trim())
            .map_err(|e| EncodeError::InvalidIdentifier(format!("{}: {}", self.uuid, e)))
    }

    /// Compare two identities by their 128-bit value rather than by spelling.
    pub fn same_beacon(&self, other: &BeaconIdentity) -> bool {
        match (self.parsed_uuid(), other.parsed_uuid()) {
            (Ok(a), Ok(b)) => a == b && self.major == other.major && self.minor == other.minor,
            _ => false,
        }
    }
}

/// An identity to advertise, keyed by the caller's beacon id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconSetting {
    pub beacon_id: String,
    #[serde(flatten)]
    pub identity: BeaconIdentity,
}

impl BeaconSetting {
    pub fn new(beacon_id: impl Into<String>, identity: BeaconIdentity) -> Self {
        Self {
            beacon_id: beacon_id.into(),
            identity,
        }
    }
}

/// A beacon decoded from a scan, with the signal strength of that packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconSighting {
    #[serde(flatten)]
    pub identity: BeaconIdentity,
    /// RSSI of the received packet in dBm
    pub rssi: i16,
}

/// Coarse distance bucket derived from a sighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proximity {
    Immediate,
    Near,
    Far,
    Unknown,
}

impl BeaconSighting {
    /// Log-distance path-loss estimate in metres.
    ///
    /// Uses the beacon's calibrated 1 m power, so a packet received exactly at that
    /// strength is 1 m away. Returns `None` when the radio reported no RSSI (0).
    pub fn estimated_distance_m(&self) -> Option<f64> {
        if self.rssi == 0 {
            return None;
        }
        let power = self.identity.power_level as f64;
        Some(10f64.powf((power - self.rssi as f64) / 20.0))
    }

    pub fn proximity(&self) -> Proximity {
        match self.estimated_distance_m() {
            None => Proximity::Unknown,
            Some(d) if d < 0.5 => Proximity::Immediate,
            Some(d) if d < 4.0 => Proximity::Near,
            Some(_) => Proximity::Far,
        }
    }
}
