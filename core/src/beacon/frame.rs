/// Proximity-beacon frame codec
///
/// The frame is the 23-byte manufacturer-specific record advertised under company code
/// 0x004C. In raw scan data it is wrapped in the manufacturer-data AD structure
/// (`1A FF 4C 00`) and may be preceded by the 3-byte flags structure (`02 01 06`).
///
/// ```text
/// offset  size  field
/// 0       1     sub-type (0x02)
/// 1       1     sub-type length (0x15)
/// 2       16    uuid, network byte order
/// 18      2     major, big-endian
/// 20      2     minor, big-endian
/// 22      1     calibrated power, signed
/// ```

use std::fmt;

use thiserror::Error;
use tracing::trace;
use uuid::Uuid;

use super::identity::{BeaconIdentity, BeaconSighting};

/// Company identifier the frame is advertised under
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/// Size of the manufacturer-specific record
pub const FRAME_LEN: usize = 23;

/// Shortest raw scan record worth inspecting
pub const MIN_RECORD_LEN: usize = 26;

/// Leading flags AD structure that some stacks keep in the raw record
pub const FLAGS_PREFIX: [u8; 3] = [0x02, 0x01, 0x06];

/// AD length (0x1A) + AD type manufacturer-specific (0xFF)
pub const MARKER_AD_HEADER: u16 = 0x1AFF;
/// Company code 0x004C, little-endian on the wire
pub const MARKER_COMPANY: u16 = 0x4C00;
/// Sub-type 0x02 + length 0x15
pub const MARKER_SUBTYPE: u16 = 0x0215;

const SUBTYPE: u8 = 0x02;
const SUBTYPE_LEN: u8 = 0x15;

/// Envelope markers in the order they appear, with their position after the flags prefix
const MARKERS: [(usize, u16); 3] = [
    (0, MARKER_AD_HEADER),
    (2, MARKER_COMPANY),
    (4, MARKER_SUBTYPE),
];

/// Bytes needed after the (optional) flags prefix: AD header + company + frame
const ENVELOPED_LEN: usize = 4 + FRAME_LEN;

/// Errors for encoding a beacon identity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Invalid beacon identifier: {0}")]
    InvalidIdentifier(String),
}

/// Reasons a raw record is not a proximity beacon
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Record too short: {len} bytes")]
    TooShort { len: usize },
    #[error("Bad preamble at offset {offset}: expected {expected:#06X}, found {found:#06X}")]
    BadPreamble {
        offset: usize,
        expected: u16,
        found: u16,
    },
}

/// The 23-byte manufacturer-specific payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdvertisementFrame([u8; FRAME_LEN]);

impl AdvertisementFrame {
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Wrap the frame the way it appears in a raw scan record.
    pub fn to_scan_record(&self, with_flags: bool) -> Vec<u8> {
        let mut record = Vec::with_capacity(FLAGS_PREFIX.len() + ENVELOPED_LEN);
        if with_flags {
            record.extend_from_slice(&FLAGS_PREFIX);
        }
        record.extend_from_slice(&MARKER_AD_HEADER.to_be_bytes());
        record.extend_from_slice(&MARKER_COMPANY.to_be_bytes());
        record.extend_from_slice(&self.0);
        record
    }
}

impl fmt::Display for AdvertisementFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Rebuild a manufacturer-specific AD structure from a company id and its payload.
///
/// Radio stacks that hand out parsed manufacturer data (company id stripped) use this
/// to produce a record [`decode`] understands. Returns `None` if the payload cannot fit
/// in a single AD structure.
pub fn wrap_manufacturer_data(company_id: u16, data: &[u8]) -> Option<Vec<u8>> {
    let ad_len = u8::try_from(3 + data.len()).ok()?;
    let mut record = Vec::with_capacity(4 + data.len());
    record.push(ad_len);
    record.push(0xFF);
    record.extend_from_slice(&company_id.to_le_bytes());
    record.extend_from_slice(data);
    Some(record)
}

/// Pack an identity into a frame
pub fn encode(identity: &BeaconIdentity) -> Result<AdvertisementFrame, EncodeError> {
    let uuid = identity.parsed_uuid()?;

    let mut frame = [0u8; FRAME_LEN];
    frame[0] = SUBTYPE;
    frame[1] = SUBTYPE_LEN;
    frame[2..18].copy_from_slice(uuid.as_bytes());
    frame[18..20].copy_from_slice(&identity.major.to_be_bytes());
    frame[20..22].copy_from_slice(&identity.minor.to_be_bytes());
    frame[22] = identity.power_level as u8;

    Ok(AdvertisementFrame(frame))
}

/// Decode a raw scan record. `rssi` is the strength reported for this packet.
pub fn decode(raw: &[u8], rssi: i16) -> Result<BeaconSighting, DecodeError> {
    if raw.len() < MIN_RECORD_LEN {
        trace!("Rejected record: {} bytes", raw.len());
        return Err(DecodeError::TooShort { len: raw.len() });
    }

    let start = if raw.starts_with(&FLAGS_PREFIX) {
        FLAGS_PREFIX.len()
    } else {
        0
    };

    let body = &raw[start..];
    if body.len() < ENVELOPED_LEN {
        trace!("Rejected record: {} bytes after flags", body.len());
        return Err(DecodeError::TooShort { len: raw.len() });
    }

    for (offset, expected) in MARKERS {
        let found = u16::from_be_bytes([body[offset], body[offset + 1]]);
        if found != expected {
            trace!(
                "Rejected record: marker {:#06X} != {:#06X} at {}",
                found,
                expected,
                start + offset
            );
            return Err(DecodeError::BadPreamble {
                offset: start + offset,
                expected,
                found,
            });
        }
    }

    let frame = &body[4..4 + FRAME_LEN];

    let mut uuid_bytes = [0u8; 16];
    uuid_bytes.copy_from_slice(&frame[2..18]);
    let uuid = Uuid::from_bytes(uuid_bytes);

    Ok(BeaconSighting {
        identity: BeaconIdentity {
            uuid: uuid.hyphenated().to_string(),
            major: u16::from_be_bytes([frame[18], frame[19]]),
            minor: u16::from_be_bytes([frame[20], frame[21]]),
            power_level: frame[22] as i8,
        },
        rssi,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0";

    fn sample() -> BeaconIdentity {
        BeaconIdentity::new(UUID, 1, 5, -59)
    }

    #[test]
    fn test_encode_known_frame() {
        let frame = encode(&sample()).expect("encode");
        assert_eq!(
            frame.to_hex(),
            "0215E2C56DB5DFFB48D2B060D0F5A71096E000010005C5"
        );
        assert_eq!(frame.as_bytes().len(), FRAME_LEN);
    }

    #[test]
    fn test_encode_rejects_bad_uuid() {
        let identity = BeaconIdentity::new("E2C56DB5-DFFB", 1, 5, -59);
        assert!(matches!(
            encode(&identity),
            Err(EncodeError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_encode_extreme_values() {
        let identity = BeaconIdentity::new(UUID, u16::MAX, 0, i8::MIN);
        let frame = encode(&identity).unwrap();
        let bytes = frame.as_bytes();

        assert_eq!(&bytes[18..20], &[0xFF, 0xFF]);
        assert_eq!(&bytes[20..22], &[0x00, 0x00]);
        assert_eq!(bytes[22], 0x80);
    }

    #[test]
    fn test_decode_plain_record() {
        let record = encode(&sample()).unwrap().to_scan_record(false);
        let sighting = decode(&record, -67).expect("decode");

        assert_eq!(sighting.identity.uuid, UUID.to_lowercase());
        assert_eq!(sighting.identity.major, 1);
        assert_eq!(sighting.identity.minor, 5);
        assert_eq!(sighting.identity.power_level, -59);
        assert_eq!(sighting.rssi, -67);
    }

    #[test]
    fn test_decode_with_flags_prefix() {
        let record = encode(&sample()).unwrap().to_scan_record(true);
        assert_eq!(&record[..3], &FLAGS_PREFIX);

        let sighting = decode(&record, -40).expect("decode");
        assert!(sighting.identity.same_beacon(&sample()));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut record = encode(&sample()).unwrap().to_scan_record(true);
        record.extend_from_slice(&[0u8; 32]);
        assert!(decode(&record, -50).is_ok());
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let record = encode(&sample()).unwrap().to_scan_record(false);
        assert_eq!(
            decode(&record[..25], -50),
            Err(DecodeError::TooShort { len: 25 })
        );
        assert!(matches!(decode(&[], -50), Err(DecodeError::TooShort { .. })));
    }

    #[test]
    fn test_decode_rejects_truncated_power_byte() {
        // 26 bytes passes the first length gate but lacks the power byte
        let record = encode(&sample()).unwrap().to_scan_record(false);
        assert_eq!(
            decode(&record[..26], -50),
            Err(DecodeError::TooShort { len: 26 })
        );
    }

    #[test]
    fn test_decode_rejects_truncated_after_flags() {
        let record = encode(&sample()).unwrap().to_scan_record(true);
        assert!(matches!(
            decode(&record[..28], -50),
            Err(DecodeError::TooShort { len: 28 })
        ));
    }

    #[test]
    fn test_decode_rejects_each_marker() {
        let clean = encode(&sample()).unwrap().to_scan_record(false);

        for (index, expected) in [(0usize, MARKER_AD_HEADER), (2, MARKER_COMPANY), (4, MARKER_SUBTYPE)] {
            let mut record = clean.clone();
            record[index + 1] ^= 0xFF;
            match decode(&record, -50) {
                Err(DecodeError::BadPreamble { offset, expected: e, .. }) => {
                    assert_eq!(offset, index);
                    assert_eq!(e, expected);
                }
                other => panic!("expected BadPreamble, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_decode_reports_offset_after_flags() {
        let mut record = encode(&sample()).unwrap().to_scan_record(true);
        record[5] = 0x4D; // company low byte
        assert!(matches!(
            decode(&record, -50),
            Err(DecodeError::BadPreamble { offset: 5, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_other_manufacturer() {
        let record = wrap_manufacturer_data(0x0059, &[0u8; FRAME_LEN]).unwrap();
        assert!(matches!(
            decode(&record, -50),
            Err(DecodeError::BadPreamble { offset: 2, .. })
        ));
    }

    #[test]
    fn test_wrap_manufacturer_data_matches_envelope() {
        let frame = encode(&sample()).unwrap();
        let wrapped = wrap_manufacturer_data(APPLE_COMPANY_ID, frame.as_bytes()).unwrap();
        assert_eq!(wrapped, frame.to_scan_record(false));
    }

    #[test]
    fn test_wrap_manufacturer_data_too_large() {
        assert!(wrap_manufacturer_data(APPLE_COMPANY_ID, &[0u8; 300]).is_none());
    }
}
