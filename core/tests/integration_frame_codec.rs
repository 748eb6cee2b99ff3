//! Frame codec integration tests
//!
//! Exercises the public codec API the way a radio backend uses it: encode an identity,
//! wrap it like a scan record, decode it back.
//!
//! Run with: cargo test --test integration_frame_codec

use beacons_core::beacon::{wrap_manufacturer_data, APPLE_COMPANY_ID, FRAME_LEN};
use beacons_core::{decode, encode, BeaconIdentity, DecodeError, Proximity};
use proptest::prelude::*;

const UUID: &str = "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0";

#[test]
fn test_known_frame_bytes() {
    let frame = encode(&BeaconIdentity::new(UUID, 1, 5, -59)).expect("valid identity");

    assert_eq!(frame.as_bytes().len(), FRAME_LEN);
    assert_eq!(
        frame.to_hex(),
        "0215E2C56DB5DFFB48D2B060D0F5A71096E000010005C5"
    );
    println!("✓ Frame bytes match the known layout");
}

#[test]
fn test_decode_raw_record_with_flags() {
    let mut raw = hex::decode("0201061AFF4C000215E2C56DB5DFFB48D2B060D0F5A71096E000010005C5")
        .expect("valid hex");
    // trailing bytes after the frame are ignored
    raw.extend_from_slice(&[0x00, 0x00]);

    let sighting = decode(&raw, -62).expect("beacon record");
    assert_eq!(sighting.identity.uuid, "e2c56db5-dffb-48d2-b060-d0f5a71096e0");
    assert_eq!(sighting.identity.major, 1);
    assert_eq!(sighting.identity.minor, 5);
    assert_eq!(sighting.identity.power_level, -59);
    assert_eq!(sighting.rssi, -62);
    println!("✓ Raw record decoded: {:?}", sighting);
}

#[test]
fn test_manufacturer_data_from_parsed_advertisement() {
    // stacks that parse advertisements hand out the frame under its company id
    let frame = encode(&BeaconIdentity::new(UUID, 300, 7, -70)).unwrap();
    let record = wrap_manufacturer_data(APPLE_COMPANY_ID, frame.as_bytes()).unwrap();

    let sighting = decode(&record, -80).expect("rebuilt record decodes");
    assert_eq!(sighting.identity.major, 300);
    assert_eq!(sighting.identity.minor, 7);
    assert!(sighting.identity.same_beacon(&BeaconIdentity::new(UUID, 300, 7, -70)));
    println!("✓ Parsed manufacturer data rebuilt and decoded");
}

#[test]
fn test_foreign_company_rejected() {
    let frame = encode(&BeaconIdentity::new(UUID, 1, 1, -59)).unwrap();
    let record = wrap_manufacturer_data(0x0059, frame.as_bytes()).unwrap();

    assert!(matches!(
        decode(&record, -50),
        Err(DecodeError::BadPreamble { offset: 2, .. })
    ));
    println!("✓ Foreign company id rejected");
}

#[test]
fn test_short_records_rejected() {
    for len in [0usize, 1, 10, 25] {
        let raw = vec![0x1A; len];
        assert_eq!(decode(&raw, -50), Err(DecodeError::TooShort { len }));
    }
    println!("✓ Short records rejected");
}

#[test]
fn test_proximity_from_sighting() {
    let frame = encode(&BeaconIdentity::new(UUID, 1, 1, -59)).unwrap();
    let near = decode(&frame.to_scan_record(true), -59).unwrap();
    let far = decode(&frame.to_scan_record(true), -95).unwrap();

    assert_eq!(near.proximity(), Proximity::Near);
    assert_eq!(far.proximity(), Proximity::Far);
    println!("✓ Proximity classified");
}

proptest! {
    #[test]
    fn test_encode_decode_preserves_identity(
        uuid_bytes in any::<[u8; 16]>(),
        major in any::<u16>(),
        minor in any::<u16>(),
        power in any::<i8>(),
        rssi in -127i16..=20,
        with_flags in any::<bool>(),
    ) {
        let uuid = uuid::Uuid::from_bytes(uuid_bytes).hyphenated().to_string();
        let identity = BeaconIdentity::new(uuid.clone(), major, minor, power);
        let frame = encode(&identity).unwrap();

        let sighting = decode(&frame.to_scan_record(with_flags), rssi).unwrap();
        prop_assert_eq!(sighting.identity, identity);
        prop_assert_eq!(sighting.rssi, rssi);
    }

    #[test]
    fn test_decode_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = decode(&raw, -50);
    }
}
