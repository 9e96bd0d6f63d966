//! End-to-end checks over a registration-style CBEFF document: parse, validate,
//! extract, re-encode.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bir_core::{
    create_xml, extract, extract_utf8, parse_xml, update_xml, validate, validate_xml, BdbInfo,
    Bir, BirError, BiometricType, JsonCodec, RecordCodec, RegistryIdInfo, XmlCodec,
};
use pretty_assertions::assert_eq;

const REGISTRATION: &[u8] = include_bytes!("fixtures/registration.xml");

#[test]
fn fixture_parses_and_validates() {
    let record = parse_xml(REGISTRATION).unwrap();
    assert_eq!(record.segments.len(), 4);
    assert!(validate(&record).is_ok());
    assert!(validate_xml(REGISTRATION, None).unwrap());

    let face = &record.segments[3];
    assert!(face.is_exception());
    assert!(!face.has_payload());
    assert_eq!(
        face.bdb_info
            .as_ref()
            .and_then(|i| i.quality.as_ref())
            .and_then(|q| q.calculation_failed.as_deref()),
        Some("no face detected")
    );
}

#[test]
fn fixture_extraction_views() {
    let record = parse_xml(REGISTRATION).unwrap();

    let all = extract(&record, None, None);
    let keys: Vec<&str> = all.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "FACE__8",
            "FINGER_Left IndexFinger_7",
            "FINGER_Right Thumb_7",
            "IRIS_Left_9"
        ]
    );
    assert_eq!(all["FINGER_Right Thumb_7"], URL_SAFE_NO_PAD.encode([5u8, 6, 7, 8]));
    assert_eq!(all["FACE__8"], "");

    assert_eq!(extract(&record, Some(BiometricType::Finger), None).len(), 2);
    assert_eq!(
        extract_utf8(&record, Some(BiometricType::Iris), None)["IRIS_Left_9"],
        "iris"
    );
}

#[test]
fn reencoded_fixture_is_equivalent() {
    let record = parse_xml(REGISTRATION).unwrap();

    let xml = XmlCodec.encode(&record).unwrap();
    assert_eq!(XmlCodec.decode(&xml).unwrap(), record);

    let json = JsonCodec::default().encode(&record).unwrap();
    assert_eq!(JsonCodec::default().decode(&json).unwrap(), record);
}

#[test]
fn update_rejects_invalid_segment_without_output() {
    let bad_iris = Bir::leaf(
        BdbInfo {
            format: RegistryIdInfo::new("Mosip", "7"),
            types: vec![BiometricType::Iris],
            subtypes: vec!["Right".into()],
            ..Default::default()
        },
        vec![1],
    );
    match update_xml(&[bad_iris], REGISTRATION) {
        Err(BirError::Structural(v)) => {
            assert_eq!(v.path.to_string(), "segments[4]");
            assert!(v.message.contains("format type invalid"));
        }
        other => panic!("expected structural failure, got {:?}", other.map(|b| b.len())),
    }
}

#[test]
fn created_document_validates() {
    let leaf = Bir::leaf(
        BdbInfo {
            format: RegistryIdInfo::new("Mosip", "9"),
            types: vec![BiometricType::Iris],
            subtypes: vec!["Right".into()],
            ..Default::default()
        },
        b"right-iris".to_vec(),
    );
    let bytes = create_xml(&[leaf]).unwrap();
    assert!(validate_xml(&bytes, None).unwrap());
}
