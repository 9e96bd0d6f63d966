//! Filtered extraction views over a record tree.
//!
//! | type | subtype | rows |
//! |------|---------|------|
//! | –    | –       | every leaf |
//! | X    | –       | leaves whose type list contains X, format type cross-checked |
//! | –    | Y       | leaves whose subtype list contains Y, no format check |
//! | X    | Y       | leaves matching both, format type cross-checked |
//!
//! Keys are `TYPE_subtypes_format`, built with a trailing creation timestamp
//! that is stripped before returning. Two leaves that differ only by capture
//! time therefore land on the same key and the later one in source order wins.

use crate::model::{Bir, BiometricRecord, BiometricType};
use crate::validate::format_type_allowed;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::collections::{BTreeMap, BTreeSet};

const KEY_SEPARATOR: &str = "_";

/// Extract leaf payloads as URL-safe base64 (no padding), keyed by lookup key.
pub fn extract(
    record: &BiometricRecord,
    biometric_type: Option<BiometricType>,
    subtype: Option<&str>,
) -> BTreeMap<String, String> {
    build_view(record, biometric_type, subtype, KeyLayout::TypeFirst, |bdb| {
        URL_SAFE_NO_PAD.encode(bdb)
    })
}

/// Extract leaf payloads decoded as UTF-8 text.
///
/// Same filter algebra as [`extract`], except that a subtype-only query keys
/// rows as `subtypes_TYPE_format`.
pub fn extract_utf8(
    record: &BiometricRecord,
    biometric_type: Option<BiometricType>,
    subtype: Option<&str>,
) -> BTreeMap<String, String> {
    build_view(
        record,
        biometric_type,
        subtype,
        KeyLayout::SubtypeFirstWhenSubtypeOnly,
        |bdb| String::from_utf8_lossy(bdb).into_owned(),
    )
}

/// Leaves matching the filter, in source order.
pub fn filter_segments<'a>(
    record: &'a BiometricRecord,
    biometric_type: Option<BiometricType>,
    subtype: Option<&str>,
) -> Vec<&'a Bir> {
    record
        .leaves()
        .into_iter()
        .map(|(_, bir)| bir)
        .filter(|bir| matches_filter(bir, biometric_type, subtype))
        .collect()
}

/// Every biometric type declared by any leaf.
pub fn biometric_types(record: &BiometricRecord) -> BTreeSet<BiometricType> {
    record
        .leaves()
        .into_iter()
        .flat_map(|(_, bir)| bir.types().iter().copied())
        .collect()
}

#[derive(Clone, Copy)]
enum KeyLayout {
    TypeFirst,
    SubtypeFirstWhenSubtypeOnly,
}

fn build_view(
    record: &BiometricRecord,
    biometric_type: Option<BiometricType>,
    subtype: Option<&str>,
    layout: KeyLayout,
    encode: impl Fn(&[u8]) -> String,
) -> BTreeMap<String, String> {
    let mut rows: Vec<(String, String)> = Vec::new();

    for (_, bir) in record.leaves() {
        if !matches_filter(bir, biometric_type, subtype) {
            continue;
        }
        let Some(info) = &bir.bdb_info else {
            continue;
        };
        let format = format_code(&info.format.type_code);
        let timestamp = info
            .creation_date
            .map(|d| d.timestamp_millis())
            .unwrap_or_default();

        // The type segment is the queried type when one was given, otherwise
        // the leaf's first declared type.
        let type_segment = biometric_type
            .or_else(|| info.types.first().copied())
            .map(|t| t.key_name())
            .unwrap_or_default();

        let timestamp = timestamp.to_string();
        let subtypes = info.subtypes.join(" ");
        let full_key = match (biometric_type, subtype, layout) {
            (None, Some(_), KeyLayout::SubtypeFirstWhenSubtypeOnly) => join_key(&[
                subtypes.as_str(),
                type_segment,
                format.as_str(),
                timestamp.as_str(),
            ]),
            _ => join_key(&[
                type_segment,
                subtypes.as_str(),
                format.as_str(),
                timestamp.as_str(),
            ]),
        };

        let payload = bir.bdb.as_deref().unwrap_or_default();
        rows.push((full_key, encode(payload)));
    }

    let mut view = BTreeMap::new();
    for (key, value) in rows {
        view.insert(strip_timestamp(&key).to_string(), value);
    }
    view
}

fn matches_filter(bir: &Bir, biometric_type: Option<BiometricType>, subtype: Option<&str>) -> bool {
    let Some(info) = &bir.bdb_info else {
        return false;
    };
    if let Some(t) = biometric_type {
        if !info.types.contains(&t) || !format_type_allowed(t, &info.format.type_code) {
            return false;
        }
    }
    if let Some(sub) = subtype {
        if !info.subtypes.iter().any(|s| s == sub) {
            return false;
        }
    }
    true
}

/// Numeric rendering of the format type; non-numeric codes pass through trimmed.
fn format_code(type_code: &str) -> String {
    let trimmed = type_code.trim();
    trimmed
        .parse::<u64>()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| trimmed.to_string())
}

fn join_key(parts: &[&str]) -> String {
    parts.join(KEY_SEPARATOR)
}

fn strip_timestamp(key: &str) -> &str {
    key.rsplit_once(KEY_SEPARATOR).map(|(head, _)| head).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BdbInfo, RegistryIdInfo};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn leaf(t: BiometricType, format: &str, subtypes: &[&str], bdb: &[u8], ts: i64) -> Bir {
        Bir::leaf(
            BdbInfo {
                format: RegistryIdInfo::new("Mosip", format),
                types: vec![t],
                subtypes: subtypes.iter().map(|s| s.to_string()).collect(),
                creation_date: Utc.timestamp_millis_opt(ts).single(),
                ..Default::default()
            },
            bdb.to_vec(),
        )
    }

    fn sample() -> BiometricRecord {
        BiometricRecord::new(vec![
            leaf(BiometricType::Finger, "7", &["Left", "IndexFinger"], b"li", 1_000),
            leaf(BiometricType::Finger, "7", &["Right", "Thumb"], b"rt", 2_000),
            leaf(BiometricType::Iris, "9", &["Left"], b"il", 3_000),
            Bir::composite(vec![leaf(BiometricType::Face, "8", &[], b"fc", 4_000)]),
        ])
    }

    #[test]
    fn unfiltered_yields_one_row_per_leaf() {
        let view = extract(&sample(), None, None);
        assert_eq!(view.len(), 4);
        assert_eq!(
            view.get("FINGER_Left IndexFinger_7").map(String::as_str),
            Some(URL_SAFE_NO_PAD.encode(b"li").as_str())
        );
        assert!(view.contains_key("IRIS_Left_9"));
        assert!(view.contains_key("FACE__8"));
    }

    #[test]
    fn type_filter_keeps_only_that_type() {
        let view = extract(&sample(), Some(BiometricType::Finger), None);
        assert_eq!(view.len(), 2);
        assert!(view.keys().all(|k| k.starts_with("FINGER_")));
    }

    #[test]
    fn type_filter_cross_checks_format() {
        let record = BiometricRecord::new(vec![
            leaf(BiometricType::Finger, "7", &["Left", "Thumb"], b"ok", 1),
            leaf(BiometricType::Finger, "9", &["Right", "Thumb"], b"bad", 2),
        ]);
        let view = extract(&record, Some(BiometricType::Finger), None);
        assert_eq!(view.len(), 1);
        assert!(view.contains_key("FINGER_Left Thumb_7"));
    }

    #[test]
    fn subtype_only_skips_format_check() {
        let record = BiometricRecord::new(vec![
            leaf(BiometricType::Finger, "9", &["Left", "Thumb"], b"x", 1),
            leaf(BiometricType::Iris, "9", &["Left"], b"y", 2),
        ]);
        let view = extract(&record, None, Some("Left"));
        assert_eq!(view.len(), 2);
        assert!(view.contains_key("FINGER_Left Thumb_9"));
        assert!(view.contains_key("IRIS_Left_9"));
    }

    #[test]
    fn type_and_subtype_must_both_match() {
        let view = extract(&sample(), Some(BiometricType::Finger), Some("Thumb"));
        assert_eq!(view.len(), 1);
        assert_eq!(
            view.get("FINGER_Right Thumb_7").map(String::as_str),
            Some(URL_SAFE_NO_PAD.encode(b"rt").as_str())
        );
    }

    #[test]
    fn shared_subtype_keeps_leaves_apart() {
        let record = BiometricRecord::new(vec![
            leaf(BiometricType::Finger, "7", &["Left", "Thumb"], b"lt", 1),
            leaf(BiometricType::Finger, "7", &["Right", "Thumb"], b"rt", 2),
        ]);

        let typed = extract(&record, Some(BiometricType::Finger), Some("Thumb"));
        assert_eq!(
            typed.keys().cloned().collect::<Vec<_>>(),
            vec!["FINGER_Left Thumb_7".to_string(), "FINGER_Right Thumb_7".to_string()]
        );
        assert_eq!(typed["FINGER_Left Thumb_7"], URL_SAFE_NO_PAD.encode(b"lt"));

        let untyped = extract(&record, None, Some("Thumb"));
        assert_eq!(untyped.len(), 2);

        let text = extract_utf8(&record, None, Some("Thumb"));
        assert_eq!(text["Left Thumb_FINGER_7"], "lt");
        assert_eq!(text["Right Thumb_FINGER_7"], "rt");
    }

    #[test]
    fn same_key_different_timestamp_collapses_to_later_leaf() {
        let record = BiometricRecord::new(vec![
            leaf(BiometricType::Iris, "9", &["Right"], b"first", 10),
            leaf(BiometricType::Iris, "9", &["Right"], b"second", 20),
        ]);
        let view = extract(&record, None, None);
        assert_eq!(view.len(), 1);
        assert_eq!(
            view["IRIS_Right_9"],
            URL_SAFE_NO_PAD.encode(b"second")
        );
    }

    #[test]
    fn utf8_view_puts_subtype_first_for_subtype_only() {
        let view = extract_utf8(&sample(), None, Some("Left"));
        let keys: Vec<_> = view.keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["Left IndexFinger_FINGER_7".to_string(), "Left_IRIS_9".to_string()]
        );
        assert_eq!(view["Left_IRIS_9"], "il");
    }

    #[test]
    fn utf8_view_type_branch_matches_base64_keys() {
        let b64 = extract(&sample(), Some(BiometricType::Iris), None);
        let text = extract_utf8(&sample(), Some(BiometricType::Iris), None);
        assert_eq!(
            b64.keys().collect::<Vec<_>>(),
            text.keys().collect::<Vec<_>>()
        );
        assert_eq!(text["IRIS_Left_9"], "il");
    }

    #[test]
    fn filter_segments_and_types() {
        let record = sample();
        assert_eq!(filter_segments(&record, None, None).len(), 4);
        assert_eq!(
            filter_segments(&record, Some(BiometricType::Face), None).len(),
            1
        );
        let types: Vec<_> = biometric_types(&record).into_iter().collect();
        assert_eq!(
            types,
            vec![BiometricType::Face, BiometricType::Finger, BiometricType::Iris]
        );
    }

    #[test]
    fn strip_timestamp_drops_last_segment_only() {
        assert_eq!(strip_timestamp("FINGER_Left Thumb_7_1234"), "FINGER_Left Thumb_7");
        assert_eq!(strip_timestamp("nounderscore"), "nounderscore");
    }
}
