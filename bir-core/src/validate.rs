use crate::error::{BirError, Violation, ViolationRule};
use crate::model::{Bir, BiometricRecord, BiometricType, SegmentPath};

/// ISO/IEC 19794 format type codes accepted per biometric type.
pub const FORMAT_TYPE_FINGER: u32 = 7;
pub const FORMAT_TYPE_FINGER_MINUTIAE: u32 = 2;
pub const FORMAT_TYPE_FACE: u32 = 8;
pub const FORMAT_TYPE_IRIS: u32 = 9;

/// Whether a declared format type code is allowed for a biometric type.
///
/// Finger accepts plain image and minutiae, iris accepts iris, face and
/// exception photo accept face. Every other pairing is rejected, as is a
/// code that is not a plain integer.
pub fn format_type_allowed(biometric_type: BiometricType, format_type: &str) -> bool {
    let Ok(code) = format_type.trim().parse::<u32>() else {
        return false;
    };
    match biometric_type {
        BiometricType::Finger => code == FORMAT_TYPE_FINGER || code == FORMAT_TYPE_FINGER_MINUTIAE,
        BiometricType::Iris => code == FORMAT_TYPE_IRIS,
        BiometricType::Face | BiometricType::ExceptionPhoto => code == FORMAT_TYPE_FACE,
        _ => false,
    }
}

/// Validate the record tree, stopping at the first violation in depth-first
/// source order. The error names the offending segment.
pub fn validate(record: &BiometricRecord) -> Result<(), BirError> {
    let mut found = None;
    walk(record, &mut |v| {
        found = Some(v);
        false
    });
    match found {
        Some(v) => Err(BirError::Structural(v)),
        None => Ok(()),
    }
}

/// Validate the record tree. Returns all violations found.
pub fn collect_violations(record: &BiometricRecord) -> Vec<Violation> {
    let mut violations = Vec::new();
    walk(record, &mut |v| {
        violations.push(v);
        true
    });
    violations
}

/// Visits every violation; stops when `sink` returns false.
fn walk(record: &BiometricRecord, sink: &mut dyn FnMut(Violation) -> bool) {
    for (i, seg) in record.segments.iter().enumerate() {
        if !check_node(seg, SegmentPath::root(i), sink) {
            return;
        }
    }
}

fn check_node(bir: &Bir, path: SegmentPath, sink: &mut dyn FnMut(Violation) -> bool) -> bool {
    if !bir.is_leaf() {
        if bir.has_payload() {
            let keep_going = sink(Violation {
                rule: ViolationRule::MixedNode,
                path: path.clone(),
                message: "composite segment must not carry a BDB".to_string(),
            });
            if !keep_going {
                return false;
            }
        }
        for (i, child) in bir.birs.iter().enumerate() {
            if !check_node(child, path.child(i), sink) {
                return false;
            }
        }
        return true;
    }

    for v in leaf_violations(bir, &path) {
        if !sink(v) {
            return false;
        }
    }
    true
}

fn leaf_violations(bir: &Bir, path: &SegmentPath) -> Vec<Violation> {
    let violation = |rule: ViolationRule, message: String| Violation {
        rule,
        path: path.clone(),
        message,
    };

    let Some(info) = &bir.bdb_info else {
        return vec![violation(
            ViolationRule::MissingBdbInfo,
            "BDBInfo is missing".to_string(),
        )];
    };

    let mut out = Vec::new();

    if !bir.has_payload() && !bir.is_exception() {
        out.push(violation(
            ViolationRule::EmptyBdb,
            "BDB is empty and the segment is not flagged as an exception".to_string(),
        ));
    }

    match info.types.first() {
        None => out.push(violation(
            ViolationRule::EmptyType,
            "BDBInfo type list is empty".to_string(),
        )),
        Some(declared) => {
            if !format_type_allowed(*declared, &info.format.type_code) {
                out.push(violation(
                    ViolationRule::InvalidFormatType,
                    format!(
                        "format type invalid: {} for {}",
                        info.format.type_code, declared
                    ),
                ));
            }
        }
    }

    out
}
