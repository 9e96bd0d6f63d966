//! Container codecs.
//!
//! The record model carries no format annotations. Each wire format is an
//! independent [`RecordCodec`]; the XML boundary functions below add the
//! validate-before-write contract on top of [`XmlCodec`].

pub mod json;
pub mod xml;

pub use json::JsonCodec;
pub use xml::CBEFF_NAMESPACE;

use crate::error::BirError;
use crate::model::{Bir, BiometricRecord};
use crate::validate::validate;

/// Serialize / deserialize a whole record tree.
pub trait RecordCodec {
    fn encode(&self, record: &BiometricRecord) -> Result<Vec<u8>, BirError>;
    fn decode(&self, bytes: &[u8]) -> Result<BiometricRecord, BirError>;
}

/// External XSD tooling. Implementations report failures as [`BirError::Schema`].
pub trait SchemaValidator {
    fn validate(&self, document: &[u8], schema: &[u8]) -> Result<(), BirError>;
}

/// CBEFF XML (ISO/IEC 19785-3).
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec;

impl RecordCodec for XmlCodec {
    fn encode(&self, record: &BiometricRecord) -> Result<Vec<u8>, BirError> {
        xml::write_record(record)
    }

    fn decode(&self, bytes: &[u8]) -> Result<BiometricRecord, BirError> {
        xml::read_record(bytes)
    }
}

// ── XML boundary ──

/// Wrap `segments` in a default root, validate, then encode.
pub fn create_xml(segments: &[Bir]) -> Result<Vec<u8>, BirError> {
    let record = BiometricRecord::new(segments.to_vec());
    validate(&record)?;
    let bytes = XmlCodec.encode(&record)?;
    tracing::debug!(segments = segments.len(), bytes = bytes.len(), "created CBEFF document");
    Ok(bytes)
}

/// Append `segments` to an existing document, validate the result, re-encode.
pub fn update_xml(segments: &[Bir], existing: &[u8]) -> Result<Vec<u8>, BirError> {
    let mut record = XmlCodec.decode(existing)?;
    let before = record.segments.len();
    record.segments.extend_from_slice(segments);
    validate(&record)?;
    let bytes = XmlCodec.encode(&record)?;
    tracing::debug!(
        existing = before,
        appended = segments.len(),
        "updated CBEFF document"
    );
    Ok(bytes)
}

pub fn parse_xml(bytes: &[u8]) -> Result<BiometricRecord, BirError> {
    XmlCodec.decode(bytes)
}

/// Check a document: well-formed, decodable, structurally valid, and if a
/// schema is supplied, accepted by the schema validator.
pub fn validate_xml(
    bytes: &[u8],
    schema: Option<(&dyn SchemaValidator, &[u8])>,
) -> Result<bool, BirError> {
    if let Some((validator, xsd)) = schema {
        validator.validate(bytes, xsd)?;
    }
    let record = parse_xml(bytes)?;
    validate(&record)?;
    Ok(true)
}
