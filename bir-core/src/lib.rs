//! CBEFF biometric information records
//!
//! ```text
//! XML / JSON bytes
//!       │  codec::{XmlCodec, JsonCodec}
//!       ▼
//! BiometricRecord ── segments: Vec<Bir> (leaf = BDB + BDBInfo, composite = birs)
//!       │
//!       ├── validate      structural rules, first violation with its path
//!       ├── query         filtered extraction views keyed TYPE_subtypes_format
//!       └── signature     detached JWS reconstruction + x5c chain check
//! ```
//!
//! The binary ISO/IEC 19794 payload inside a BDB is opaque to this crate.

pub mod codec;
pub mod error;
pub mod model;
pub mod query;
pub mod signature;
pub mod validate;

pub use codec::{
    create_xml, parse_xml, update_xml, validate_xml, JsonCodec, RecordCodec, SchemaValidator,
    XmlCodec,
};
pub use error::{BirError, SignatureError, Violation, ViolationRule};
pub use model::{
    BdbInfo, Bir, BirInfo, BiometricRecord, BiometricType, ProcessedLevel, Purpose, QualityType,
    RegistryIdInfo, SbInfo, SegmentPath, VersionType, EXCEPTION_KEY, PAYLOAD_KEY,
};
pub use query::{biometric_types, extract, extract_utf8, filter_segments};
pub use signature::{reconstruct_token, validate_signature, verify_certificate_chain};
pub use validate::{collect_violations, format_type_allowed, validate};
