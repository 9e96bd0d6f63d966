use crate::model::SegmentPath;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BirError {
    #[error("structural validation failed: {0}")]
    Structural(Violation),

    #[error("signature validation failed: {0}")]
    Signature(#[from] SignatureError),

    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid encoding: {0}")]
    Encoding(String),

    #[error("schema validation failed: {0}")]
    Schema(String),
}

impl From<quick_xml::Error> for BirError {
    fn from(e: quick_xml::Error) -> Self {
        BirError::Xml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for BirError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        BirError::Xml(e.to_string())
    }
}

impl From<std::fmt::Error> for BirError {
    fn from(e: std::fmt::Error) -> Self {
        BirError::Xml(format!("write failed: {}", e))
    }
}

impl From<base64::DecodeError> for BirError {
    fn from(e: base64::DecodeError) -> Self {
        BirError::Encoding(e.to_string())
    }
}

/// Which structural rule a segment broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationRule {
    MissingBdbInfo,
    EmptyBdb,
    EmptyType,
    InvalidFormatType,
    MixedNode,
}

impl ViolationRule {
    pub fn code(&self) -> &'static str {
        match self {
            ViolationRule::MissingBdbInfo => "missing-bdb-info",
            ViolationRule::EmptyBdb => "empty-bdb",
            ViolationRule::EmptyType => "empty-type",
            ViolationRule::InvalidFormatType => "invalid-format-type",
            ViolationRule::MixedNode => "mixed-node",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub rule: ViolationRule,
    pub path: SegmentPath,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.rule.code(), self.path, self.message)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("segment carries no Others entries")]
    MissingOthers,

    #[error("Others has no PAYLOAD entry")]
    MissingPayload,

    #[error("segment carries no signature block")]
    MissingSignatureBlock,

    #[error("malformed signature envelope: {0}")]
    MalformedEnvelope(String),

    #[error("malformed signed payload: {0}")]
    MalformedPayload(String),

    #[error("signed payload has no digitalId")]
    MissingDigitalId,

    #[error("token header has no x5c certificate chain")]
    MissingCertificateChain,

    #[error("digitalId certificate chain is not contained in the signature certificate chain")]
    CertificateMismatch,
}
