//! CBEFF record tree.
//!
//! A [`BiometricRecord`] is the root container. It owns an ordered list of
//! [`Bir`] segments, each of which is either a leaf (BDB payload + [`BdbInfo`])
//! or a composite node carrying child segments. The tree is strict: every node
//! is exclusively owned by its parent.
//!
//! No codec annotations live here; XML and JSON mapping is done in `codec`.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// `Others` key flagging a leaf that intentionally carries no payload.
pub const EXCEPTION_KEY: &str = "EXCEPTION";

/// `Others` key holding the signed payload template with a `<bioValue>` placeholder.
pub const PAYLOAD_KEY: &str = "PAYLOAD";

// ── Enumerations ──

/// CBEFF single biometric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BiometricType {
    Scent,
    Dna,
    Ear,
    Face,
    Finger,
    Foot,
    Vein,
    HandGeometry,
    Iris,
    Retina,
    Voice,
    Gait,
    Keystroke,
    LipMovement,
    SignatureSign,
    ExceptionPhoto,
}

impl BiometricType {
    pub const ALL: [BiometricType; 16] = [
        BiometricType::Scent,
        BiometricType::Dna,
        BiometricType::Ear,
        BiometricType::Face,
        BiometricType::Finger,
        BiometricType::Foot,
        BiometricType::Vein,
        BiometricType::HandGeometry,
        BiometricType::Iris,
        BiometricType::Retina,
        BiometricType::Voice,
        BiometricType::Gait,
        BiometricType::Keystroke,
        BiometricType::LipMovement,
        BiometricType::SignatureSign,
        BiometricType::ExceptionPhoto,
    ];

    /// Spelling used inside CBEFF XML documents (`Finger`, `ExceptionPhoto`, ...).
    pub fn xml_value(&self) -> &'static str {
        match self {
            BiometricType::Scent => "Scent",
            BiometricType::Dna => "DNA",
            BiometricType::Ear => "Ear",
            BiometricType::Face => "Face",
            BiometricType::Finger => "Finger",
            BiometricType::Foot => "Foot",
            BiometricType::Vein => "Vein",
            BiometricType::HandGeometry => "HandGeometry",
            BiometricType::Iris => "Iris",
            BiometricType::Retina => "Retina",
            BiometricType::Voice => "Voice",
            BiometricType::Gait => "Gait",
            BiometricType::Keystroke => "Keystroke",
            BiometricType::LipMovement => "LipMovement",
            BiometricType::SignatureSign => "SignatureSign",
            BiometricType::ExceptionPhoto => "ExceptionPhoto",
        }
    }

    /// Upper-case spelling used in extraction lookup keys (`FINGER`, `EXCEPTION_PHOTO`).
    pub fn key_name(&self) -> &'static str {
        match self {
            BiometricType::Scent => "SCENT",
            BiometricType::Dna => "DNA",
            BiometricType::Ear => "EAR",
            BiometricType::Face => "FACE",
            BiometricType::Finger => "FINGER",
            BiometricType::Foot => "FOOT",
            BiometricType::Vein => "VEIN",
            BiometricType::HandGeometry => "HAND_GEOMETRY",
            BiometricType::Iris => "IRIS",
            BiometricType::Retina => "RETINA",
            BiometricType::Voice => "VOICE",
            BiometricType::Gait => "GAIT",
            BiometricType::Keystroke => "KEYSTROKE",
            BiometricType::LipMovement => "LIP_MOVEMENT",
            BiometricType::SignatureSign => "SIGNATURE_SIGN",
            BiometricType::ExceptionPhoto => "EXCEPTION_PHOTO",
        }
    }

    /// Parse either spelling, case-insensitively.
    pub fn from_value(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|t| {
            t.xml_value().eq_ignore_ascii_case(value) || t.key_name().eq_ignore_ascii_case(value)
        })
    }
}

impl fmt::Display for BiometricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.xml_value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessedLevel {
    Raw,
    Intermediate,
    Processed,
}

impl ProcessedLevel {
    pub fn xml_value(&self) -> &'static str {
        match self {
            ProcessedLevel::Raw => "Raw",
            ProcessedLevel::Intermediate => "Intermediate",
            ProcessedLevel::Processed => "Processed",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        [
            ProcessedLevel::Raw,
            ProcessedLevel::Intermediate,
            ProcessedLevel::Processed,
        ]
        .into_iter()
        .find(|l| l.xml_value().eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Verify,
    Identify,
    Enroll,
    EnrollVerify,
    EnrollIdentify,
    Audit,
}

impl Purpose {
    pub fn xml_value(&self) -> &'static str {
        match self {
            Purpose::Verify => "Verify",
            Purpose::Identify => "Identify",
            Purpose::Enroll => "Enroll",
            Purpose::EnrollVerify => "EnrollVerify",
            Purpose::EnrollIdentify => "EnrollIdentify",
            Purpose::Audit => "Audit",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        [
            Purpose::Verify,
            Purpose::Identify,
            Purpose::Enroll,
            Purpose::EnrollVerify,
            Purpose::EnrollIdentify,
            Purpose::Audit,
        ]
        .into_iter()
        .find(|p| p.xml_value().eq_ignore_ascii_case(value.trim()))
    }
}

// ── Metadata entities ──

/// Organization/type registry pair (format owner, algorithm, device, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistryIdInfo {
    pub organization: String,
    pub type_code: String,
}

impl RegistryIdInfo {
    pub fn new(organization: impl Into<String>, type_code: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            type_code: type_code.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionType {
    pub major: u32,
    pub minor: u32,
}

impl VersionType {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl Default for VersionType {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QualityType {
    pub algorithm: Option<RegistryIdInfo>,
    pub score: i64,
    pub calculation_failed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BirInfo {
    pub creator: Option<String>,
    pub index: Option<String>,
    pub payload: Option<Vec<u8>>,
    pub integrity: bool,
    pub creation_date: Option<DateTime<Utc>>,
    pub not_valid_before: Option<DateTime<Utc>>,
    pub not_valid_after: Option<DateTime<Utc>>,
}

/// Descriptive header of one biometric data block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BdbInfo {
    pub challenge_response: Option<Vec<u8>>,
    pub index: Option<String>,
    pub format: RegistryIdInfo,
    pub encryption: Option<bool>,
    pub creation_date: Option<DateTime<Utc>>,
    pub not_valid_before: Option<DateTime<Utc>>,
    pub not_valid_after: Option<DateTime<Utc>>,
    pub types: Vec<BiometricType>,
    pub subtypes: Vec<String>,
    pub level: Option<ProcessedLevel>,
    pub product: Option<RegistryIdInfo>,
    pub capture_device: Option<RegistryIdInfo>,
    pub feature_extraction_algorithm: Option<RegistryIdInfo>,
    pub comparison_algorithm: Option<RegistryIdInfo>,
    pub compression_algorithm: Option<RegistryIdInfo>,
    pub purpose: Option<Purpose>,
    pub quality: Option<QualityType>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SbInfo {
    pub format: Option<RegistryIdInfo>,
}

// ── Tree ──

/// One BIR node. A node with no children is a leaf.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bir {
    pub version: Option<VersionType>,
    pub cbeff_version: Option<VersionType>,
    pub bir_info: Option<BirInfo>,
    pub bdb_info: Option<BdbInfo>,
    pub bdb: Option<Vec<u8>>,
    pub sb: Option<Vec<u8>>,
    pub sb_info: Option<SbInfo>,
    pub birs: Vec<Bir>,
    pub others: BTreeMap<String, String>,
}

impl Bir {
    /// Leaf segment with a payload and its header.
    pub fn leaf(bdb_info: BdbInfo, bdb: Vec<u8>) -> Self {
        Self {
            bdb_info: Some(bdb_info),
            bdb: Some(bdb),
            ..Default::default()
        }
    }

    /// Composite segment grouping child segments.
    pub fn composite(birs: Vec<Bir>) -> Self {
        Self {
            birs,
            ..Default::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.birs.is_empty()
    }

    /// True when `Others[EXCEPTION] == "true"`.
    pub fn is_exception(&self) -> bool {
        self.others
            .get(EXCEPTION_KEY)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn has_payload(&self) -> bool {
        self.bdb.as_ref().is_some_and(|b| !b.is_empty())
    }

    pub fn types(&self) -> &[BiometricType] {
        self.bdb_info
            .as_ref()
            .map(|i| i.types.as_slice())
            .unwrap_or_default()
    }

    pub fn subtypes(&self) -> &[String] {
        self.bdb_info
            .as_ref()
            .map(|i| i.subtypes.as_slice())
            .unwrap_or_default()
    }

    pub fn has_type(&self, modality: BiometricType) -> bool {
        self.types().contains(&modality)
    }

    /// First declared type, used to route a segment to a modality.
    pub fn primary_type(&self) -> Option<BiometricType> {
        self.types().first().copied()
    }

    pub fn with_other(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.others.insert(key.into(), value.into());
        self
    }
}

/// Root of a CBEFF document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BiometricRecord {
    pub version: Option<VersionType>,
    pub cbeff_version: Option<VersionType>,
    pub bir_info: Option<BirInfo>,
    pub segments: Vec<Bir>,
    pub others: BTreeMap<String, String>,
}

impl BiometricRecord {
    /// Root with the container defaults: version 1.1, CBEFF 1.1, integrity off.
    pub fn new(segments: Vec<Bir>) -> Self {
        Self {
            version: Some(VersionType::default()),
            cbeff_version: Some(VersionType::default()),
            bir_info: Some(BirInfo::default()),
            segments,
            others: BTreeMap::new(),
        }
    }

    /// All leaves, depth-first in source order, paired with their path.
    pub fn leaves(&self) -> Vec<(SegmentPath, &Bir)> {
        let mut out = Vec::new();
        for (i, seg) in self.segments.iter().enumerate() {
            collect_leaves(seg, SegmentPath::root(i), &mut out);
        }
        out
    }
}

fn collect_leaves<'a>(bir: &'a Bir, path: SegmentPath, out: &mut Vec<(SegmentPath, &'a Bir)>) {
    if bir.is_leaf() {
        out.push((path, bir));
        return;
    }
    for (i, child) in bir.birs.iter().enumerate() {
        collect_leaves(child, path.child(i), out);
    }
}

/// Position of a node in the record tree: `segments[1].birs[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentPath(Vec<usize>);

impl SegmentPath {
    pub fn root(index: usize) -> Self {
        Self(vec![index])
    }

    pub fn child(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(index);
        Self(steps)
    }

    pub fn steps(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for SegmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (depth, idx) in self.0.iter().enumerate() {
            if depth == 0 {
                write!(f, "segments[{}]", idx)?;
            } else {
                write!(f, ".birs[{}]", idx)?;
            }
        }
        Ok(())
    }
}
