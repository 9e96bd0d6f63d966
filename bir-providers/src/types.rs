use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use bir_core::BiometricType;

/// Modality buckets a deployment can configure vendors for.
pub const CONFIGURABLE_MODALITIES: [BiometricType; 3] = [
    BiometricType::Finger,
    BiometricType::Iris,
    BiometricType::Face,
];

/// Open key/value bag forwarded to backends.
pub type Flags = BTreeMap<String, String>;

/// Adapter-local flag naming the backend method to call instead of the default.
pub const METHOD_NAME_FLAG: &str = "method.name";
/// Adapter-local flag overriding the configured match threshold for one call.
pub const THRESHOLD_FLAG: &str = "threshold";

/// Flags with the adapter-local routing keys removed.
pub fn backend_flags(flags: &Flags) -> Flags {
    flags
        .iter()
        .filter(|(k, _)| k.as_str() != METHOD_NAME_FLAG && k.as_str() != THRESHOLD_FLAG)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BiometricFunction {
    Match,
    QualityCheck,
    Extract,
    ConvertFormat,
    Segment,
}

impl fmt::Display for BiometricFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BiometricFunction::Match => "MATCH",
            BiometricFunction::QualityCheck => "QUALITY_CHECK",
            BiometricFunction::Extract => "EXTRACT",
            BiometricFunction::ConvertFormat => "CONVERT_FORMAT",
            BiometricFunction::Segment => "SEGMENT",
        };
        f.write_str(s)
    }
}

/// Registry key: one (modality, function) capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CapabilityKey {
    pub modality: BiometricType,
    pub function: BiometricFunction,
}

impl CapabilityKey {
    pub fn new(modality: BiometricType, function: BiometricFunction) -> Self {
        Self { modality, function }
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.modality.key_name(), self.function)
    }
}

/// Historical SDK calling contract a backend implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContractVersion {
    /// Loosely typed methods discovered by name and parameter shape.
    V0_7,
    /// Fixed interface returning status + payload envelopes.
    V0_8,
    /// Canonical typed interface with per-modality decisions.
    V0_9,
}

impl ContractVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractVersion::V0_7 => "0.7",
            ContractVersion::V0_8 => "0.8",
            ContractVersion::V0_9 => "0.9",
        }
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0.7" => Ok(ContractVersion::V0_7),
            "0.8" => Ok(ContractVersion::V0_8),
            "0.9" => Ok(ContractVersion::V0_9),
            other => Err(format!("unknown SDK contract version '{}'", other)),
        }
    }
}

/// AUTH = 1:1 verification, DEDUPE = 1:N identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    Auth,
    Dedupe,
}

/// Backend verdict for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Matched,
    NotMatched,
    Error,
}

impl Decision {
    pub fn is_match(&self) -> bool {
        matches!(self, Decision::Matched)
    }
}
