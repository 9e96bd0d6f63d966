//! 0.9 contract: the canonical typed interface.

use super::{QualityCheck, Response, SdkInfo};
use crate::types::{BiometricType, Decision, Flags};
use anyhow::Result;
use bir_core::BiometricRecord;
use std::collections::BTreeMap;

/// Per-modality decisions for one gallery record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDecision {
    pub gallery_index: usize,
    pub decisions: BTreeMap<BiometricType, Decision>,
}

impl MatchDecision {
    pub fn matched(&self, modality: BiometricType) -> bool {
        self.decisions.get(&modality).is_some_and(Decision::is_match)
    }
}

pub trait BiometricSdk: Send + Sync {
    /// Contract version the backend implements, e.g. `"0.9"`.
    fn api_version(&self) -> String;

    fn init(&self, params: &BTreeMap<String, String>) -> Result<SdkInfo>;

    fn check_quality(
        &self,
        sample: &BiometricRecord,
        modalities: &[BiometricType],
        flags: &Flags,
    ) -> Result<Response<QualityCheck>>;

    fn match_records(
        &self,
        sample: &BiometricRecord,
        gallery: &[BiometricRecord],
        modalities: &[BiometricType],
        flags: &Flags,
    ) -> Result<Response<Vec<MatchDecision>>>;

    fn extract_template(
        &self,
        sample: &BiometricRecord,
        modalities: &[BiometricType],
        flags: &Flags,
    ) -> Result<Response<BiometricRecord>>;
}
