//! 0.8 contract.

use super::{QualityCheck, Response, SdkInfo};
use crate::types::{BiometricType, Decision, Flags};
use anyhow::Result;
use bir_core::BiometricRecord;
use std::collections::BTreeMap;

/// Decision for one gallery record, positionally indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatMatch {
    pub gallery_index: usize,
    pub decision: Decision,
}

pub trait EnvelopeSdk: Send + Sync {
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
    ) -> Result<Response<Vec<FlatMatch>>>;

    fn extract_template(
        &self,
        sample: &BiometricRecord,
        modalities: &[BiometricType],
        flags: &Flags,
    ) -> Result<Response<BiometricRecord>>;
}
