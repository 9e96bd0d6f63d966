//! 0.9 adapter.
//!
//! Same fusion rules as 0.8. Decisions are read per modality from the
//! backend's decision map, flags are forwarded untouched, and the backend's
//! self-reported API version is checked against configuration before every
//! call. Drift is a hard failure.

use super::fusion::{fuse_columns, segments_of};
use super::{
    binding_for, commit, decision_row, group_by_modality, probe, record_of, BiometricProvider,
    Binding,
};
use crate::catalog::{SdkCatalog, SdkHandle};
use crate::config::{ParamBag, VendorParams};
use crate::error::ProviderError;
use crate::sdk::BiometricSdk;
use crate::types::{
    BiometricFunction, BiometricType, CapabilityKey, ContractVersion, Flags, MatchPolicy,
};
use bir_core::{Bir, BiometricRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

type CanonicalBinding = Binding<Arc<dyn BiometricSdk>>;

#[derive(Default)]
pub struct CanonicalProvider {
    bound: BTreeMap<BiometricType, CanonicalBinding>,
}

fn check_version(configured: &str, sdk: &dyn BiometricSdk) -> Result<(), ProviderError> {
    let reported = sdk.api_version();
    if reported.trim() == configured {
        Ok(())
    } else {
        Err(ProviderError::VersionMismatch {
            configured: configured.to_string(),
            reported,
        })
    }
}

impl CanonicalProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding for the call, after re-checking the backend's API version.
    fn checked(
        &self,
        modality: BiometricType,
        function: BiometricFunction,
    ) -> Result<&CanonicalBinding, ProviderError> {
        let binding = binding_for(&self.bound, modality, function)?;
        let configured = binding.params.version().unwrap_or_default();
        check_version(configured, binding.backend.as_ref())?;
        Ok(binding)
    }

    fn match_rows(
        binding: &CanonicalBinding,
        sample: &[&Bir],
        gallery: &[BiometricRecord],
        modality: BiometricType,
        flags: &Flags,
    ) -> Vec<Vec<bool>> {
        sample
            .iter()
            .map(|seg| {
                let single = record_of(&[*seg]);
                match binding
                    .backend
                    .match_records(&single, gallery, &[modality], flags)
                {
                    Ok(resp) => match resp.into_payload() {
                        Some(decisions) => decision_row(
                            gallery.len(),
                            decisions
                                .iter()
                                .map(|d| (d.gallery_index, d.matched(modality))),
                        ),
                        None => {
                            debug!(vendor = %binding.vendor, "match response carried no payload");
                            vec![false; gallery.len()]
                        }
                    },
                    Err(e) => {
                        warn!(vendor = %binding.vendor, modality = %modality, error = %e, "match call failed");
                        vec![false; gallery.len()]
                    }
                }
            })
            .collect()
    }

    fn quality(
        &self,
        segments: &[&Bir],
        modality: BiometricType,
        flags: &Flags,
    ) -> Result<f64, ProviderError> {
        let binding = self.checked(modality, BiometricFunction::QualityCheck)?;
        let sample = record_of(segments);
        let score = match binding.backend.check_quality(&sample, &[modality], flags) {
            Ok(resp) => resp
                .into_payload()
                .and_then(|q| q.scores.get(&modality).map(|s| s.score))
                .unwrap_or(0.0),
            Err(e) => {
                warn!(vendor = %binding.vendor, modality = %modality, error = %e, "quality call failed");
                0.0
            }
        };
        Ok(score)
    }
}

impl BiometricProvider for CanonicalProvider {
    fn contract_version(&self) -> ContractVersion {
        ContractVersion::V0_9
    }

    fn name(&self) -> &str {
        "canonical-0.9"
    }

    fn init(
        &mut self,
        vendor: &str,
        params: &VendorParams,
        catalog: &SdkCatalog,
    ) -> Result<Vec<CapabilityKey>, ProviderError> {
        let staged = probe(
            ContractVersion::V0_9,
            &self.bound,
            vendor,
            params,
            |modality, bag: &ParamBag| {
                let sdk = match catalog.resolve(bag)? {
                    SdkHandle::Canonical(sdk) => sdk,
                    other => {
                        return Err(ProviderError::config(format!(
                            "class {} implements contract {}, configured 0.9",
                            bag.classname().unwrap_or_default(),
                            other.contract_version()
                        )))
                    }
                };
                check_version(bag.version().unwrap_or_default(), sdk.as_ref())?;
                let info = sdk.init(bag.as_map()).map_err(|e| {
                    ProviderError::config(format!("{} init failed: {:#}", vendor, e))
                })?;
                Ok((sdk, info.functions_for(modality)))
            },
        )?;
        Ok(commit(&mut self.bound, staged))
    }

    fn verify(
        &self,
        sample: &[Bir],
        gallery: &[Bir],
        modality: BiometricType,
        flags: &Flags,
    ) -> Result<bool, ProviderError> {
        let binding = self.checked(modality, BiometricFunction::Match)?;
        let candidate = segments_of(gallery, modality);
        if candidate.is_empty() {
            return Ok(false);
        }
        let gallery = [record_of(&candidate)];
        let rows = Self::match_rows(
            binding,
            &segments_of(sample, modality),
            &gallery,
            modality,
            flags,
        );
        Ok(fuse_columns(MatchPolicy::Auth, &rows, 1)[0])
    }

    fn identify(
        &self,
        sample: &[Bir],
        gallery: &BTreeMap<String, Vec<Bir>>,
        modality: BiometricType,
        flags: &Flags,
    ) -> Result<BTreeMap<String, bool>, ProviderError> {
        let binding = self.checked(modality, BiometricFunction::Match)?;
        let records: Vec<BiometricRecord> = gallery
            .values()
            .map(|segs| record_of(&segments_of(segs, modality)))
            .collect();
        let rows = Self::match_rows(
            binding,
            &segments_of(sample, modality),
            &records,
            modality,
            flags,
        );
        let verdicts = fuse_columns(MatchPolicy::Dedupe, &rows, records.len());
        Ok(gallery.keys().cloned().zip(verdicts).collect())
    }

    fn segment_quality(&self, samples: &[Bir], flags: &Flags) -> Result<Vec<f64>, ProviderError> {
        super::fusion::leaves(samples)
            .into_iter()
            .map(|seg| match seg.primary_type() {
                Some(modality) => self.quality(&[seg], modality, flags),
                None => Ok(0.0),
            })
            .collect()
    }

    fn modality_quality(
        &self,
        samples: &[Bir],
        flags: &Flags,
    ) -> Result<BTreeMap<BiometricType, f64>, ProviderError> {
        group_by_modality(samples)
            .into_iter()
            .map(|(modality, segs)| {
                self.quality(&segs, modality, flags)
                    .map(|score| (modality, score))
            })
            .collect()
    }

    fn extract_template(&self, samples: &[Bir], flags: &Flags) -> Result<Vec<Bir>, ProviderError> {
        let mut templates = Vec::new();
        for (modality, segs) in group_by_modality(samples) {
            let binding = self.checked(modality, BiometricFunction::Extract)?;
            let sample = record_of(&segs);
            let extracted = match binding.backend.extract_template(&sample, &[modality], flags) {
                Ok(resp) => resp.into_payload(),
                Err(e) => {
                    warn!(vendor = %binding.vendor, modality = %modality, error = %e, "template extraction failed");
                    None
                }
            };
            match extracted {
                Some(record) => templates.extend(record.segments),
                None => return Ok(Vec::new()),
            }
        }
        Ok(templates)
    }
}
