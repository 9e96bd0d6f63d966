//! 0.7 adapter.
//!
//! Backends expose named methods; the adapter picks one by name and parameter
//! shape. Matching is score based: each sample segment takes its best score
//! against the gallery, the scores are averaged and compared to a threshold.
//! A `compositeMatch` override scores the whole sample set against the whole
//! gallery in one call instead.

use super::fusion::{average, best_score, meets_threshold, segments_of};
use super::{binding_for, commit, probe, BiometricProvider, Binding};
use crate::catalog::{SdkCatalog, SdkHandle};
use crate::config::{ParamBag, VendorParams};
use crate::error::ProviderError;
use crate::sdk::legacy::{
    find_method, CHECK_QUALITY, COMPOSITE_MATCH, EXTRACT_TEMPLATE, MATCH,
};
use crate::sdk::{LegacyArg, LegacyMethod, LegacySdk, LegacyValue, ParamShape};
use crate::types::{
    backend_flags, BiometricFunction, BiometricType, CapabilityKey, ContractVersion, Flags,
    METHOD_NAME_FLAG, THRESHOLD_FLAG,
};
use bir_core::Bir;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Match threshold when neither the call nor the configuration sets one.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 60.0;

const PER_SEGMENT_MATCH: [ParamShape; 3] =
    [ParamShape::Segment, ParamShape::Segments, ParamShape::Flags];
const COMPOSITE_MATCH_SHAPE: [ParamShape; 3] =
    [ParamShape::Segments, ParamShape::Segments, ParamShape::Flags];
const SINGLE_SEGMENT: [ParamShape; 2] = [ParamShape::Segment, ParamShape::Flags];

#[derive(Clone)]
pub(crate) struct LegacyBackend {
    sdk: Arc<dyn LegacySdk>,
    methods: Vec<LegacyMethod>,
}

#[derive(Default)]
pub struct LegacyProvider {
    bound: BTreeMap<BiometricType, Binding<LegacyBackend>>,
}

impl LegacyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn threshold(binding: &Binding<LegacyBackend>, flags: &Flags) -> f64 {
        flags
            .get(THRESHOLD_FLAG)
            .and_then(|t| t.trim().parse().ok())
            .or_else(|| binding.params.threshold())
            .unwrap_or(DEFAULT_MATCH_THRESHOLD)
    }

    /// Score of `sample` against `gallery` for one modality, `None` when the
    /// backend call failed or no usable method exists.
    fn match_score(
        &self,
        binding: &Binding<LegacyBackend>,
        sample: &[&Bir],
        gallery: &[&Bir],
        flags: &Flags,
    ) -> Option<f64> {
        let name = method_name(flags, MATCH);
        let forwarded = backend_flags(flags);
        let gallery: Vec<Bir> = gallery.iter().map(|b| (*b).clone()).collect();
        let backend = &binding.backend;

        if find_method(&backend.methods, name, &PER_SEGMENT_MATCH).is_some() {
            let mut per_segment = Vec::with_capacity(sample.len());
            for &seg in sample {
                let args = [
                    LegacyArg::Segment(seg),
                    LegacyArg::Segments(&gallery),
                    LegacyArg::Flags(&forwarded),
                ];
                match backend.sdk.invoke(name, &args) {
                    Ok(LegacyValue::Scores(scores)) => {
                        let scale: Vec<f64> = scores.iter().map(|s| s.scale_score).collect();
                        per_segment.push(best_score(&scale));
                    }
                    Ok(other) => {
                        warn!(vendor = %binding.vendor, method = %name, returned = ?other, "unexpected match result");
                        return None;
                    }
                    Err(e) => {
                        warn!(vendor = %binding.vendor, method = %name, error = %e, "match call failed");
                        return None;
                    }
                }
            }
            return Some(average(&per_segment));
        }

        if find_method(&backend.methods, name, &COMPOSITE_MATCH_SHAPE).is_some() {
            let sample: Vec<Bir> = sample.iter().map(|b| (*b).clone()).collect();
            let args = [
                LegacyArg::Segments(&sample),
                LegacyArg::Segments(&gallery),
                LegacyArg::Flags(&forwarded),
            ];
            return match backend.sdk.invoke(name, &args) {
                Ok(LegacyValue::Composite(score)) => Some(score.scale_score),
                Ok(other) => {
                    warn!(vendor = %binding.vendor, method = %name, returned = ?other, "unexpected composite result");
                    None
                }
                Err(e) => {
                    warn!(vendor = %binding.vendor, method = %name, error = %e, "composite match call failed");
                    None
                }
            };
        }

        warn!(vendor = %binding.vendor, method = %name, "backend does not advertise a usable match method");
        None
    }

    fn verdict(
        &self,
        binding: &Binding<LegacyBackend>,
        sample: &[&Bir],
        gallery: &[&Bir],
        flags: &Flags,
    ) -> bool {
        if sample.is_empty() || gallery.is_empty() {
            return false;
        }
        self.match_score(binding, sample, gallery, flags)
            .is_some_and(|score| meets_threshold(score, Self::threshold(binding, flags)))
    }

    fn quality_of(&self, seg: &Bir, flags: &Flags) -> Result<f64, ProviderError> {
        let Some(modality) = seg.primary_type() else {
            return Ok(0.0);
        };
        let binding = binding_for(&self.bound, modality, BiometricFunction::QualityCheck)?;
        let name = method_name(flags, CHECK_QUALITY);
        if find_method(&binding.backend.methods, name, &SINGLE_SEGMENT).is_none() {
            warn!(vendor = %binding.vendor, method = %name, "quality method not advertised");
            return Ok(0.0);
        }
        let forwarded = backend_flags(flags);
        let args = [LegacyArg::Segment(seg), LegacyArg::Flags(&forwarded)];
        Ok(match binding.backend.sdk.invoke(name, &args) {
            Ok(LegacyValue::Quality(score)) => score.scale_score,
            Ok(other) => {
                warn!(vendor = %binding.vendor, returned = ?other, "unexpected quality result");
                0.0
            }
            Err(e) => {
                warn!(vendor = %binding.vendor, modality = %modality, error = %e, "quality call failed");
                0.0
            }
        })
    }
}

fn method_name<'a>(flags: &'a Flags, default: &'a str) -> &'a str {
    flags
        .get(METHOD_NAME_FLAG)
        .map(String::as_str)
        .unwrap_or(default)
}

/// Functions implied by the advertised method set.
fn functions_of(methods: &[LegacyMethod]) -> Vec<BiometricFunction> {
    let mut functions = Vec::new();
    let has = |name: &str| methods.iter().any(|m| m.name == name);
    if has(CHECK_QUALITY) {
        functions.push(BiometricFunction::QualityCheck);
    }
    if has(MATCH) || has(COMPOSITE_MATCH) {
        functions.push(BiometricFunction::Match);
    }
    if has(EXTRACT_TEMPLATE) {
        functions.push(BiometricFunction::Extract);
    }
    functions
}

impl BiometricProvider for LegacyProvider {
    fn contract_version(&self) -> ContractVersion {
        ContractVersion::V0_7
    }

    fn name(&self) -> &str {
        "legacy-0.7"
    }

    fn init(
        &mut self,
        vendor: &str,
        params: &VendorParams,
        catalog: &SdkCatalog,
    ) -> Result<Vec<CapabilityKey>, ProviderError> {
        let staged = probe(
            ContractVersion::V0_7,
            &self.bound,
            vendor,
            params,
            |_modality, bag: &ParamBag| {
                let sdk = match catalog.resolve(bag)? {
                    SdkHandle::Legacy(sdk) => sdk,
                    other => {
                        return Err(ProviderError::config(format!(
                            "class {} implements contract {}, configured 0.7",
                            bag.classname().unwrap_or_default(),
                            other.contract_version()
                        )))
                    }
                };
                let methods = sdk.methods();
                let functions = functions_of(&methods);
                Ok((LegacyBackend { sdk, methods }, functions))
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
        let binding = binding_for(&self.bound, modality, BiometricFunction::Match)?;
        Ok(self.verdict(
            binding,
            &segments_of(sample, modality),
            &segments_of(gallery, modality),
            flags,
        ))
    }

    fn identify(
        &self,
        sample: &[Bir],
        gallery: &BTreeMap<String, Vec<Bir>>,
        modality: BiometricType,
        flags: &Flags,
    ) -> Result<BTreeMap<String, bool>, ProviderError> {
        let binding = binding_for(&self.bound, modality, BiometricFunction::Match)?;
        let sample = segments_of(sample, modality);
        Ok(gallery
            .iter()
            .map(|(key, record)| {
                let candidate = segments_of(record, modality);
                (key.clone(), self.verdict(binding, &sample, &candidate, flags))
            })
            .collect())
    }

    fn segment_quality(&self, samples: &[Bir], flags: &Flags) -> Result<Vec<f64>, ProviderError> {
        super::fusion::leaves(samples)
            .into_iter()
            .map(|seg| self.quality_of(seg, flags))
            .collect()
    }

    fn modality_quality(
        &self,
        samples: &[Bir],
        flags: &Flags,
    ) -> Result<BTreeMap<BiometricType, f64>, ProviderError> {
        let mut out = BTreeMap::new();
        for (modality, segs) in super::group_by_modality(samples) {
            let scores = segs
                .into_iter()
                .map(|seg| self.quality_of(seg, flags))
                .collect::<Result<Vec<_>, _>>()?;
            out.insert(modality, average(&scores));
        }
        Ok(out)
    }

    fn extract_template(&self, samples: &[Bir], flags: &Flags) -> Result<Vec<Bir>, ProviderError> {
        let forwarded = backend_flags(flags);
        let name = method_name(flags, EXTRACT_TEMPLATE);
        let mut templates = Vec::new();
        for seg in super::fusion::leaves(samples) {
            let Some(modality) = seg.primary_type() else {
                continue;
            };
            let binding = binding_for(&self.bound, modality, BiometricFunction::Extract)?;
            if find_method(&binding.backend.methods, name, &SINGLE_SEGMENT).is_none() {
                warn!(vendor = %binding.vendor, method = %name, "extraction method not advertised");
                return Ok(Vec::new());
            }
            let args = [LegacyArg::Segment(seg), LegacyArg::Flags(&forwarded)];
            match binding.backend.sdk.invoke(name, &args) {
                Ok(LegacyValue::Template(template)) => templates.push(template),
                Ok(other) => {
                    warn!(vendor = %binding.vendor, returned = ?other, "unexpected extraction result");
                    return Ok(Vec::new());
                }
                Err(e) => {
                    warn!(vendor = %binding.vendor, modality = %modality, error = %e, "template extraction failed");
                    return Ok(Vec::new());
                }
            }
        }
        Ok(templates)
    }
}
