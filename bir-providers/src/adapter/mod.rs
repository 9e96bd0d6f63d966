//! Version adapters: one uniform provider surface over three SDK contracts.

pub mod canonical;
pub mod envelope;
pub mod fusion;
pub mod legacy;

pub use canonical::CanonicalProvider;
pub use envelope::EnvelopeProvider;
pub use legacy::LegacyProvider;

use crate::catalog::SdkCatalog;
use crate::config::{ParamBag, VendorParams};
use crate::error::ProviderError;
use crate::types::{BiometricFunction, BiometricType, CapabilityKey, ContractVersion, Flags};
use bir_core::{Bir, BiometricRecord};
use std::collections::BTreeMap;
use tracing::debug;

/// Uniform capability surface every contract adapter exposes.
///
/// Backend failures inside an operation are logged and folded into a
/// conservative result (no match, zero quality, no templates). Errors
/// returned here mean the call could not be routed at all.
pub trait BiometricProvider: Send + Sync {
    fn contract_version(&self) -> ContractVersion;

    fn name(&self) -> &str;

    /// Offer one vendor's per-modality parameters. Returns the capabilities
    /// newly bound by this vendor; on error nothing is bound.
    fn init(
        &mut self,
        vendor: &str,
        params: &VendorParams,
        catalog: &SdkCatalog,
    ) -> Result<Vec<CapabilityKey>, ProviderError>;

    /// 1:1 verification under the adapter's fusion rule.
    fn verify(
        &self,
        sample: &[Bir],
        gallery: &[Bir],
        modality: BiometricType,
        flags: &Flags,
    ) -> Result<bool, ProviderError>;

    /// 1:N identification, one verdict per gallery key.
    fn identify(
        &self,
        sample: &[Bir],
        gallery: &BTreeMap<String, Vec<Bir>>,
        modality: BiometricType,
        flags: &Flags,
    ) -> Result<BTreeMap<String, bool>, ProviderError>;

    /// One score per sample segment, in order.
    fn segment_quality(&self, samples: &[Bir], flags: &Flags) -> Result<Vec<f64>, ProviderError>;

    fn modality_quality(
        &self,
        samples: &[Bir],
        flags: &Flags,
    ) -> Result<BTreeMap<BiometricType, f64>, ProviderError>;

    fn extract_template(&self, samples: &[Bir], flags: &Flags) -> Result<Vec<Bir>, ProviderError>;
}

// ── Bindings ──

/// A vendor backend bound to one modality.
#[derive(Clone)]
pub(crate) struct Binding<S> {
    pub vendor: String,
    pub params: ParamBag,
    pub backend: S,
}

pub(crate) struct Staged<S> {
    modality: BiometricType,
    binding: Binding<S>,
    functions: Vec<BiometricFunction>,
}

/// Probe every modality whose version marker names `version` and that is
/// not yet bound. `bind` constructs the backend and reports its functions;
/// the first failure aborts the whole probe.
pub(crate) fn probe<S>(
    version: ContractVersion,
    bound: &BTreeMap<BiometricType, Binding<S>>,
    vendor: &str,
    params: &VendorParams,
    mut bind: impl FnMut(BiometricType, &ParamBag) -> Result<(S, Vec<BiometricFunction>), ProviderError>,
) -> Result<Vec<Staged<S>>, ProviderError> {
    let mut staged = Vec::new();
    for (modality, bag) in params {
        if bag.version() != Some(version.as_str()) {
            continue;
        }
        if let Some(existing) = bound.get(modality) {
            debug!(
                vendor = %vendor,
                modality = %modality,
                bound_to = %existing.vendor,
                "modality already bound, skipping"
            );
            continue;
        }
        let (backend, functions) = bind(*modality, bag)?;
        if functions.is_empty() {
            debug!(vendor = %vendor, modality = %modality, "backend supports no functions");
            continue;
        }
        staged.push(Staged {
            modality: *modality,
            binding: Binding {
                vendor: vendor.to_string(),
                params: bag.clone(),
                backend,
            },
            functions,
        });
    }
    Ok(staged)
}

pub(crate) fn commit<S>(
    bound: &mut BTreeMap<BiometricType, Binding<S>>,
    staged: Vec<Staged<S>>,
) -> Vec<CapabilityKey> {
    let mut capabilities = Vec::new();
    for s in staged {
        capabilities.extend(
            s.functions
                .iter()
                .map(|f| CapabilityKey::new(s.modality, *f)),
        );
        bound.insert(s.modality, s.binding);
    }
    capabilities
}

pub(crate) fn binding_for<S>(
    bound: &BTreeMap<BiometricType, Binding<S>>,
    modality: BiometricType,
    function: BiometricFunction,
) -> Result<&Binding<S>, ProviderError> {
    bound
        .get(&modality)
        .ok_or(ProviderError::Lookup { modality, function })
}

// ── Segment plumbing ──

pub(crate) fn record_of(segments: &[&Bir]) -> BiometricRecord {
    BiometricRecord::new(segments.iter().map(|b| (*b).clone()).collect())
}

/// Leaves grouped by their first declared type. Untyped leaves are dropped.
pub(crate) fn group_by_modality(samples: &[Bir]) -> BTreeMap<BiometricType, Vec<&Bir>> {
    let mut groups: BTreeMap<BiometricType, Vec<&Bir>> = BTreeMap::new();
    for leaf in fusion::leaves(samples) {
        if let Some(modality) = leaf.primary_type() {
            groups.entry(modality).or_default().push(leaf);
        }
    }
    groups
}

/// Positional decisions for `columns` gallery records; out-of-range indices ignored.
pub(crate) fn decision_row(
    columns: usize,
    decisions: impl IntoIterator<Item = (usize, bool)>,
) -> Vec<bool> {
    let mut row = vec![false; columns];
    for (index, matched) in decisions {
        if let Some(slot) = row.get_mut(index) {
            *slot = matched;
        }
    }
    row
}
