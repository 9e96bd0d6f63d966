//! Capability registry.
//!
//! Built once at startup by offering each configured vendor to every loaded
//! provider implementation. The first vendor to register a (modality,
//! function) capability keeps it. After build the table is immutable and
//! lookups take no lock.

use crate::adapter::fusion::leaves;
use crate::adapter::BiometricProvider;
use crate::catalog::SdkCatalog;
use crate::config::SdkConfig;
use crate::error::ProviderError;
use crate::types::{BiometricFunction, BiometricType, CapabilityKey, Flags};
use bir_core::Bir;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ProviderRegistry {
    providers: Vec<Arc<dyn BiometricProvider>>,
    table: HashMap<CapabilityKey, usize>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.len())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

impl ProviderRegistry {
    /// Probe vendors in [`SdkConfig::vendor_order`] until every configured
    /// modality has a provider.
    pub fn build(
        mut providers: Vec<Box<dyn BiometricProvider>>,
        config: &SdkConfig,
        catalog: &SdkCatalog,
    ) -> Result<Self, ProviderError> {
        if providers.is_empty() {
            return Err(ProviderError::NoProviders);
        }

        let configured = config.configured_modalities();
        if configured.is_empty() {
            return Err(ProviderError::config("no SDK configuration for any vendor"));
        }

        let mut table: HashMap<CapabilityKey, usize> = HashMap::new();
        let covered = |table: &HashMap<CapabilityKey, usize>, m: BiometricType| {
            table.keys().any(|k| k.modality == m)
        };

        for vendor in config.vendor_order() {
            if configured.iter().all(|m| covered(&table, *m)) {
                info!(vendor = %vendor, "all configured modalities registered, stopping probe");
                break;
            }

            let params = config.vendor_params(&vendor);
            for (index, provider) in providers.iter_mut().enumerate() {
                match provider.init(&vendor, &params, catalog) {
                    Ok(capabilities) => {
                        for capability in capabilities {
                            if let Some(&owner) = table.get(&capability) {
                                debug!(
                                    capability = %capability,
                                    vendor = %vendor,
                                    owner = owner,
                                    "capability already registered, keeping first"
                                );
                                continue;
                            }
                            info!(
                                capability = %capability,
                                vendor = %vendor,
                                provider = provider.name(),
                                "registered capability"
                            );
                            table.insert(capability, index);
                        }
                    }
                    Err(e) => {
                        warn!(
                            provider = provider.name(),
                            vendor = %vendor,
                            error = %e,
                            "provider probe failed, skipping vendor"
                        );
                    }
                }
            }
        }

        let missing: Vec<BiometricType> = configured
            .into_iter()
            .filter(|m| !covered(&table, *m))
            .collect();
        if !missing.is_empty() {
            return Err(ProviderError::RegistryEmpty { missing });
        }

        Ok(Self {
            providers: providers.into_iter().map(Arc::from).collect(),
            table,
        })
    }

    pub fn get_provider(
        &self,
        modality: BiometricType,
        function: BiometricFunction,
    ) -> Result<Arc<dyn BiometricProvider>, ProviderError> {
        self.table
            .get(&CapabilityKey::new(modality, function))
            .and_then(|&i| self.providers.get(i))
            .cloned()
            .ok_or(ProviderError::Lookup { modality, function })
    }

    /// Registered capabilities, sorted.
    pub fn capabilities(&self) -> Vec<CapabilityKey> {
        let mut keys: Vec<CapabilityKey> = self.table.keys().copied().collect();
        keys.sort();
        keys
    }

    // ── Routing ──

    pub fn verify(
        &self,
        sample: &[Bir],
        gallery: &[Bir],
        modality: BiometricType,
        flags: &Flags,
    ) -> Result<bool, ProviderError> {
        self.get_provider(modality, BiometricFunction::Match)?
            .verify(sample, gallery, modality, flags)
    }

    pub fn identify(
        &self,
        sample: &[Bir],
        gallery: &BTreeMap<String, Vec<Bir>>,
        modality: BiometricType,
        flags: &Flags,
    ) -> Result<BTreeMap<String, bool>, ProviderError> {
        self.get_provider(modality, BiometricFunction::Match)?
            .identify(sample, gallery, modality, flags)
    }

    /// One score per sample leaf, in order; each leaf is routed by its first type.
    pub fn segment_quality(&self, samples: &[Bir], flags: &Flags) -> Result<Vec<f64>, ProviderError> {
        let mut scores = Vec::new();
        for leaf in leaves(samples) {
            let Some(modality) = leaf.primary_type() else {
                warn!("sample segment declares no biometric type, scoring 0");
                scores.push(0.0);
                continue;
            };
            let provider = self.get_provider(modality, BiometricFunction::QualityCheck)?;
            let score = provider
                .segment_quality(std::slice::from_ref(leaf), flags)?
                .first()
                .copied()
                .unwrap_or(0.0);
            scores.push(score);
        }
        Ok(scores)
    }

    pub fn modality_quality(
        &self,
        samples: &[Bir],
        flags: &Flags,
    ) -> Result<BTreeMap<BiometricType, f64>, ProviderError> {
        let mut out = BTreeMap::new();
        for (modality, group) in group_owned(samples) {
            let provider = self.get_provider(modality, BiometricFunction::QualityCheck)?;
            out.extend(provider.modality_quality(&group, flags)?);
        }
        Ok(out)
    }

    pub fn extract_template(&self, samples: &[Bir], flags: &Flags) -> Result<Vec<Bir>, ProviderError> {
        let mut templates = Vec::new();
        for (modality, group) in group_owned(samples) {
            let provider = self.get_provider(modality, BiometricFunction::Extract)?;
            templates.extend(provider.extract_template(&group, flags)?);
        }
        Ok(templates)
    }
}

fn group_owned(samples: &[Bir]) -> BTreeMap<BiometricType, Vec<Bir>> {
    let mut groups: BTreeMap<BiometricType, Vec<Bir>> = BTreeMap::new();
    for leaf in leaves(samples) {
        if let Some(modality) = leaf.primary_type() {
            groups.entry(modality).or_default().push(leaf.clone());
        }
    }
    groups
}
