//! Vendor SDK configuration.
//!
//! ```yaml
//! vendor_priority: [acme]
//! finger:
//!   acme:
//!     classname: com.acme.FingerSdk
//!     version: "0.9"
//!     args: "license.key,eu-west"
//!     threshold: "70"
//! iris: {}
//! face: {}
//! ```

use crate::error::ProviderError;
use crate::types::{BiometricType, CONFIGURABLE_MODALITIES};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Prefix of the flat property form:
/// `mosip.biometric.sdk.providers.<modality>.<vendor>.<key>=<value>`.
pub const PROPERTY_PREFIX: &str = "mosip.biometric.sdk.providers.";

pub const CLASSNAME_KEY: &str = "classname";
pub const VERSION_KEY: &str = "version";
pub const ARGS_KEY: &str = "args";
pub const THRESHOLD_KEY: &str = "threshold";

/// One vendor's parameters per modality, as offered to providers.
pub type VendorParams = BTreeMap<BiometricType, ParamBag>;

/// Flat string parameters for one (modality, vendor) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ParamBag(BTreeMap<String, String>);

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn classname(&self) -> Option<&str> {
        self.get(CLASSNAME_KEY).map(str::trim).filter(|s| !s.is_empty())
    }

    /// Contract-version marker, e.g. `"0.9"`.
    pub fn version(&self) -> Option<&str> {
        self.get(VERSION_KEY).map(str::trim)
    }

    /// Comma-separated constructor arguments, trimmed, empties dropped.
    pub fn args(&self) -> Vec<String> {
        self.get(ARGS_KEY)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Configured match threshold; an unparseable value is ignored.
    pub fn threshold(&self) -> Option<f64> {
        self.get(THRESHOLD_KEY).and_then(|t| t.trim().parse().ok())
    }

    /// Sorted `key=value` rendering; identical bags share one SDK instance.
    pub fn cache_key(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn insert(&mut self, key: String, value: String) {
        self.0.insert(key, value);
    }
}

/// Root configuration: three modality buckets of vendor-id → parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SdkConfig {
    #[serde(default)]
    pub finger: BTreeMap<String, ParamBag>,
    #[serde(default)]
    pub iris: BTreeMap<String, ParamBag>,
    #[serde(default)]
    pub face: BTreeMap<String, ParamBag>,
    /// Vendors probed first, in this order. Others follow lexicographically.
    #[serde(default)]
    pub vendor_priority: Vec<String>,
}

impl SdkConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::config(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ProviderError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ProviderError::config(format!("invalid SDK configuration: {}", e)))
    }

    /// Build from flat `mosip.biometric.sdk.providers.*` properties. Keys
    /// without the prefix are ignored.
    pub fn from_properties<I, K, V>(properties: I) -> Result<Self, ProviderError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = SdkConfig::default();
        for (key, value) in properties {
            let Some(rest) = key.as_ref().strip_prefix(PROPERTY_PREFIX) else {
                continue;
            };
            let mut parts = rest.splitn(3, '.');
            let (Some(modality), Some(vendor), Some(param)) =
                (parts.next(), parts.next(), parts.next())
            else {
                return Err(ProviderError::config(format!(
                    "malformed provider property '{}'",
                    key.as_ref()
                )));
            };
            let bucket = config.bucket_mut(modality).ok_or_else(|| {
                ProviderError::config(format!("unsupported modality '{}' in '{}'", modality, key.as_ref()))
            })?;
            bucket
                .entry(vendor.to_string())
                .or_default()
                .insert(param.to_string(), value.into());
        }
        Ok(config)
    }

    /// Parse `key=value` lines (`#` comments, blank lines skipped) and hand
    /// them to [`SdkConfig::from_properties`].
    pub fn from_properties_text(text: &str) -> Result<Self, ProviderError> {
        let pairs = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| {
                l.split_once('=')
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    .ok_or_else(|| {
                        ProviderError::config(format!("property line without '=': '{}'", l))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_properties(pairs)
    }

    pub fn bucket(&self, modality: BiometricType) -> Option<&BTreeMap<String, ParamBag>> {
        match modality {
            BiometricType::Finger => Some(&self.finger),
            BiometricType::Iris => Some(&self.iris),
            BiometricType::Face => Some(&self.face),
            _ => None,
        }
    }

    fn bucket_mut(&mut self, name: &str) -> Option<&mut BTreeMap<String, ParamBag>> {
        match name.to_ascii_lowercase().as_str() {
            "finger" => Some(&mut self.finger),
            "iris" => Some(&mut self.iris),
            "face" => Some(&mut self.face),
            _ => None,
        }
    }

    /// Modalities with at least one configured vendor.
    pub fn configured_modalities(&self) -> Vec<BiometricType> {
        CONFIGURABLE_MODALITIES
            .into_iter()
            .filter(|m| self.bucket(*m).is_some_and(|b| !b.is_empty()))
            .collect()
    }

    /// Union of vendor ids across buckets in probe order: `vendor_priority`
    /// entries that are configured, then the rest lexicographically.
    pub fn vendor_order(&self) -> Vec<String> {
        let all: BTreeSet<&String> = CONFIGURABLE_MODALITIES
            .into_iter()
            .filter_map(|m| self.bucket(m))
            .flat_map(|b| b.keys())
            .collect();

        let mut order: Vec<String> = Vec::with_capacity(all.len());
        for vendor in &self.vendor_priority {
            if all.contains(vendor) && !order.contains(vendor) {
                order.push(vendor.clone());
            }
        }
        for vendor in all {
            if !order.contains(vendor) {
                order.push(vendor.clone());
            }
        }
        order
    }

    /// The parameter bags a vendor has across modality buckets.
    pub fn vendor_params(&self, vendor: &str) -> VendorParams {
        CONFIGURABLE_MODALITIES
            .into_iter()
            .filter_map(|m| {
                self.bucket(m)
                    .and_then(|b| b.get(vendor))
                    .map(|bag| (m, bag.clone()))
            })
            .collect()
    }
}
