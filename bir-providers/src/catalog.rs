//! Implementing-class catalog and SDK instance cache.
//!
//! Configuration names a vendor backend by class identifier. The catalog maps
//! those identifiers to constructors and memoizes constructed instances by
//! the sorted parameter string, so vendors sharing identical parameters share
//! one backend.

use crate::config::ParamBag;
use crate::error::ProviderError;
use crate::sdk::{BiometricSdk, EnvelopeSdk, LegacySdk};
use crate::types::ContractVersion;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// A constructed backend, tagged by the contract it implements.
#[derive(Clone)]
pub enum SdkHandle {
    Legacy(Arc<dyn LegacySdk>),
    Envelope(Arc<dyn EnvelopeSdk>),
    Canonical(Arc<dyn BiometricSdk>),
}

impl SdkHandle {
    pub fn contract_version(&self) -> ContractVersion {
        match self {
            SdkHandle::Legacy(_) => ContractVersion::V0_7,
            SdkHandle::Envelope(_) => ContractVersion::V0_8,
            SdkHandle::Canonical(_) => ContractVersion::V0_9,
        }
    }
}

impl fmt::Debug for SdkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SdkHandle({})", self.contract_version())
    }
}

type Constructor = Box<dyn Fn(&[String]) -> anyhow::Result<SdkHandle> + Send + Sync>;

#[derive(Default)]
pub struct SdkCatalog {
    constructors: HashMap<String, Constructor>,
    instances: Mutex<HashMap<String, SdkHandle>>,
}

impl SdkCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `class_name`; it receives the configured
    /// constructor arguments.
    pub fn with<F>(mut self, class_name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&[String]) -> anyhow::Result<SdkHandle> + Send + Sync + 'static,
    {
        self.register(class_name, constructor);
        self
    }

    pub fn register<F>(&mut self, class_name: impl Into<String>, constructor: F)
    where
        F: Fn(&[String]) -> anyhow::Result<SdkHandle> + Send + Sync + 'static,
    {
        self.constructors
            .insert(class_name.into(), Box::new(constructor));
    }

    pub fn knows(&self, class_name: &str) -> bool {
        self.constructors.contains_key(class_name)
    }

    /// The backend for `params`, constructed on first request.
    ///
    /// The cache lock is held across construction so concurrent first
    /// requests for the same key build exactly one instance.
    pub fn resolve(&self, params: &ParamBag) -> Result<SdkHandle, ProviderError> {
        let class_name = params
            .classname()
            .ok_or_else(|| ProviderError::config("SDK parameters carry no classname"))?;
        let key = params.cache_key();

        // Entries are inserted only after a constructor returns, so a cache
        // poisoned by a panicking constructor is still consistent.
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = instances.get(&key) {
            debug!(class = %class_name, "reusing cached SDK instance");
            return Ok(handle.clone());
        }

        let constructor = self.constructors.get(class_name).ok_or_else(|| {
            ProviderError::config(format!("no constructor registered for class {}", class_name))
        })?;
        let handle = constructor(&params.args()).map_err(|e| {
            ProviderError::config(format!("constructing {}: {:#}", class_name, e))
        })?;

        info!(
            class = %class_name,
            contract = %handle.contract_version(),
            "constructed SDK instance"
        );
        instances.insert(key, handle.clone());
        Ok(handle)
    }

    /// Number of cached backend instances.
    pub fn instance_count(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
