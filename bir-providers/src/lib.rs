//! Versioned biometric SDK providers
//!
//! Vendor backends implement one of three historical calling contracts
//! (0.7, 0.8, 0.9). Each contract has an adapter implementing
//! [`BiometricProvider`]; the [`ProviderRegistry`] offers every configured
//! vendor to every adapter at startup and routes `(modality, function)`
//! requests to the first provider that registered them.
//!
//! ```text
//! SdkConfig ──► ProviderRegistry::build ──► { CapabilityKey → provider }
//!                    │
//!                    ├─ LegacyProvider    (0.7, score + threshold)
//!                    ├─ EnvelopeProvider  (0.8, status envelope, AUTH/DEDUPE)
//!                    └─ CanonicalProvider (0.9, per-modality decisions, version pinned)
//!                            │
//!                            ▼
//!                     SdkCatalog (class → constructor, cached instances)
//! ```
//!
//! Calls are synchronous. A hung backend blocks its caller; there is no
//! timeout or retry at this layer.

pub mod adapter;
pub mod catalog;
pub mod config;
pub mod error;
pub mod registry;
pub mod sdk;
pub mod types;

pub use adapter::{BiometricProvider, CanonicalProvider, EnvelopeProvider, LegacyProvider};
pub use catalog::{SdkCatalog, SdkHandle};
pub use config::{ParamBag, SdkConfig, VendorParams};
pub use error::ProviderError;
pub use registry::ProviderRegistry;
pub use types::{
    BiometricFunction, BiometricType, CapabilityKey, ContractVersion, Decision, Flags,
    MatchPolicy, METHOD_NAME_FLAG, THRESHOLD_FLAG,
};

/// The three contract adapters, ready for [`ProviderRegistry::build`].
pub fn default_providers() -> Vec<Box<dyn BiometricProvider>> {
    vec![
        Box::new(LegacyProvider::new()),
        Box::new(EnvelopeProvider::new()),
        Box::new(CanonicalProvider::new()),
    ]
}
