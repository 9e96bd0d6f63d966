use crate::types::{BiometricFunction, BiometricType};
use bir_core::BirError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no biometric provider implementations are loaded")]
    NoProviders,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no provider could be registered for configured modalities {missing:?}")]
    RegistryEmpty { missing: Vec<BiometricType> },

    #[error("SDK version mismatch: configured {configured}, backend reports {reported}")]
    VersionMismatch { configured: String, reported: String },

    #[error("no provider registered for {modality} {function}")]
    Lookup {
        modality: BiometricType,
        function: BiometricFunction,
    },

    #[error(transparent)]
    Record(#[from] BirError),
}

impl ProviderError {
    pub fn config(msg: impl Into<String>) -> Self {
        ProviderError::Configuration(msg.into())
    }
}
