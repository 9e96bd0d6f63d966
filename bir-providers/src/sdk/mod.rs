//! Vendor backend contracts.
//!
//! Three historical calling conventions coexist in deployed vendor SDKs:
//!
//! | contract | trait | shape |
//! |---|---|---|
//! | 0.7 | [`LegacySdk`] | methods discovered by name and parameter shape |
//! | 0.8 | [`EnvelopeSdk`] | fixed interface, status + payload envelope, flat decisions |
//! | 0.9 | [`BiometricSdk`] | 0.8 plus self-reported API version and per-modality decisions |
//!
//! Backends are third-party code, so every call returns `anyhow::Result`.

pub mod canonical;
pub mod envelope;
pub mod legacy;

pub use canonical::{BiometricSdk, MatchDecision};
pub use envelope::{EnvelopeSdk, FlatMatch};
pub use legacy::{LegacyArg, LegacyMethod, LegacySdk, LegacyValue, ParamShape, Score};

use crate::types::{BiometricFunction, BiometricType};
use std::collections::BTreeMap;

/// Status + payload envelope returned by 0.8 and 0.9 backends.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub status_code: u16,
    pub status_message: Option<String>,
    pub response: Option<T>,
}

impl<T> Response<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            status_code: 200,
            status_message: None,
            response: Some(payload),
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            status_message: Some(message.into()),
            response: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status_code)
    }

    /// The payload, only for a 2xx status with a non-null payload.
    pub fn into_payload(self) -> Option<T> {
        if self.is_success() {
            self.response
        } else {
            None
        }
    }
}

/// What a 0.8 / 0.9 backend reports from `init`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SdkInfo {
    pub api_version: String,
    pub sdk_version: String,
    pub supported_modalities: Vec<BiometricType>,
    pub supported_methods: BTreeMap<BiometricFunction, Vec<BiometricType>>,
}

impl SdkInfo {
    /// Functions the backend supports for `modality`.
    pub fn functions_for(&self, modality: BiometricType) -> Vec<BiometricFunction> {
        self.supported_methods
            .iter()
            .filter(|(_, modalities)| modalities.contains(&modality))
            .map(|(f, _)| *f)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityScore {
    pub score: f64,
    pub errors: Vec<String>,
    pub analytics_info: BTreeMap<String, String>,
}

/// Per-modality quality returned by `check_quality`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityCheck {
    pub scores: BTreeMap<BiometricType, QualityScore>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_requires_2xx_and_value() {
        assert_eq!(Response::ok(5).into_payload(), Some(5));
        assert_eq!(Response::<i32>::error(500, "boom").into_payload(), None);

        let redirected = Response {
            status_code: 302,
            status_message: None,
            response: Some(1),
        };
        assert_eq!(redirected.into_payload(), None);

        let empty: Response<i32> = Response {
            status_code: 204,
            status_message: None,
            response: None,
        };
        assert!(empty.is_success());
        assert_eq!(empty.into_payload(), None);
    }

    #[test]
    fn functions_for_modality() {
        let info = SdkInfo {
            supported_methods: [
                (BiometricFunction::Match, vec![BiometricType::Finger, BiometricType::Iris]),
                (BiometricFunction::Extract, vec![BiometricType::Iris]),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        assert_eq!(
            info.functions_for(BiometricType::Iris),
            vec![BiometricFunction::Match, BiometricFunction::Extract]
        );
        assert_eq!(info.functions_for(BiometricType::Finger), vec![BiometricFunction::Match]);
        assert!(info.functions_for(BiometricType::Face).is_empty());
    }
}
