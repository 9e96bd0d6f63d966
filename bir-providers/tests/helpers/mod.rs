//! Scripted vendor backends for all three contracts.
//!
//! Matching is payload equality: a sample segment matches a gallery record
//! when its BDB equals one of the record's BDBs. Quality is ten points per
//! BDB byte. A segment whose BDB is `boom` makes the backend call fail.

#![allow(dead_code)]

use anyhow::{bail, Result};
use bir_core::{BdbInfo, Bir, BiometricRecord, RegistryIdInfo};
use bir_providers::adapter::fusion::leaves;
use bir_providers::sdk::legacy::{
    default_methods, CHECK_QUALITY, COMPOSITE_MATCH, EXTRACT_TEMPLATE, MATCH,
};
use bir_providers::sdk::{
    BiometricSdk, EnvelopeSdk, FlatMatch, LegacyArg, LegacyMethod, LegacySdk, LegacyValue,
    MatchDecision, QualityCheck, Response, Score, SdkInfo,
};
use bir_providers::sdk::QualityScore;
use bir_providers::{
    BiometricFunction, BiometricProvider, BiometricType, CapabilityKey, ContractVersion, Decision,
    Flags, ProviderError, SdkCatalog, SdkHandle, VendorParams,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const FAIL_PAYLOAD: &[u8] = b"boom";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Segments ──

pub fn segment(modality: BiometricType, format: &str, bdb: &[u8]) -> Bir {
    Bir::leaf(
        BdbInfo {
            format: RegistryIdInfo::new("Mosip", format),
            types: vec![modality],
            ..Default::default()
        },
        bdb.to_vec(),
    )
}

pub fn finger(bdb: &[u8]) -> Bir {
    segment(BiometricType::Finger, "7", bdb)
}

pub fn iris(bdb: &[u8]) -> Bir {
    segment(BiometricType::Iris, "9", bdb)
}

pub fn face(bdb: &[u8]) -> Bir {
    segment(BiometricType::Face, "8", bdb)
}

pub fn flags(pairs: &[(&str, &str)]) -> Flags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn payload(bir: &Bir) -> &[u8] {
    bir.bdb.as_deref().unwrap_or_default()
}

fn fails(bir: &Bir) -> bool {
    payload(bir) == FAIL_PAYLOAD
}

fn quality_of(bir: &Bir) -> f64 {
    payload(bir).len() as f64 * 10.0
}

fn reversed(bir: &Bir) -> Bir {
    let mut template = bir.clone();
    if let Some(bdb) = template.bdb.as_mut() {
        bdb.reverse();
    }
    template
}

fn record_matches(sample: &BiometricRecord, candidate: &BiometricRecord) -> bool {
    let gallery = leaves(&candidate.segments);
    leaves(&sample.segments)
        .iter()
        .any(|s| gallery.iter().any(|g| payload(s) == payload(g)))
}

fn any_failing(record: &BiometricRecord) -> bool {
    leaves(&record.segments).into_iter().any(fails)
}

fn full_support(api_version: &str) -> SdkInfo {
    let all = vec![BiometricType::Finger, BiometricType::Iris, BiometricType::Face];
    SdkInfo {
        api_version: api_version.to_string(),
        sdk_version: "test".to_string(),
        supported_modalities: all.clone(),
        supported_methods: [
            BiometricFunction::Match,
            BiometricFunction::QualityCheck,
            BiometricFunction::Extract,
        ]
        .into_iter()
        .map(|f| (f, all.clone()))
        .collect(),
    }
}

fn quality_check(sample: &BiometricRecord, modalities: &[BiometricType]) -> QualityCheck {
    let segs = leaves(&sample.segments);
    let scores = modalities
        .iter()
        .map(|m| {
            let of_modality: Vec<f64> = segs
                .iter()
                .filter(|s| s.has_type(*m))
                .map(|s| quality_of(s))
                .collect();
            let score = if of_modality.is_empty() {
                0.0
            } else {
                of_modality.iter().sum::<f64>() / of_modality.len() as f64
            };
            (
                *m,
                QualityScore {
                    score,
                    ..Default::default()
                },
            )
        })
        .collect();
    QualityCheck { scores }
}

// ── 0.7 ──

pub struct FakeLegacy {
    methods: Vec<LegacyMethod>,
    pub received_flags: Mutex<Vec<Flags>>,
}

impl Default for FakeLegacy {
    fn default() -> Self {
        Self {
            methods: default_methods(),
            received_flags: Mutex::new(Vec::new()),
        }
    }
}

impl FakeLegacy {
    pub fn with_methods(methods: Vec<LegacyMethod>) -> Self {
        Self {
            methods,
            ..Default::default()
        }
    }
}

impl LegacySdk for FakeLegacy {
    fn methods(&self) -> Vec<LegacyMethod> {
        self.methods.clone()
    }

    fn invoke(&self, name: &str, args: &[LegacyArg<'_>]) -> Result<LegacyValue> {
        for arg in args {
            if let LegacyArg::Flags(f) = arg {
                if let Ok(mut seen) = self.received_flags.lock() {
                    seen.push((*f).clone());
                }
            }
        }
        match (name, args) {
            (CHECK_QUALITY, [LegacyArg::Segment(seg), LegacyArg::Flags(_)]) => {
                if fails(seg) {
                    bail!("sensor data unreadable");
                }
                Ok(LegacyValue::Quality(Score {
                    scale_score: quality_of(seg),
                    internal_score: payload(seg).len() as i64,
                }))
            }
            (MATCH, [LegacyArg::Segment(seg), LegacyArg::Segments(gallery), LegacyArg::Flags(_)]) => {
                if fails(seg) {
                    bail!("matcher crashed");
                }
                Ok(LegacyValue::Scores(
                    gallery
                        .iter()
                        .map(|g| Score {
                            scale_score: if payload(g) == payload(seg) { 100.0 } else { 0.0 },
                            internal_score: 0,
                        })
                        .collect(),
                ))
            }
            (
                COMPOSITE_MATCH,
                [LegacyArg::Segments(sample), LegacyArg::Segments(gallery), LegacyArg::Flags(_)],
            ) => {
                let matched = sample
                    .iter()
                    .filter(|s| gallery.iter().any(|g| payload(g) == payload(s)))
                    .count();
                let scale = if sample.is_empty() {
                    0.0
                } else {
                    matched as f64 * 100.0 / sample.len() as f64
                };
                Ok(LegacyValue::Composite(Score {
                    scale_score: scale,
                    internal_score: matched as i64,
                }))
            }
            (EXTRACT_TEMPLATE, [LegacyArg::Segment(seg), LegacyArg::Flags(_)]) => {
                if fails(seg) {
                    bail!("extractor crashed");
                }
                Ok(LegacyValue::Template(reversed(seg)))
            }
            (other, _) => bail!("no method {} for these arguments", other),
        }
    }
}

// ── 0.8 ──

pub struct FakeEnvelope {
    /// When false, every decision is NotMatched.
    pub accepts: bool,
    pub received_flags: Mutex<Vec<Flags>>,
}

impl Default for FakeEnvelope {
    fn default() -> Self {
        Self {
            accepts: true,
            received_flags: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEnvelope {
    pub fn rejecting() -> Self {
        Self {
            accepts: false,
            ..Default::default()
        }
    }

    fn record(&self, flags: &Flags) {
        if let Ok(mut seen) = self.received_flags.lock() {
            seen.push(flags.clone());
        }
    }
}

impl EnvelopeSdk for FakeEnvelope {
    fn init(&self, _params: &BTreeMap<String, String>) -> Result<SdkInfo> {
        Ok(full_support("0.8"))
    }

    fn check_quality(
        &self,
        sample: &BiometricRecord,
        modalities: &[BiometricType],
        flags: &Flags,
    ) -> Result<Response<QualityCheck>> {
        self.record(flags);
        if any_failing(sample) {
            return Ok(Response::error(500, "quality engine failure"));
        }
        Ok(Response::ok(quality_check(sample, modalities)))
    }

    fn match_records(
        &self,
        sample: &BiometricRecord,
        gallery: &[BiometricRecord],
        _modalities: &[BiometricType],
        flags: &Flags,
    ) -> Result<Response<Vec<FlatMatch>>> {
        self.record(flags);
        if any_failing(sample) {
            bail!("matcher crashed");
        }
        Ok(Response::ok(
            gallery
                .iter()
                .enumerate()
                .map(|(i, candidate)| FlatMatch {
                    gallery_index: i,
                    decision: if self.accepts && record_matches(sample, candidate) {
                        Decision::Matched
                    } else {
                        Decision::NotMatched
                    },
                })
                .collect(),
        ))
    }

    fn extract_template(
        &self,
        sample: &BiometricRecord,
        _modalities: &[BiometricType],
        flags: &Flags,
    ) -> Result<Response<BiometricRecord>> {
        self.record(flags);
        if any_failing(sample) {
            return Ok(Response::error(500, "extractor failure"));
        }
        let templates = leaves(&sample.segments).into_iter().map(reversed).collect();
        Ok(Response::ok(BiometricRecord::new(templates)))
    }
}

// ── 0.9 ──

pub struct FakeCanonical {
    version: Mutex<String>,
    pub received_flags: Mutex<Vec<Flags>>,
}

impl Default for FakeCanonical {
    fn default() -> Self {
        Self {
            version: Mutex::new("0.9".to_string()),
            received_flags: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCanonical {
    /// Simulate a backend upgraded underneath a running registry.
    pub fn report_version(&self, version: &str) {
        if let Ok(mut v) = self.version.lock() {
            *v = version.to_string();
        }
    }
}

impl BiometricSdk for FakeCanonical {
    fn api_version(&self) -> String {
        self.version
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    fn init(&self, _params: &BTreeMap<String, String>) -> Result<SdkInfo> {
        Ok(full_support(&self.api_version()))
    }

    fn check_quality(
        &self,
        sample: &BiometricRecord,
        modalities: &[BiometricType],
        flags: &Flags,
    ) -> Result<Response<QualityCheck>> {
        if let Ok(mut seen) = self.received_flags.lock() {
            seen.push(flags.clone());
        }
        if any_failing(sample) {
            bail!("quality engine crashed");
        }
        Ok(Response::ok(quality_check(sample, modalities)))
    }

    fn match_records(
        &self,
        sample: &BiometricRecord,
        gallery: &[BiometricRecord],
        modalities: &[BiometricType],
        flags: &Flags,
    ) -> Result<Response<Vec<MatchDecision>>> {
        if let Ok(mut seen) = self.received_flags.lock() {
            seen.push(flags.clone());
        }
        if any_failing(sample) {
            return Ok(Response::error(500, "matcher failure"));
        }
        Ok(Response::ok(
            gallery
                .iter()
                .enumerate()
                .map(|(i, candidate)| {
                    let decision = if record_matches(sample, candidate) {
                        Decision::Matched
                    } else {
                        Decision::NotMatched
                    };
                    MatchDecision {
                        gallery_index: i,
                        decisions: modalities.iter().map(|m| (*m, decision)).collect(),
                    }
                })
                .collect(),
        ))
    }

    fn extract_template(
        &self,
        sample: &BiometricRecord,
        _modalities: &[BiometricType],
        _flags: &Flags,
    ) -> Result<Response<BiometricRecord>> {
        if any_failing(sample) {
            bail!("extractor crashed");
        }
        let templates = leaves(&sample.segments).into_iter().map(reversed).collect();
        Ok(Response::ok(BiometricRecord::new(templates)))
    }
}

// ── Catalog ──

pub const LEGACY_CLASS: &str = "test.LegacySdk";
pub const ENVELOPE_CLASS: &str = "test.EnvelopeSdk";
pub const REJECTING_CLASS: &str = "test.RejectingSdk";
pub const CANONICAL_CLASS: &str = "test.CanonicalSdk";
pub const BROKEN_CLASS: &str = "test.BrokenSdk";

/// The fakes registered in [`catalog`], shared with the test body.
pub struct Backends {
    pub legacy: Arc<FakeLegacy>,
    pub envelope: Arc<FakeEnvelope>,
    pub canonical: Arc<FakeCanonical>,
    pub constructions: Arc<AtomicUsize>,
}

impl Backends {
    pub fn constructed(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

pub fn catalog() -> (SdkCatalog, Backends) {
    let backends = Backends {
        legacy: Arc::new(FakeLegacy::default()),
        envelope: Arc::new(FakeEnvelope::default()),
        canonical: Arc::new(FakeCanonical::default()),
        constructions: Arc::new(AtomicUsize::new(0)),
    };

    let (legacy, envelope, canonical) = (
        backends.legacy.clone(),
        backends.envelope.clone(),
        backends.canonical.clone(),
    );
    let counter = &backends.constructions;
    let (c0, c1, c2, c3, c4) = (
        counter.clone(),
        counter.clone(),
        counter.clone(),
        counter.clone(),
        counter.clone(),
    );

    let catalog = SdkCatalog::new()
        .with(LEGACY_CLASS, move |_| {
            c0.fetch_add(1, Ordering::SeqCst);
            Ok(SdkHandle::Legacy(legacy.clone()))
        })
        .with(ENVELOPE_CLASS, move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
            Ok(SdkHandle::Envelope(envelope.clone()))
        })
        .with(REJECTING_CLASS, move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
            Ok(SdkHandle::Envelope(Arc::new(FakeEnvelope::rejecting())))
        })
        .with(CANONICAL_CLASS, move |_| {
            c3.fetch_add(1, Ordering::SeqCst);
            Ok(SdkHandle::Canonical(canonical.clone()))
        })
        .with(BROKEN_CLASS, move |_| {
            c4.fetch_add(1, Ordering::SeqCst);
            bail!("vendor license rejected")
        });

    (catalog, backends)
}

// ── Providers ──

/// A provider implementation whose every probe fails.
pub struct ThrowingProvider;

impl BiometricProvider for ThrowingProvider {
    fn contract_version(&self) -> ContractVersion {
        ContractVersion::V0_8
    }

    fn name(&self) -> &str {
        "throwing"
    }

    fn init(
        &mut self,
        vendor: &str,
        _params: &VendorParams,
        _catalog: &SdkCatalog,
    ) -> Result<Vec<CapabilityKey>, ProviderError> {
        Err(ProviderError::config(format!("{} backend unreachable", vendor)))
    }

    fn verify(
        &self,
        _sample: &[Bir],
        _gallery: &[Bir],
        _modality: BiometricType,
        _flags: &Flags,
    ) -> Result<bool, ProviderError> {
        Ok(false)
    }

    fn identify(
        &self,
        _sample: &[Bir],
        _gallery: &BTreeMap<String, Vec<Bir>>,
        _modality: BiometricType,
        _flags: &Flags,
    ) -> Result<BTreeMap<String, bool>, ProviderError> {
        Ok(BTreeMap::new())
    }

    fn segment_quality(&self, _samples: &[Bir], _flags: &Flags) -> Result<Vec<f64>, ProviderError> {
        Ok(Vec::new())
    }

    fn modality_quality(
        &self,
        _samples: &[Bir],
        _flags: &Flags,
    ) -> Result<BTreeMap<BiometricType, f64>, ProviderError> {
        Ok(BTreeMap::new())
    }

    fn extract_template(&self, _samples: &[Bir], _flags: &Flags) -> Result<Vec<Bir>, ProviderError> {
        Ok(Vec::new())
    }
}
