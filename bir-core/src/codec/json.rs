//! JSON rendering of a record tree.
//!
//! Field names follow the CBEFF element names in camelCase. Binary fields are
//! standard base64 strings; enumerations use their CBEFF spelling.

use super::RecordCodec;
use crate::error::BirError;
use crate::model::*;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pub pretty: bool,
}

impl RecordCodec for JsonCodec {
    fn encode(&self, record: &BiometricRecord) -> Result<Vec<u8>, BirError> {
        let dto = RecordDto::from(record);
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&dto)?
        } else {
            serde_json::to_vec(&dto)?
        };
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<BiometricRecord, BirError> {
        let dto: RecordDto = serde_json::from_slice(bytes)?;
        dto.try_into()
    }
}

// ── DTOs ──

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<VersionDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cbeff_version: Option<VersionDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bir_info: Option<BirInfoDto>,
    #[serde(default)]
    birs: Vec<BirDto>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    others: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BirDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<VersionDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cbeff_version: Option<VersionDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bir_info: Option<BirInfoDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bdb_info: Option<BdbInfoDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sb_info: Option<SbInfoDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    birs: Vec<BirDto>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    others: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionDto {
    major: u32,
    minor: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BirInfoDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
    #[serde(default)]
    integrity: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    not_valid_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    not_valid_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BdbInfoDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    challenge_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<String>,
    #[serde(default)]
    format: RegistryIdDto,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encryption: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    not_valid_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    not_valid_after: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    types: Vec<String>,
    #[serde(default, rename = "subtype")]
    subtypes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    product: Option<RegistryIdDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    capture_device: Option<RegistryIdDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feature_extraction_algorithm: Option<RegistryIdDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comparison_algorithm: Option<RegistryIdDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compression_algorithm: Option<RegistryIdDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quality: Option<QualityDto>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryIdDto {
    #[serde(default)]
    organization: String,
    #[serde(default, rename = "type")]
    type_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QualityDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    algorithm: Option<RegistryIdDto>,
    #[serde(default)]
    score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quality_calculation_failed: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SbInfoDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<RegistryIdDto>,
}

// ── Model → DTO ──

fn b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

impl From<&BiometricRecord> for RecordDto {
    fn from(r: &BiometricRecord) -> Self {
        Self {
            version: r.version.as_ref().map(VersionDto::from),
            cbeff_version: r.cbeff_version.as_ref().map(VersionDto::from),
            bir_info: r.bir_info.as_ref().map(BirInfoDto::from),
            birs: r.segments.iter().map(BirDto::from).collect(),
            others: r.others.clone(),
        }
    }
}

impl From<&Bir> for BirDto {
    fn from(b: &Bir) -> Self {
        Self {
            version: b.version.as_ref().map(VersionDto::from),
            cbeff_version: b.cbeff_version.as_ref().map(VersionDto::from),
            bir_info: b.bir_info.as_ref().map(BirInfoDto::from),
            bdb_info: b.bdb_info.as_ref().map(BdbInfoDto::from),
            bdb: b.bdb.as_deref().map(b64),
            sb: b.sb.as_deref().map(b64),
            sb_info: b.sb_info.as_ref().map(|s| SbInfoDto {
                format: s.format.as_ref().map(RegistryIdDto::from),
            }),
            birs: b.birs.iter().map(BirDto::from).collect(),
            others: b.others.clone(),
        }
    }
}

impl From<&VersionType> for VersionDto {
    fn from(v: &VersionType) -> Self {
        Self {
            major: v.major,
            minor: v.minor,
        }
    }
}

impl From<&RegistryIdInfo> for RegistryIdDto {
    fn from(r: &RegistryIdInfo) -> Self {
        Self {
            organization: r.organization.clone(),
            type_code: r.type_code.clone(),
        }
    }
}

impl From<&BirInfo> for BirInfoDto {
    fn from(i: &BirInfo) -> Self {
        Self {
            creator: i.creator.clone(),
            index: i.index.clone(),
            payload: i.payload.as_deref().map(b64),
            integrity: i.integrity,
            creation_date: i.creation_date,
            not_valid_before: i.not_valid_before,
            not_valid_after: i.not_valid_after,
        }
    }
}

impl From<&BdbInfo> for BdbInfoDto {
    fn from(i: &BdbInfo) -> Self {
        let reg = |r: &Option<RegistryIdInfo>| r.as_ref().map(RegistryIdDto::from);
        Self {
            challenge_response: i.challenge_response.as_deref().map(b64),
            index: i.index.clone(),
            format: RegistryIdDto::from(&i.format),
            encryption: i.encryption,
            creation_date: i.creation_date,
            not_valid_before: i.not_valid_before,
            not_valid_after: i.not_valid_after,
            types: i.types.iter().map(|t| t.xml_value().to_string()).collect(),
            subtypes: i.subtypes.clone(),
            level: i.level.map(|l| l.xml_value().to_string()),
            product: reg(&i.product),
            capture_device: reg(&i.capture_device),
            feature_extraction_algorithm: reg(&i.feature_extraction_algorithm),
            comparison_algorithm: reg(&i.comparison_algorithm),
            compression_algorithm: reg(&i.compression_algorithm),
            purpose: i.purpose.map(|p| p.xml_value().to_string()),
            quality: i.quality.as_ref().map(|q| QualityDto {
                algorithm: q.algorithm.as_ref().map(RegistryIdDto::from),
                score: q.score,
                quality_calculation_failed: q.calculation_failed.clone(),
            }),
        }
    }
}

// ── DTO → Model ──

fn unb64(value: Option<String>) -> Result<Option<Vec<u8>>, BirError> {
    value.map(|v| STANDARD.decode(v.trim())).transpose().map_err(BirError::from)
}

impl TryFrom<RecordDto> for BiometricRecord {
    type Error = BirError;

    fn try_from(d: RecordDto) -> Result<Self, Self::Error> {
        Ok(Self {
            version: d.version.map(VersionType::from),
            cbeff_version: d.cbeff_version.map(VersionType::from),
            bir_info: d.bir_info.map(BirInfo::try_from).transpose()?,
            segments: d
                .birs
                .into_iter()
                .map(Bir::try_from)
                .collect::<Result<_, _>>()?,
            others: d.others,
        })
    }
}

impl TryFrom<BirDto> for Bir {
    type Error = BirError;

    fn try_from(d: BirDto) -> Result<Self, Self::Error> {
        Ok(Self {
            version: d.version.map(VersionType::from),
            cbeff_version: d.cbeff_version.map(VersionType::from),
            bir_info: d.bir_info.map(BirInfo::try_from).transpose()?,
            bdb_info: d.bdb_info.map(BdbInfo::try_from).transpose()?,
            bdb: unb64(d.bdb)?,
            sb: unb64(d.sb)?,
            sb_info: d.sb_info.map(|s| SbInfo {
                format: s.format.map(RegistryIdInfo::from),
            }),
            birs: d
                .birs
                .into_iter()
                .map(Bir::try_from)
                .collect::<Result<_, _>>()?,
            others: d.others,
        })
    }
}

impl From<VersionDto> for VersionType {
    fn from(d: VersionDto) -> Self {
        VersionType::new(d.major, d.minor)
    }
}

impl From<RegistryIdDto> for RegistryIdInfo {
    fn from(d: RegistryIdDto) -> Self {
        RegistryIdInfo::new(d.organization, d.type_code)
    }
}

impl TryFrom<BirInfoDto> for BirInfo {
    type Error = BirError;

    fn try_from(d: BirInfoDto) -> Result<Self, Self::Error> {
        Ok(Self {
            creator: d.creator,
            index: d.index,
            payload: unb64(d.payload)?,
            integrity: d.integrity,
            creation_date: d.creation_date,
            not_valid_before: d.not_valid_before,
            not_valid_after: d.not_valid_after,
        })
    }
}

impl TryFrom<BdbInfoDto> for BdbInfo {
    type Error = BirError;

    fn try_from(d: BdbInfoDto) -> Result<Self, Self::Error> {
        let unknown = |what: &str, v: &str| BirError::Encoding(format!("unknown {} '{}'", what, v));

        let types = d
            .types
            .iter()
            .map(|t| BiometricType::from_value(t).ok_or_else(|| unknown("biometric type", t)))
            .collect::<Result<Vec<_>, _>>()?;
        let level = d
            .level
            .as_deref()
            .map(|l| ProcessedLevel::from_value(l).ok_or_else(|| unknown("processed level", l)))
            .transpose()?;
        let purpose = d
            .purpose
            .as_deref()
            .map(|p| Purpose::from_value(p).ok_or_else(|| unknown("purpose", p)))
            .transpose()?;

        Ok(Self {
            challenge_response: unb64(d.challenge_response)?,
            index: d.index,
            format: d.format.into(),
            encryption: d.encryption,
            creation_date: d.creation_date,
            not_valid_before: d.not_valid_before,
            not_valid_after: d.not_valid_after,
            types,
            subtypes: d.subtypes,
            level,
            product: d.product.map(Into::into),
            capture_device: d.capture_device.map(Into::into),
            feature_extraction_algorithm: d.feature_extraction_algorithm.map(Into::into),
            comparison_algorithm: d.comparison_algorithm.map(Into::into),
            compression_algorithm: d.compression_algorithm.map(Into::into),
            purpose,
            quality: d.quality.map(|q| QualityType {
                algorithm: q.algorithm.map(Into::into),
                score: q.score,
                calculation_failed: q.quality_calculation_failed,
            }),
        })
    }
}
