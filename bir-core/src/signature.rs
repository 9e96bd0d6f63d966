//! Detached-payload JWS reconstruction for signed segments.
//!
//! A signed leaf stores its JWS in `SB` with the payload segment removed
//! (`header..signature`). The payload lives in `Others[PAYLOAD]` as a JSON
//! template whose `<bioValue>` placeholders stand for the BDB. Rebuilding the
//! token means encoding the BDB, filling the template, encoding the filled
//! template and splicing it back between the two dots.
//!
//! The signed payload embeds a `digitalId` (itself a JWS issued to the capture
//! device). Its certificate chain must be contained in the outer token's chain.
//! The signature bytes themselves are verified by the key-management service,
//! not here.

use crate::error::{BirError, SignatureError};
use crate::model::{Bir, PAYLOAD_KEY};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::collections::HashSet;

/// Placeholder replaced by the encoded BDB inside the payload template.
pub const BIO_VALUE_PLACEHOLDER: &str = "<bioValue>";

const DIGITAL_ID_FIELD: &str = "digitalId";
const CERT_CHAIN_FIELD: &str = "x5c";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedToken {
    /// Three-part compact JWS.
    pub token: String,
    /// Filled payload JSON, before encoding.
    pub payload: String,
}

/// Splice the encoded payload back into the detached JWS stored in `SB`.
pub fn reconstruct_token(bir: &Bir) -> Result<ReconstructedToken, BirError> {
    if bir.others.is_empty() {
        return Err(SignatureError::MissingOthers.into());
    }
    let template = bir
        .others
        .get(PAYLOAD_KEY)
        .ok_or(SignatureError::MissingPayload)?;

    let sb = bir
        .sb
        .as_deref()
        .filter(|sb| !sb.is_empty())
        .ok_or(SignatureError::MissingSignatureBlock)?;
    let envelope = std::str::from_utf8(sb)
        .map_err(|e| SignatureError::MalformedEnvelope(format!("SB is not UTF-8: {}", e)))?;

    let (header, signature) = envelope.split_once("..").ok_or_else(|| {
        SignatureError::MalformedEnvelope("expected detached payload form header..signature".into())
    })?;
    if header.is_empty() || header.contains('.') {
        return Err(SignatureError::MalformedEnvelope("header segment is malformed".into()).into());
    }

    let encoded_bdb = URL_SAFE_NO_PAD.encode(bir.bdb.as_deref().unwrap_or_default());
    let payload = template.replace(BIO_VALUE_PLACEHOLDER, &encoded_bdb);
    let encoded_payload = URL_SAFE_NO_PAD.encode(payload.as_bytes());

    Ok(ReconstructedToken {
        token: format!("{}.{}.{}", header, encoded_payload, signature),
        payload,
    })
}

/// Require every certificate in the inner token's `x5c` chain to appear in
/// the outer token's chain.
pub fn verify_certificate_chain(inner_token: &str, outer_token: &str) -> Result<(), BirError> {
    let inner = certificate_chain(inner_token)?;
    let outer = certificate_chain(outer_token)?;
    if inner.is_subset(&outer) {
        Ok(())
    } else {
        Err(SignatureError::CertificateMismatch.into())
    }
}

/// Reconstruct the token and cross-check it against the embedded `digitalId`.
pub fn validate_signature(bir: &Bir) -> Result<ReconstructedToken, BirError> {
    let rebuilt = reconstruct_token(bir)?;

    let payload: serde_json::Value = serde_json::from_str(&rebuilt.payload)
        .map_err(|e| SignatureError::MalformedPayload(e.to_string()))?;
    let digital_id = payload
        .get(DIGITAL_ID_FIELD)
        .and_then(|v| v.as_str())
        .ok_or(SignatureError::MissingDigitalId)?;

    verify_certificate_chain(digital_id, &rebuilt.token)?;
    tracing::debug!("segment signature envelope reconstructed and certificate chain matched");
    Ok(rebuilt)
}

fn certificate_chain(token: &str) -> Result<HashSet<String>, SignatureError> {
    let header = token
        .split('.')
        .next()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| SignatureError::MalformedEnvelope("token has no header".into()))?;
    let decoded = URL_SAFE_NO_PAD
        .decode(header.trim_end_matches('='))
        .map_err(|e| SignatureError::MalformedEnvelope(format!("header is not base64url: {}", e)))?;
    let header: serde_json::Value = serde_json::from_slice(&decoded)
        .map_err(|e| SignatureError::MalformedEnvelope(format!("header is not JSON: {}", e)))?;

    let chain = header
        .get(CERT_CHAIN_FIELD)
        .and_then(|v| v.as_array())
        .ok_or(SignatureError::MissingCertificateChain)?;

    Ok(chain
        .iter()
        .filter_map(|c| c.as_str().map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BdbInfo, BiometricType, RegistryIdInfo};
    use serde_json::json;

    fn header_with(certs: &[&str]) -> String {
        URL_SAFE_NO_PAD.encode(json!({"alg": "RS256", "x5c": certs}).to_string())
    }

    fn token_with(certs: &[&str]) -> String {
        format!("{}.{}.{}", header_with(certs), URL_SAFE_NO_PAD.encode("{}"), "sig")
    }

    fn signed_leaf(outer_certs: &[&str], inner_certs: &[&str]) -> Bir {
        let template = json!({
            "bioValue": BIO_VALUE_PLACEHOLDER,
            "bioSubType": "Left IndexFinger",
            "digitalId": token_with(inner_certs),
        })
        .to_string();
        let mut bir = Bir::leaf(
            BdbInfo {
                format: RegistryIdInfo::new("Mosip", "7"),
                types: vec![BiometricType::Finger],
                ..Default::default()
            },
            vec![0xde, 0xad, 0xbe, 0xef],
        )
        .with_other(PAYLOAD_KEY, template);
        bir.sb = Some(format!("{}..c2lnbmF0dXJl", header_with(outer_certs)).into_bytes());
        bir
    }

    #[test]
    fn reconstructs_three_part_token() {
        let bir = signed_leaf(&["A", "B"], &["A"]);
        let rebuilt = reconstruct_token(&bir).unwrap();

        let parts: Vec<&str> = rebuilt.token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], header_with(&["A", "B"]));
        assert_eq!(parts[2], "c2lnbmF0dXJl");

        let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        assert_eq!(String::from_utf8(payload).unwrap(), rebuilt.payload);
        assert!(rebuilt.payload.contains(&URL_SAFE_NO_PAD.encode([0xde, 0xad, 0xbe, 0xef])));
        assert!(!rebuilt.payload.contains(BIO_VALUE_PLACEHOLDER));
    }

    #[test]
    fn replaces_every_placeholder() {
        let mut bir = signed_leaf(&["A"], &["A"]);
        bir.others.insert(
            PAYLOAD_KEY.into(),
            format!("{}|{}", BIO_VALUE_PLACEHOLDER, BIO_VALUE_PLACEHOLDER),
        );
        let rebuilt = reconstruct_token(&bir).unwrap();
        let bdb = URL_SAFE_NO_PAD.encode([0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(rebuilt.payload, format!("{}|{}", bdb, bdb));
    }

    #[test]
    fn inner_subset_of_outer_passes() {
        let bir = signed_leaf(&["A", "B"], &["A"]);
        assert!(validate_signature(&bir).is_ok());
    }

    #[test]
    fn inner_superset_of_outer_fails() {
        let bir = signed_leaf(&["A"], &["A", "B"]);
        match validate_signature(&bir) {
            Err(BirError::Signature(SignatureError::CertificateMismatch)) => {}
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn chain_comparison_direct() {
        assert!(verify_certificate_chain(&token_with(&["A"]), &token_with(&["A", "B"])).is_ok());
        assert!(verify_certificate_chain(&token_with(&["A", "B"]), &token_with(&["A"])).is_err());
    }

    #[test]
    fn empty_others_fails_first() {
        let mut bir = signed_leaf(&["A"], &["A"]);
        bir.others.clear();
        bir.sb = None;
        match reconstruct_token(&bir) {
            Err(BirError::Signature(SignatureError::MissingOthers)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn missing_payload_entry_fails() {
        let mut bir = signed_leaf(&["A"], &["A"]);
        bir.others.remove(PAYLOAD_KEY);
        bir.others.insert("EXCEPTION".into(), "false".into());
        match reconstruct_token(&bir) {
            Err(BirError::Signature(SignatureError::MissingPayload)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn attached_payload_envelope_is_rejected() {
        let mut bir = signed_leaf(&["A"], &["A"]);
        bir.sb = Some(b"aGVhZGVy.cGF5bG9hZA.c2ln".to_vec());
        assert!(matches!(
            reconstruct_token(&bir),
            Err(BirError::Signature(SignatureError::MalformedEnvelope(_)))
        ));
    }

    #[test]
    fn payload_without_digital_id_fails() {
        let mut bir = signed_leaf(&["A"], &["A"]);
        bir.others
            .insert(PAYLOAD_KEY.into(), json!({"bioValue": BIO_VALUE_PLACEHOLDER}).to_string());
        assert!(matches!(
            validate_signature(&bir),
            Err(BirError::Signature(SignatureError::MissingDigitalId))
        ));
    }
}
