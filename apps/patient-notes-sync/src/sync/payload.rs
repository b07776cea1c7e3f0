//! Decoding of pulled group payloads
//!
//! Groups may hold any of the shapes devices have pushed over time: an
//! encrypted envelope, a subset share, a bare dataset, or an export-style
//! wrapper with the dataset under `data`.

use serde_json::Value;
use thiserror::Error;

use super::merge::Incoming;
use super::share::SHARE_MODE_MERGE;
use crate::crypto::{self, EncryptedEnvelope};

/// Why a pulled payload could not be turned into records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Group has no shared data yet")]
    Empty,

    #[error("Payload is encrypted and no password is set")]
    Locked,

    #[error("Could not decrypt payload (wrong password?)")]
    BadPassword,

    #[error("Invalid payload: {0}")]
    Invalid(String),
}

/// Turn a group payload into records ready for merging
pub fn decode_incoming(payload: &Value, passphrase: Option<&str>) -> Result<Incoming, PayloadError> {
    if payload.is_null() {
        return Err(PayloadError::Empty);
    }

    if let Some(envelope) = EncryptedEnvelope::from_value(payload) {
        let passphrase = passphrase.filter(|p| !p.is_empty()).ok_or(PayloadError::Locked)?;
        let envelope = envelope.map_err(|_| PayloadError::BadPassword)?;
        let plaintext =
            crypto::decrypt(&envelope, passphrase).map_err(|_| PayloadError::BadPassword)?;
        let document: Value = serde_json::from_str(&plaintext)
            .map_err(|e| PayloadError::Invalid(e.to_string()))?;

        let inner = document.get("data").filter(|d| d.is_object()).unwrap_or(&document);
        return records_from(inner, false);
    }

    if payload.get("mode").and_then(Value::as_str) == Some(SHARE_MODE_MERGE)
        && (payload.get("patients").is_some() || payload.get("notes").is_some())
    {
        return records_from(payload, false);
    }

    if has_both_collections(payload) {
        return records_from(payload, true);
    }

    if let Some(data) = payload.get("data").filter(|d| has_both_collections(d)) {
        return records_from(data, true);
    }

    Err(PayloadError::Invalid(
        "expected patients and notes".to_string(),
    ))
}

fn has_both_collections(value: &Value) -> bool {
    value.get("patients").is_some_and(Value::is_array) && value.get("notes").is_some_and(Value::is_array)
}

fn records_from(value: &Value, require_both: bool) -> Result<Incoming, PayloadError> {
    if require_both && !has_both_collections(value) {
        return Err(PayloadError::Invalid("expected patients and notes".to_string()));
    }

    let patients = match value.get("patients") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| PayloadError::Invalid(format!("patients: {}", e)))?,
    };
    let notes = match value.get("notes") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| PayloadError::Invalid(format!("notes: {}", e)))?,
    };

    Ok(Incoming { patients, notes })
}
