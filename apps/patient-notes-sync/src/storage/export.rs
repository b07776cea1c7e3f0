//! Whole-dataset export files

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::blob::StorageError;
use super::local::{backfill_group, open_document, LoadError};
use crate::crypto;
use crate::records::{now_iso, Dataset};

/// `type` tag of plaintext export documents
pub const EXPORT_TYPE: &str = "pn_export";
const EXPORT_VERSION: u32 = 1;

/// Plaintext export wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub created_at: String,
    pub data: Dataset,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("File is encrypted; a password is required")]
    Locked,

    #[error("Wrong password")]
    BadPassword,

    #[error("Invalid file: {0}")]
    Invalid(String),
}

impl From<LoadError> for ImportError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::Locked => ImportError::Locked,
            LoadError::BadPassword => ImportError::BadPassword,
            other => ImportError::Invalid(other.to_string()),
        }
    }
}

fn encrypts<'a>(dataset: &Dataset, passphrase: Option<&'a str>) -> Option<&'a str> {
    passphrase.filter(|p| dataset.settings.encryption_enabled && !p.is_empty())
}

/// Serialize a dataset for export, encrypted when encryption is on and a
/// passphrase is known
pub fn export(dataset: &Dataset, passphrase: Option<&str>) -> Result<String, StorageError> {
    if let Some(passphrase) = encrypts(dataset, passphrase) {
        let envelope = crypto::encrypt(&serde_json::to_string(dataset)?, passphrase);
        return Ok(serde_json::to_string_pretty(&envelope)?);
    }

    let document = ExportDocument {
        kind: EXPORT_TYPE.to_string(),
        version: EXPORT_VERSION,
        created_at: now_iso(),
        data: dataset.clone(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// `patient-notes-[enc-]YYYY-MM-DD.json`
pub fn export_file_name(date: NaiveDate, encrypted: bool) -> String {
    format!(
        "patient-notes-{}{}.json",
        if encrypted { "enc-" } else { "" },
        date.format("%Y-%m-%d")
    )
}

/// Read an export file (or a bare dataset document) back into a dataset
pub fn import(raw: &str, passphrase: Option<&str>) -> Result<Dataset, ImportError> {
    let (mut document, _) = open_document(raw, passphrase)?;

    let mut data = if document.get("data").is_some_and(Value::is_object) {
        document["data"].take()
    } else {
        document
    };

    let has_arrays = data.get("patients").is_some_and(Value::is_array)
        && data.get("notes").is_some_and(Value::is_array);
    if !has_arrays {
        return Err(ImportError::Invalid("expected patients and notes".to_string()));
    }

    backfill_group(&mut data);
    serde_json::from_value(data).map_err(|e| ImportError::Invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::NoteDraft;

    fn sample() -> Dataset {
        let mut dataset = Dataset::default();
        let id = dataset.add_patient("Malee");
        dataset.add_note(&id, NoteDraft::default());
        dataset
    }

    #[test]
    fn test_plain_export_round_trip() {
        let dataset = sample();
        let raw = export(&dataset, Some("unused")).unwrap();

        let document: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(document["type"], EXPORT_TYPE);
        assert_eq!(document["version"], 1);
        assert!(document["createdAt"].is_string());

        assert_eq!(import(&raw, None).unwrap(), dataset);
    }

    #[test]
    fn test_encrypted_export() {
        let mut dataset = sample();
        dataset.settings.encryption_enabled = true;
        let raw = export(&dataset, Some("pw")).unwrap();
        assert!(!raw.contains("Malee"));

        assert_eq!(import(&raw, None), Err(ImportError::Locked));
        assert_eq!(import(&raw, Some("nope")), Err(ImportError::BadPassword));
        assert_eq!(import(&raw, Some("pw")).unwrap(), dataset);
    }

    #[test]
    fn test_encryption_flag_without_passphrase_exports_plain() {
        let mut dataset = sample();
        dataset.settings.encryption_enabled = true;
        let raw = export(&dataset, None).unwrap();
        assert!(raw.contains(EXPORT_TYPE));
    }

    #[test]
    fn test_import_bare_dataset_backfills_group() {
        let dataset = import(r#"{"patients":[{"id":"p1"}],"notes":[]}"#, None).unwrap();
        assert_eq!(dataset.patients.len(), 1);
        assert!(!dataset.settings.group.is_configured());
    }

    #[test]
    fn test_import_rejects_incomplete_documents() {
        assert!(matches!(import(r#"{"patients":[]}"#, None), Err(ImportError::Invalid(_))));
        assert!(matches!(import(r#"{"data":{"notes":[]}}"#, None), Err(ImportError::Invalid(_))));
        assert!(matches!(import("[]", None), Err(ImportError::Invalid(_))));
        assert!(matches!(import("not json", None), Err(ImportError::Invalid(_))));
    }

    #[test]
    fn test_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_file_name(date, false), "patient-notes-2024-03-09.json");
        assert_eq!(export_file_name(date, true), "patient-notes-enc-2024-03-09.json");
    }
}
