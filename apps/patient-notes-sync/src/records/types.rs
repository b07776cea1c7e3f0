//! Dataset types
//!
//! Field names follow the JSON written by every device (`camelCase`), so a
//! dataset saved here can be pulled by any other client of the group API.
//! Fields are optional wherever a device may legitimately omit them; the
//! shallow merge relies on telling "absent" apart from "present".

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Display colour given to new patients
pub const DEFAULT_PATIENT_COLOR: &str = "#22c55e";

/// A patient chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Hospital number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Chief complaint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    /// Underlying disease
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ud: Option<String>,
    #[serde(default, rename = "hx", alias = "history", skip_serializing_if = "Option::is_none")]
    pub history: Option<History>,
    /// Opaque attachment blobs; never inspected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Fields written by other client versions, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Structured history, one free-text field per section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meds: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gyn_obs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menstrual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sexual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immun: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// SOAP sections of a progress note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Soap {
    #[serde(rename = "S", default)]
    pub subjective: String,
    #[serde(rename = "O", default)]
    pub objective: String,
    #[serde(rename = "A", default)]
    pub assessment: String,
    #[serde(rename = "P", default)]
    pub plan: String,
}

/// A clinical note attached to a patient
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    /// Owning patient; not enforced, orphans are kept and hidden on display
    #[serde(default)]
    pub patient_id: String,
    /// Authoring time; also the merge ordering key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Sparse vitals (`bp`, `hr`, `rr`, `t`, `sat`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vitals: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soap: Option<Soap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meds: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Remote group this device syncs with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSettings {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pass: String,
    /// Last group version this device pulled or pushed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl GroupSettings {
    pub fn is_configured(&self) -> bool {
        !self.id.is_empty() && !self.pass.is_empty()
    }
}

/// Per-device settings stored alongside the records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub encryption_enabled: bool,
    #[serde(default)]
    pub group: GroupSettings,
}

/// The full local collection: patients, notes and settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub settings: Settings,
}

impl Dataset {
    pub fn patient(&self, id: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id == id)
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }
}

/// Parse a record timestamp into milliseconds since the epoch.
///
/// Missing or unparsable timestamps count as the epoch, so a record without a
/// usable time never beats one that has it.
pub fn freshness(timestamp: Option<&str>) -> i64 {
    let Some(raw) = timestamp.map(str::trim).filter(|s| !s.is_empty()) else {
        return 0;
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc).timestamp_millis();
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

impl Patient {
    /// Merge ordering key: `updatedAt`, falling back to `createdAt`
    pub fn freshness(&self) -> i64 {
        let updated_at = self.updated_at.as_deref().filter(|s| !s.trim().is_empty());
        freshness(updated_at.or(self.created_at.as_deref()))
    }
}

impl Note {
    /// Merge ordering key: the authoring `timestamp`
    pub fn freshness(&self) -> i64 {
        freshness(self.timestamp.as_deref())
    }
}
