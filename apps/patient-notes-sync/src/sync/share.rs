//! Selective sharing
//!
//! Only the chosen patients (and their notes) are ever pushed to a group.
//! Deletions are not propagated: dropping a patient locally leaves any copy
//! already shared with the group in place.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::records::{now_iso, Dataset, Note, Patient};

/// Marker written into `mode` so receivers know to merge rather than replace
pub const SHARE_MODE_MERGE: &str = "merge";

/// Payload version of a subset share
pub const SHARE_VERSION: u32 = 1;

/// A payload restricted to a caller-chosen set of patients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePayload {
    pub mode: String,
    pub version: u32,
    pub updated_at: String,
    pub patients: Vec<Patient>,
    pub notes: Vec<Note>,
}

/// Project the selected patients and their notes out of a dataset
pub fn build_subset(dataset: &Dataset, selected: &HashSet<String>) -> SharePayload {
    let patients: Vec<Patient> = dataset
        .patients
        .iter()
        .filter(|p| selected.contains(&p.id))
        .cloned()
        .collect();

    let notes: Vec<Note> = dataset
        .notes
        .iter()
        .filter(|n| selected.contains(&n.patient_id))
        .cloned()
        .collect();

    SharePayload {
        mode: SHARE_MODE_MERGE.to_string(),
        version: SHARE_VERSION,
        updated_at: now_iso(),
        patients,
        notes,
    }
}
