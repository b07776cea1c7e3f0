//! Dataset mutations and queries
//!
//! Every mutation stamps `updatedAt`, which is what lets a later merge on
//! another device recognise the edit as newer.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::types::{Dataset, History, Note, Patient, Soap, DEFAULT_PATIENT_COLOR};

/// Current time as an RFC 3339 string with millisecond precision
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Changes to apply to a patient; `None` leaves a field as it is
#[derive(Debug, Clone, Default)]
pub struct PatientPatch {
    pub name: Option<String>,
    pub hn: Option<String>,
    pub sex: Option<String>,
    pub dob: Option<String>,
    pub tags: Option<Vec<String>>,
    pub color: Option<String>,
    pub cc: Option<String>,
    pub ud: Option<String>,
    pub history: Option<History>,
    pub attachments: Option<Vec<Value>>,
}

/// Contents of a new note
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub timestamp: Option<String>,
    pub author: Option<String>,
    pub vitals: BTreeMap<String, String>,
    pub soap: Soap,
    pub meds: Option<String>,
    pub attachments: Vec<Value>,
}

/// Changes to apply to a note
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub timestamp: Option<String>,
    pub author: Option<String>,
    pub vitals: Option<BTreeMap<String, String>>,
    pub soap: Option<Soap>,
    pub meds: Option<String>,
    pub attachments: Option<Vec<Value>>,
}

impl PatientPatch {
    fn apply(self, patient: &mut Patient) {
        patient.name = self.name.or(patient.name.take());
        patient.hn = self.hn.or(patient.hn.take());
        patient.sex = self.sex.or(patient.sex.take());
        patient.dob = self.dob.or(patient.dob.take());
        patient.tags = self.tags.or(patient.tags.take());
        patient.color = self.color.or(patient.color.take());
        patient.cc = self.cc.or(patient.cc.take());
        patient.ud = self.ud.or(patient.ud.take());
        patient.history = self.history.or(patient.history.take());
        patient.attachments = self.attachments.or(patient.attachments.take());
    }
}

impl NotePatch {
    fn apply(self, note: &mut Note) {
        note.timestamp = self.timestamp.or(note.timestamp.take());
        note.author = self.author.or(note.author.take());
        note.vitals = self.vitals.or(note.vitals.take());
        note.soap = self.soap.or(note.soap.take());
        note.meds = self.meds.or(note.meds.take());
        note.attachments = self.attachments.or(note.attachments.take());
    }
}

impl Dataset {
    /// Create a patient at the front of the list and return its id
    pub fn add_patient(&mut self, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let now = now_iso();

        self.patients.insert(
            0,
            Patient {
                id: id.clone(),
                name: Some(name.to_string()),
                hn: Some(String::new()),
                sex: Some(String::new()),
                dob: Some(String::new()),
                tags: Some(Vec::new()),
                color: Some(DEFAULT_PATIENT_COLOR.to_string()),
                cc: Some(String::new()),
                ud: Some(String::new()),
                history: Some(History::default()),
                attachments: Some(Vec::new()),
                created_at: Some(now.clone()),
                updated_at: Some(now),
                ..Default::default()
            },
        );

        id
    }

    /// Apply a patch and stamp `updatedAt`. Returns `false` for an unknown id.
    pub fn update_patient(&mut self, id: &str, patch: PatientPatch) -> bool {
        let Some(patient) = self.patients.iter_mut().find(|p| p.id == id) else {
            return false;
        };

        patch.apply(patient);
        patient.updated_at = Some(now_iso());
        true
    }

    /// Remove a patient together with all of their notes
    pub fn remove_patient(&mut self, id: &str) -> bool {
        let before = self.patients.len();
        self.patients.retain(|p| p.id != id);
        self.notes.retain(|n| n.patient_id != id);
        self.patients.len() != before
    }

    /// Create a note for a patient at the front of the list and return its id
    pub fn add_note(&mut self, patient_id: &str, draft: NoteDraft) -> String {
        let id = Uuid::new_v4().to_string();
        let now = now_iso();

        self.notes.insert(
            0,
            Note {
                id: id.clone(),
                patient_id: patient_id.to_string(),
                timestamp: Some(draft.timestamp.unwrap_or_else(|| now.clone())),
                author: draft.author,
                vitals: Some(draft.vitals),
                soap: Some(draft.soap),
                meds: draft.meds,
                attachments: Some(draft.attachments),
                created_at: Some(now),
                ..Default::default()
            },
        );

        id
    }

    /// Apply a patch to a note and stamp `updatedAt`
    pub fn update_note(&mut self, id: &str, patch: NotePatch) -> bool {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return false;
        };

        patch.apply(note);
        note.updated_at = Some(now_iso());
        true
    }

    pub fn remove_note(&mut self, id: &str) -> bool {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        self.notes.len() != before
    }

    /// Case-insensitive search over name, HN, chief complaint and underlying disease
    pub fn search_patients(&self, query: &str) -> Vec<&Patient> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.patients.iter().collect();
        }

        self.patients
            .iter()
            .filter(|p| {
                [&p.name, &p.hn, &p.cc, &p.ud]
                    .iter()
                    .any(|field| field.as_deref().is_some_and(|v| v.to_lowercase().contains(&needle)))
            })
            .collect()
    }

    /// A patient's notes, newest first
    pub fn notes_for_patient(&self, patient_id: &str) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self
            .notes
            .iter()
            .filter(|n| n.patient_id == patient_id)
            .collect();
        notes.sort_by_key(|n| std::cmp::Reverse(n.freshness()));
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_update_patient_stamps_updated_at() {
        let mut dataset = Dataset::default();
        let id = dataset.add_patient("New patient");

        let created = dataset.patient(&id).unwrap().clone();
        assert_eq!(created.color.as_deref(), Some(DEFAULT_PATIENT_COLOR));
        assert_eq!(created.created_at, created.updated_at);

        std::thread::sleep(std::time::Duration::from_millis(5));
        let found = dataset.update_patient(
            &id,
            PatientPatch {
                cc: Some("chest pain".into()),
                ..Default::default()
            },
        );
        assert!(found);

        let updated = dataset.patient(&id).unwrap();
        assert_eq!(updated.cc.as_deref(), Some("chest pain"));
        assert_eq!(updated.name.as_deref(), Some("New patient"));
        assert!(updated.freshness() > created.freshness());

        assert!(!dataset.update_patient("missing", PatientPatch::default()));
    }

    #[test]
    fn test_remove_patient_cascades_to_notes() {
        let mut dataset = Dataset::default();
        let keep = dataset.add_patient("Keep");
        let drop = dataset.add_patient("Drop");
        dataset.add_note(&keep, NoteDraft::default());
        dataset.add_note(&drop, NoteDraft::default());
        dataset.add_note(&drop, NoteDraft::default());

        assert!(dataset.remove_patient(&drop));
        assert_eq!(dataset.patients.len(), 1);
        assert_eq!(dataset.notes.len(), 1);
        assert_eq!(dataset.notes[0].patient_id, keep);
        assert!(!dataset.remove_patient(&drop));
    }

    #[test]
    fn test_notes_for_patient_newest_first_and_skips_orphans() {
        let mut dataset = Dataset::default();
        let pid = dataset.add_patient("A");
        for ts in ["2024-01-01T00:00:00Z", "2024-03-01T00:00:00Z", "2024-02-01T00:00:00Z"] {
            dataset.add_note(
                &pid,
                NoteDraft {
                    timestamp: Some(ts.into()),
                    ..Default::default()
                },
            );
        }
        dataset.add_note("ghost", NoteDraft::default());

        let notes = dataset.notes_for_patient(&pid);
        let stamps: Vec<_> = notes.iter().map(|n| n.timestamp.clone().unwrap()).collect();
        assert_eq!(
            stamps,
            vec!["2024-03-01T00:00:00Z", "2024-02-01T00:00:00Z", "2024-01-01T00:00:00Z"]
        );
        assert_eq!(dataset.notes.len(), 4);
    }

    #[test]
    fn test_update_and_remove_note() {
        let mut dataset = Dataset::default();
        let pid = dataset.add_patient("A");
        let nid = dataset.add_note(&pid, NoteDraft::default());
        assert!(dataset.note(&nid).unwrap().updated_at.is_none());

        assert!(dataset.update_note(
            &nid,
            NotePatch {
                meds: Some("paracetamol".into()),
                ..Default::default()
            }
        ));
        let note = dataset.note(&nid).unwrap();
        assert_eq!(note.meds.as_deref(), Some("paracetamol"));
        assert!(note.updated_at.is_some());

        assert!(dataset.remove_note(&nid));
        assert!(dataset.note(&nid).is_none());
    }

    #[test]
    fn test_search_patients() {
        let mut dataset = Dataset::default();
        let a = dataset.add_patient("Somchai Dee");
        let b = dataset.add_patient("Malee");
        dataset.update_patient(
            &b,
            PatientPatch {
                ud: Some("DM, HT".into()),
                ..Default::default()
            },
        );

        assert_eq!(dataset.search_patients("   ").len(), 2);
        let hits: Vec<_> = dataset.search_patients("somCHAI").iter().map(|p| p.id.clone()).collect();
        assert_eq!(hits, vec![a]);
        let hits: Vec<_> = dataset.search_patients("dm").iter().map(|p| p.id.clone()).collect();
        assert_eq!(hits, vec![b]);
    }
}
