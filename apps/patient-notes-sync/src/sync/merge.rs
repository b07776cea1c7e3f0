//! Dataset reconciliation
//!
//! Last-write-wins at whole-record granularity. For every incoming record:
//! - unknown id: inserted as-is
//! - known id and strictly newer: shallow overlay of incoming onto local
//! - known id and not newer (ties included): local kept unchanged
//!
//! Two devices editing different fields of the same record between syncs will
//! lose one side's edit. That is the accepted cost of record-level LWW.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::records::{Dataset, Note, Patient};

/// Records received from another device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Incoming {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// Counts reported back to the user after a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    pub new_patients: usize,
    pub updated_patients: usize,
    pub new_notes: usize,
    pub updated_notes: usize,
}

impl MergeStats {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patients +{} new, {} updated; notes +{} new, {} updated",
            self.new_patients, self.updated_patients, self.new_notes, self.updated_notes
        )
    }
}

/// Result of a merge: the new dataset and what changed
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub merged: Dataset,
    pub stats: MergeStats,
}

/// A record that can take part in last-write-wins reconciliation
pub trait Mergeable: Clone {
    fn record_id(&self) -> &str;

    /// Ordering key in milliseconds since the epoch
    fn freshness(&self) -> i64;

    /// `{...self, ...incoming}`: fields present in `incoming` win, the rest are kept
    fn overlay(&self, incoming: &Self) -> Self;
}

fn pick<T: Clone>(incoming: &Option<T>, local: &Option<T>) -> Option<T> {
    incoming.as_ref().or(local.as_ref()).cloned()
}

fn overlay_extra(
    local: &Map<String, serde_json::Value>,
    incoming: &Map<String, serde_json::Value>,
) -> Map<String, serde_json::Value> {
    let mut merged = local.clone();
    for (key, value) in incoming {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

impl Mergeable for Patient {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn freshness(&self) -> i64 {
        Patient::freshness(self)
    }

    fn overlay(&self, incoming: &Self) -> Self {
        Patient {
            id: self.id.clone(),
            name: pick(&incoming.name, &self.name),
            hn: pick(&incoming.hn, &self.hn),
            sex: pick(&incoming.sex, &self.sex),
            dob: pick(&incoming.dob, &self.dob),
            tags: pick(&incoming.tags, &self.tags),
            color: pick(&incoming.color, &self.color),
            cc: pick(&incoming.cc, &self.cc),
            ud: pick(&incoming.ud, &self.ud),
            history: pick(&incoming.history, &self.history),
            attachments: pick(&incoming.attachments, &self.attachments),
            created_at: pick(&incoming.created_at, &self.created_at),
            updated_at: pick(&incoming.updated_at, &self.updated_at),
            extra: overlay_extra(&self.extra, &incoming.extra),
        }
    }
}

impl Mergeable for Note {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn freshness(&self) -> i64 {
        Note::freshness(self)
    }

    fn overlay(&self, incoming: &Self) -> Self {
        let patient_id = if incoming.patient_id.is_empty() {
            self.patient_id.clone()
        } else {
            incoming.patient_id.clone()
        };

        Note {
            id: self.id.clone(),
            patient_id,
            timestamp: pick(&incoming.timestamp, &self.timestamp),
            author: pick(&incoming.author, &self.author),
            vitals: pick(&incoming.vitals, &self.vitals),
            soap: pick(&incoming.soap, &self.soap),
            meds: pick(&incoming.meds, &self.meds),
            attachments: pick(&incoming.attachments, &self.attachments),
            created_at: pick(&incoming.created_at, &self.created_at),
            updated_at: pick(&incoming.updated_at, &self.updated_at),
            extra: overlay_extra(&self.extra, &incoming.extra),
        }
    }
}

/// Reconcile one collection. Returns the merged records plus (new, updated) counts.
///
/// Local records keep their order; new records are appended in arrival order.
pub fn merge_records<T: Mergeable>(local: &[T], incoming: &[T]) -> (Vec<T>, usize, usize) {
    let mut merged: Vec<T> = local.to_vec();
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, r)| (r.record_id().to_string(), i))
        .collect();

    let mut added = 0;
    let mut updated = 0;

    for record in incoming {
        match index.get(record.record_id()) {
            None => {
                index.insert(record.record_id().to_string(), merged.len());
                merged.push(record.clone());
                added += 1;
            }
            Some(&i) => {
                if record.freshness() > merged[i].freshness() {
                    merged[i] = merged[i].overlay(record);
                    updated += 1;
                }
            }
        }
    }

    (merged, added, updated)
}

/// Merge incoming records into a copy of the local dataset.
///
/// Never fails, never drops an id present on either side, and leaves both
/// inputs untouched. Settings always come from `local`.
pub fn merge(local: &Dataset, incoming: &Incoming) -> MergeOutcome {
    let (patients, new_patients, updated_patients) =
        merge_records(&local.patients, &incoming.patients);
    let (notes, new_notes, updated_notes) = merge_records(&local.notes, &incoming.notes);

    let stats = MergeStats {
        new_patients,
        updated_patients,
        new_notes,
        updated_notes,
    };
    tracing::debug!("Merged incoming records: {}", stats);

    MergeOutcome {
        merged: Dataset {
            patients,
            notes,
            settings: local.settings.clone(),
        },
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn patient(id: &str, updated_at: &str) -> Patient {
        Patient {
            id: id.to_string(),
            name: Some(format!("patient {}", id)),
            updated_at: Some(updated_at.to_string()),
            ..Default::default()
        }
    }

    fn note(id: &str, patient_id: &str, timestamp: &str) -> Note {
        Note {
            id: id.to_string(),
            patient_id: patient_id.to_string(),
            timestamp: Some(timestamp.to_string()),
            ..Default::default()
        }
    }

    fn sample_dataset() -> Dataset {
        Dataset {
            patients: vec![
                patient("p1", "2024-01-01T00:00:00Z"),
                patient("p2", "2024-01-02T00:00:00Z"),
            ],
            notes: vec![note("n1", "p1", "2024-01-01T10:00:00Z")],
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_with_nothing_is_identity() {
        let local = sample_dataset();
        let outcome = merge(&local, &Incoming::default());

        assert_eq!(outcome.merged, local);
        assert!(outcome.stats.is_empty());
    }

    #[test]
    fn test_new_records_inserted_verbatim() {
        let local = sample_dataset();
        let incoming = Incoming {
            patients: vec![patient("p3", "2020-01-01T00:00:00Z")],
            notes: vec![note("n2", "p3", "2020-01-01T00:00:00Z")],
        };

        let outcome = merge(&local, &incoming);
        assert_eq!(outcome.merged.patient("p3"), Some(&incoming.patients[0]));
        assert_eq!(outcome.merged.note("n2"), Some(&incoming.notes[0]));
        assert_eq!(outcome.stats.new_patients, 1);
        assert_eq!(outcome.stats.new_notes, 1);
        assert_eq!(outcome.stats.updated_patients, 0);
    }

    #[test]
    fn test_newer_incoming_overlays_and_keeps_absent_fields() {
        let mut local = sample_dataset();
        local.patients[0].cc = Some("fever".into());
        local.patients[0].hn = Some("HN-1".into());

        let incoming = Incoming {
            patients: vec![Patient {
                id: "p1".into(),
                cc: Some("cough".into()),
                updated_at: Some("2024-02-01T00:00:00Z".into()),
                ..Default::default()
            }],
            notes: vec![],
        };

        let outcome = merge(&local, &incoming);
        let merged = outcome.merged.patient("p1").unwrap();
        assert_eq!(merged.cc.as_deref(), Some("cough"));
        assert_eq!(merged.hn.as_deref(), Some("HN-1"));
        assert_eq!(merged.name.as_deref(), Some("patient p1"));
        assert_eq!(merged.updated_at.as_deref(), Some("2024-02-01T00:00:00Z"));
        assert_eq!(outcome.stats.updated_patients, 1);
    }

    #[test]
    fn test_older_or_equal_incoming_leaves_local_untouched() {
        let local = sample_dataset();

        let mut older = patient("p1", "2023-12-31T00:00:00Z");
        older.cc = Some("stale".into());
        let mut tied = patient("p2", "2024-01-02T00:00:00Z");
        tied.cc = Some("tie".into());
        let mut tied_note = note("n1", "p1", "2024-01-01T10:00:00Z");
        tied_note.meds = Some("tie".into());

        let incoming = Incoming {
            patients: vec![older, tied],
            notes: vec![tied_note],
        };

        let outcome = merge(&local, &incoming);
        assert_eq!(outcome.merged, local);
        assert!(outcome.stats.is_empty());
    }

    #[test]
    fn test_patient_without_updated_at_uses_created_at() {
        let local = Dataset {
            patients: vec![Patient {
                id: "p1".into(),
                created_at: Some("2024-01-05T00:00:00Z".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let incoming = Incoming {
            patients: vec![patient("p1", "2024-01-04T00:00:00Z")],
            notes: vec![],
        };

        let outcome = merge(&local, &incoming);
        assert_eq!(outcome.merged, local);
    }

    #[test]
    fn test_missing_timestamps_count_as_epoch() {
        let local = Dataset {
            notes: vec![Note {
                id: "n1".into(),
                patient_id: "p1".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let incoming = Incoming {
            patients: vec![],
            notes: vec![note("n1", "", "1970-01-01T00:00:00.001Z")],
        };

        let outcome = merge(&local, &incoming);
        let merged = outcome.merged.note("n1").unwrap();
        assert_eq!(merged.patient_id, "p1");
        assert_eq!(outcome.stats.updated_notes, 1);
    }

    #[test]
    fn test_no_id_is_ever_dropped() {
        let local = sample_dataset();
        let incoming = Incoming {
            patients: vec![
                patient("p2", "2030-01-01T00:00:00Z"),
                patient("p9", "2000-01-01T00:00:00Z"),
            ],
            notes: vec![note("n7", "p9", "2000-01-01T00:00:00Z")],
        };

        let outcome = merge(&local, &incoming);
        let patient_ids: HashSet<_> = outcome.merged.patients.iter().map(|p| p.id.as_str()).collect();
        let note_ids: HashSet<_> = outcome.merged.notes.iter().map(|n| n.id.as_str()).collect();

        for id in local.patients.iter().chain(&incoming.patients).map(|p| p.id.as_str()) {
            assert!(patient_ids.contains(id), "patient {} dropped", id);
        }
        for id in local.notes.iter().chain(&incoming.notes).map(|n| n.id.as_str()) {
            assert!(note_ids.contains(id), "note {} dropped", id);
        }
        assert_eq!(outcome.merged.patients.len(), 3);
    }

    #[test]
    fn test_inputs_not_mutated_and_result_deterministic() {
        let local = sample_dataset();
        let incoming = Incoming {
            patients: vec![patient("p1", "2025-01-01T00:00:00Z"), patient("p4", "2025-01-01T00:00:00Z")],
            notes: vec![note("n1", "p1", "2025-01-01T00:00:00Z")],
        };
        let local_before = local.clone();
        let incoming_before = incoming.clone();

        let first = merge(&local, &incoming);
        let second = merge(&local, &incoming);

        assert_eq!(local, local_before);
        assert_eq!(incoming, incoming_before);
        assert_eq!(first.merged, second.merged);
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn test_duplicate_incoming_ids_compare_against_first_arrival() {
        let incoming = Incoming {
            patients: vec![
                patient("p5", "2024-01-01T00:00:00Z"),
                patient("p5", "2024-06-01T00:00:00Z"),
            ],
            notes: vec![],
        };

        let outcome = merge(&Dataset::default(), &incoming);
        assert_eq!(outcome.merged.patients.len(), 1);
        assert_eq!(
            outcome.merged.patients[0].updated_at.as_deref(),
            Some("2024-06-01T00:00:00Z")
        );
        assert_eq!(outcome.stats.new_patients, 1);
        assert_eq!(outcome.stats.updated_patients, 1);
    }

    #[test]
    fn test_concurrent_edit_keeps_later_device() {
        // Device A edited p1 at T1 and pushed; device B edited cc at T2 (T0 < T2 < T1)
        // and now pulls A's push before pushing its own change.
        let t0 = "2024-05-01T08:00:00Z";
        let t2 = "2024-05-01T09:00:00Z";
        let t1 = "2024-05-01T10:00:00Z";

        let mut from_a = patient("p1", t1);
        from_a.cc = Some("edited on A".into());
        from_a.created_at = Some(t0.into());

        let mut on_b = patient("p1", t2);
        on_b.cc = Some("edited on B".into());
        on_b.created_at = Some(t0.into());
        let device_b = Dataset {
            patients: vec![on_b],
            ..Default::default()
        };

        let outcome = merge(
            &device_b,
            &Incoming {
                patients: vec![from_a.clone()],
                notes: vec![],
            },
        );

        assert_eq!(outcome.merged.patient("p1"), Some(&from_a));
        assert_eq!(outcome.stats.updated_patients, 1);
        assert_eq!(outcome.stats.new_patients, 0);
    }

    #[test]
    fn test_blank_updated_at_falls_back_to_created_at() {
        let mut local = patient("p1", "");
        local.created_at = Some("2024-06-01T00:00:00Z".into());
        local.cc = Some("local".into());
        let device = Dataset {
            patients: vec![local.clone()],
            ..Default::default()
        };

        let mut older = patient("p1", "2024-01-01T00:00:00Z");
        older.cc = Some("older".into());

        let outcome = merge(
            &device,
            &Incoming {
                patients: vec![older],
                notes: vec![],
            },
        );

        assert_eq!(outcome.merged.patient("p1"), Some(&local));
        assert_eq!(outcome.stats.updated_patients, 0);
    }

    #[test]
    fn test_stats_display() {
        let stats = MergeStats {
            new_patients: 2,
            updated_patients: 1,
            new_notes: 3,
            updated_notes: 0,
        };
        assert_eq!(stats.to_string(), "patients +2 new, 1 updated; notes +3 new, 0 updated");
    }
}
