//! Patient and clinical-note records
//!
//! The dataset is the unit of persistence and sync: every patient, every note,
//! and the device's settings. Records are keyed by opaque string ids that never
//! change once created.

mod ops;
mod types;

pub use ops::{now_iso, NoteDraft, NotePatch, PatientPatch};
pub use types::{
    freshness, Dataset, GroupSettings, History, Note, Patient, Settings, Soap,
    DEFAULT_PATIENT_COLOR,
};
