//! A device's working session
//!
//! `Notebook` owns the in-memory dataset together with the store it came
//! from and the passphrase that unlocked it. Group flows run through it so
//! that the remembered group version is always persisted alongside the data.

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;

use crate::crypto;
use crate::records::{Dataset, GroupSettings};
use crate::storage::{BlobStore, LoadError, LocalStore, StorageError};
use crate::sync::{
    build_subset, decode_incoming, merge, Incoming, MergeStats, PayloadError, SyncClient,
    SyncError,
};

/// Interaction with whoever drives the session
pub trait UserPrompt {
    /// Show an informational message
    fn notify(&self, message: &str);

    /// Ask a yes/no question
    fn confirm(&self, message: &str) -> bool;
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Data is locked; unlock it first")]
    Locked,

    #[error("No patients selected")]
    NothingSelected,

    #[error("Group id and password are not set")]
    NotConfigured,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory dataset plus the store and passphrase behind it
pub struct Notebook<S> {
    store: LocalStore<S>,
    dataset: Dataset,
    passphrase: Option<String>,
    locked: bool,
}

impl<S: BlobStore> Notebook<S> {
    /// A locked notebook with an empty dataset; call `unlock` to load
    pub fn new(store: LocalStore<S>) -> Self {
        Self {
            store,
            dataset: Dataset::default(),
            passphrase: None,
            locked: true,
        }
    }

    /// Load the stored dataset
    pub fn open(store: LocalStore<S>, passphrase: Option<&str>) -> Result<Self, LoadError> {
        let mut notebook = Self::new(store);
        notebook.unlock(passphrase)?;
        Ok(notebook)
    }

    /// (Re)load the stored dataset with `passphrase`.
    ///
    /// On failure the notebook stays locked and nothing can be saved over
    /// the stored data.
    pub fn unlock(&mut self, passphrase: Option<&str>) -> Result<(), LoadError> {
        let passphrase = passphrase.filter(|p| !p.is_empty());
        self.dataset = self.store.load(passphrase)?;
        self.passphrase = passphrase.map(str::to_string);
        self.locked = false;
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Mutable access for record edits; call `save` afterwards
    pub fn dataset_mut(&mut self) -> &mut Dataset {
        &mut self.dataset
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    pub fn set_passphrase(&mut self, passphrase: Option<&str>) {
        self.passphrase = passphrase.filter(|p| !p.is_empty()).map(str::to_string);
    }

    /// Persist the dataset with its own encryption setting
    pub fn save(&self) -> Result<(), SessionError> {
        if self.locked {
            return Err(SessionError::Locked);
        }

        self.store.save(
            &self.dataset,
            self.passphrase(),
            self.dataset.settings.encryption_enabled,
        )?;
        Ok(())
    }

    pub fn set_encryption(&mut self, enabled: bool) -> Result<(), SessionError> {
        if self.locked {
            return Err(SessionError::Locked);
        }

        self.dataset.settings.encryption_enabled = enabled;
        self.save()
    }

    /// Point the notebook at a group. The remembered version is kept only
    /// when the id stays the same.
    pub fn set_group(&mut self, id: &str, pass: &str) -> Result<(), SessionError> {
        if self.locked {
            return Err(SessionError::Locked);
        }

        let group = &mut self.dataset.settings.group;
        let version = if group.id == id { group.version } else { None };

        *group = GroupSettings {
            id: id.to_string(),
            pass: pass.to_string(),
            version,
        };
        self.save()
    }

    /// Delete everything on this device after confirmation.
    ///
    /// Returns whether the wipe happened.
    pub fn wipe(&mut self, prompt: &dyn UserPrompt) -> Result<bool, SessionError> {
        if !prompt.confirm("Delete all data stored on this device?") {
            return Ok(false);
        }

        self.store.clear()?;
        self.dataset = Dataset::default();
        self.passphrase = None;
        self.locked = false;
        Ok(true)
    }

    fn group(&self) -> Result<GroupSettings, SessionError> {
        let group = &self.dataset.settings.group;
        if group.is_configured() {
            Ok(group.clone())
        } else {
            Err(SessionError::NotConfigured)
        }
    }

    /// Create a group on the server and remember it (at version 1)
    pub async fn create_group(
        &mut self,
        client: &SyncClient,
        id: &str,
        pass: &str,
    ) -> Result<(), SessionError> {
        if self.locked {
            return Err(SessionError::Locked);
        }

        let id = client.create_group(id, pass).await?;
        self.dataset.settings.group = GroupSettings {
            id,
            pass: pass.to_string(),
            version: Some(1),
        };
        self.save()
    }

    fn share_payload(&self, selection: &HashSet<String>) -> Result<Value, SessionError> {
        let subset = build_subset(&self.dataset, selection);

        let passphrase = self
            .passphrase()
            .filter(|_| self.dataset.settings.encryption_enabled);
        let payload = match passphrase {
            Some(passphrase) => {
                let envelope = crypto::encrypt(&serde_json::to_string(&subset)?, passphrase);
                serde_json::to_value(envelope)?
            }
            None => serde_json::to_value(subset)?,
        };
        Ok(payload)
    }

    /// Push the selected patients and their notes to the group.
    ///
    /// The write is conditional on the version this device last saw. A
    /// `VersionConflict` is handed back untouched; pull and retry to resolve.
    pub async fn push_selected(
        &mut self,
        client: &SyncClient,
        selection: &HashSet<String>,
    ) -> Result<u64, SessionError> {
        if selection.is_empty() {
            return Err(SessionError::NothingSelected);
        }
        let group = self.group()?;
        let payload = self.share_payload(selection)?;

        let version = client
            .push(&group.id, &group.pass, group.version, payload)
            .await?;

        self.dataset.settings.group.version = Some(version);
        self.save()?;
        Ok(version)
    }

    /// Pull the group payload and merge it into the full local dataset
    pub async fn pull_and_merge(
        &mut self,
        client: &SyncClient,
        prompt: &dyn UserPrompt,
    ) -> Result<MergeStats, SessionError> {
        let group = self.group()?;
        let snapshot = client.pull(&group.id, &group.pass).await?;

        let incoming = match decode_incoming(&snapshot.payload, self.passphrase()) {
            Ok(incoming) => incoming,
            Err(PayloadError::Empty) => Incoming::default(),
            Err(e) => return Err(e.into()),
        };

        let outcome = merge(&self.dataset, &incoming);
        self.dataset = outcome.merged;
        self.dataset.settings.group.version = Some(snapshot.version);
        self.save()?;

        prompt.notify(&format!("Merged from group {}: {}", group.id, outcome.stats));
        Ok(outcome.stats)
    }
}
