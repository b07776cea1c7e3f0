use serde_json::{json, Map, Value};
use thiserror::Error;

use super::blob::{BlobStore, FileStore, StorageError};
use crate::config::LocalConfig;
use crate::crypto::{self, EncryptedEnvelope};
use crate::records::Dataset;

/// Storage key of the current dataset schema
pub const CURRENT_KEY: &str = "patientNotes.v5";
/// Storage key of the write-key era schema, migrated on first load
pub const LEGACY_KEY: &str = "patientNotes.v1";

/// Why a stored dataset could not be loaded
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Data is encrypted; a password is required")]
    Locked,

    #[error("Wrong password")]
    BadPassword,

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Parse a stored document, decrypting it when it is an envelope.
///
/// Returns the plain JSON document and whether it was encrypted.
pub(super) fn open_document(raw: &str, password: Option<&str>) -> Result<(Value, bool), LoadError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| LoadError::Corrupt(e.to_string()))?;

    let Some(envelope) = EncryptedEnvelope::from_value(&value) else {
        return Ok((value, false));
    };

    let password = password.filter(|p| !p.is_empty()).ok_or(LoadError::Locked)?;
    let envelope = envelope.map_err(|e| LoadError::Corrupt(e.to_string()))?;
    // Garbage that happens to unpad cleanly is still a wrong password
    let document = crypto::decrypt(&envelope, password)
        .ok()
        .and_then(|plaintext| serde_json::from_str::<Value>(&plaintext).ok())
        .ok_or(LoadError::BadPassword)?;

    Ok((document, true))
}

/// Give a dataset document an object-valued `settings.group`
pub(super) fn backfill_group(document: &mut Value) {
    let Some(root) = document.as_object_mut() else {
        return;
    };

    let settings = root
        .entry("settings")
        .or_insert_with(|| Value::Object(Map::new()));
    if !settings.is_object() {
        *settings = Value::Object(Map::new());
    }

    if let Some(settings) = settings.as_object_mut() {
        let group = settings.entry("group").or_insert(Value::Null);
        if !group.is_object() {
            *group = json!({ "id": "", "pass": "" });
        }
    }
}

/// Convert a v1 document to the current shape.
///
/// v1 groups carried `{id, writeKey}`; write keys no longer authorize
/// anything, so only the id survives and the password starts out empty.
pub fn migrate_v1(mut document: Value) -> Value {
    backfill_group(&mut document);

    if let Some(group) = document
        .pointer_mut("/settings/group")
        .and_then(Value::as_object_mut)
    {
        let id = group.get("id").cloned().unwrap_or_else(|| json!(""));
        group.clear();
        group.insert("id".to_string(), id);
        group.insert("pass".to_string(), json!(""));
    }

    document
}

fn into_dataset(mut document: Value) -> Result<Dataset, LoadError> {
    backfill_group(&mut document);
    serde_json::from_value(document).map_err(|e| LoadError::Corrupt(e.to_string()))
}

/// The device's dataset persisted under a single key
pub struct LocalStore<S> {
    backend: S,
}

impl LocalStore<FileStore> {
    /// File-backed store rooted at the configured data directory
    pub fn open(config: &LocalConfig) -> Result<Self, StorageError> {
        Ok(Self::new(FileStore::open(&config.data_dir)?))
    }
}

impl<S: BlobStore> LocalStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Load the dataset, decrypting with `password` when stored encrypted.
    ///
    /// A store with nothing in it yields an empty dataset. A legacy v1 blob
    /// is migrated and moved to the current key on the way.
    pub fn load(&self, password: Option<&str>) -> Result<Dataset, LoadError> {
        if let Some(raw) = self.backend.get(CURRENT_KEY)? {
            let (document, _) = open_document(&raw, password)?;
            return into_dataset(document);
        }

        let Some(raw) = self.backend.get(LEGACY_KEY)? else {
            return Ok(Dataset::default());
        };

        let (document, encrypted) = open_document(&raw, password)?;
        let dataset = into_dataset(migrate_v1(document))?;

        self.save(&dataset, password, encrypted)?;
        self.backend.remove(LEGACY_KEY)?;
        tracing::info!(
            "Migrated local dataset from {} to {} ({} patients, {} notes)",
            LEGACY_KEY,
            CURRENT_KEY,
            dataset.patients.len(),
            dataset.notes.len()
        );

        Ok(dataset)
    }

    /// Persist the dataset, replacing whatever was stored.
    ///
    /// Encryption needs both the flag and a password; with the flag set and
    /// no password the dataset is written in plaintext.
    pub fn save(
        &self,
        dataset: &Dataset,
        password: Option<&str>,
        encryption_enabled: bool,
    ) -> Result<(), StorageError> {
        let plaintext = serde_json::to_string(dataset)?;
        let password = password.filter(|p| !p.is_empty());

        let contents = match (encryption_enabled, password) {
            (true, Some(password)) => serde_json::to_string(&crypto::encrypt(&plaintext, password))?,
            (true, None) => {
                tracing::warn!("Encryption is enabled but no password is set; saving plaintext");
                plaintext
            }
            (false, _) => plaintext,
        };

        self.backend.set(CURRENT_KEY, &contents)
    }

    /// Delete every persisted copy of the dataset
    pub fn clear(&self) -> Result<(), StorageError> {
        self.backend.remove(CURRENT_KEY)?;
        self.backend.remove(LEGACY_KEY)?;
        tracing::info!("Local dataset wiped");
        Ok(())
    }
}
