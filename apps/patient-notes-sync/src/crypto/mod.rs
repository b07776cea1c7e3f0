//! Password-based encryption for datasets and shared payloads
//!
//! Provides:
//! - `EncryptedEnvelope`: the at-rest / in-transit representation of a JSON blob
//! - `encrypt` / `decrypt`: PBKDF2-derived AES-256-CBC with a fresh salt and IV per call
//! - Group password hashing with constant-time verification
//!
//! # Envelope format
//!
//! ```json
//! { "enc": true, "v": 1, "salt": "<base64>", "iv": "<base64>", "data": "<base64>" }
//! ```
//!
//! Decryption never panics: a wrong password and a corrupt envelope both come
//! back as `CryptoError`, which callers treat as "ask for the password again".

mod envelope;
mod password;

pub use envelope::{decrypt, encrypt, CryptoError, EncryptedEnvelope, ENVELOPE_VERSION};
pub use password::{hash_password, verify_password};
