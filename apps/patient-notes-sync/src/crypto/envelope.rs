//! Encrypted envelope codec

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Envelope format version written into `v`
pub const ENVELOPE_VERSION: u32 = 1;

const PBKDF2_ITERATIONS: u32 = 1000;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Why an envelope could not be opened
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    #[error("Wrong password or corrupt data")]
    Undecryptable,
}

/// Opaque ciphertext plus the parameters needed to re-derive the key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Always `true`; this is how envelopes are told apart from plain documents
    pub enc: bool,
    /// Envelope format version
    pub v: u32,
    /// Base64 PBKDF2 salt
    pub salt: String,
    /// Base64 AES-CBC initialization vector
    pub iv: String,
    /// Base64 ciphertext
    pub data: String,
}

impl EncryptedEnvelope {
    /// Interpret a JSON value as an envelope.
    ///
    /// Returns `None` unless the value is an object with `enc: true`. An object
    /// that claims to be an envelope but lacks the other fields still yields
    /// `Some(Err(..))` so callers can report corruption instead of treating it
    /// as plaintext.
    pub fn from_value(value: &Value) -> Option<Result<Self, CryptoError>> {
        if value.get("enc").and_then(Value::as_bool) != Some(true) {
            return None;
        }

        Some(
            serde_json::from_value(value.clone())
                .map_err(|e| CryptoError::Malformed(e.to_string())),
        )
    }

    /// Whether a JSON value looks like an envelope
    pub fn is_envelope(value: &Value) -> bool {
        value.get("enc").and_then(Value::as_bool) == Some(true)
    }
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Encrypt a JSON string under a password-derived key.
///
/// Salt and IV are freshly random on every call, so identical inputs never
/// produce identical envelopes.
pub fn encrypt(plaintext: &str, password: &str) -> EncryptedEnvelope {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    let key = derive_key(password, &salt);
    let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    EncryptedEnvelope {
        enc: true,
        v: ENVELOPE_VERSION,
        salt: BASE64.encode(salt),
        iv: BASE64.encode(iv),
        data: BASE64.encode(ciphertext),
    }
}

/// Decrypt an envelope back to its JSON string.
pub fn decrypt(envelope: &EncryptedEnvelope, password: &str) -> Result<String, CryptoError> {
    let salt = decode_field("salt", &envelope.salt)?;
    let iv = decode_field("iv", &envelope.iv)?;
    let ciphertext = decode_field("data", &envelope.data)?;

    let iv: [u8; IV_LEN] = iv
        .try_into()
        .map_err(|_| CryptoError::Malformed("iv must be 16 bytes".to_string()))?;

    let key = derive_key(password, &salt);
    let plaintext = Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CryptoError::Undecryptable)?;

    let text = String::from_utf8(plaintext).map_err(|_| CryptoError::Undecryptable)?;
    if text.is_empty() {
        return Err(CryptoError::Undecryptable);
    }

    Ok(text)
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    BASE64
        .decode(value)
        .map_err(|e| CryptoError::Malformed(format!("{}: {}", name, e)))
}
