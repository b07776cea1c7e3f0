//! Group password hashing

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Lowercase hex SHA-256 of the password
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Check a presented password against a stored hash without leaking timing
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let presented = hash_password(password);
    presented.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_hex_sha256() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify() {
        let stored = hash_password("ward-7");
        assert!(verify_password("ward-7", &stored));
        assert!(!verify_password("ward-8", &stored));
        assert!(!verify_password("ward-7", "short"));
    }
}
