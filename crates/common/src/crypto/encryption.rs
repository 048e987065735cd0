//! AES-256-GCM field encryption and passphrase-based key sealing.
//!
//! - [`EncryptionService`]: AES-256-GCM encryption/decryption under one key
//! - [`EncryptedData`]: serializable nonce + ciphertext container
//! - [`key_storage`]: seals raw key material under an Argon2-derived key so
//!   key artifacts can be written to disk
//!
//! ## Usage
//!
//! ```rust
//! use policyqa_common::crypto::encryption::EncryptionService;
//!
//! let key = EncryptionService::generate_key();
//! let service = EncryptionService::new(&key)?;
//!
//! let sealed = service.encrypt_to_string(b"claim number 42")?;
//! assert_eq!(service.decrypt_from_string(&sealed)?, b"claim number 42");
//! # Ok::<(), policyqa_common::error::CommonError>(())
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::password_hash::SaltString;
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CommonError, CommonResult};

/// Key length for AES-256
pub const KEY_LEN: usize = 32;
/// GCM nonce length
pub const NONCE_LEN: usize = 12;
/// Algorithm tag recorded in every payload
pub const ALGORITHM: &str = "AES-256-GCM";

/// Encrypted payload container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub salt: Option<String>,
    pub algorithm: String,
}

/// AES-GCM encryption service bound to a single 32-byte key.
pub struct EncryptionService {
    key: Zeroizing<Vec<u8>>,
    cipher: Aes256Gcm,
    password_salt: Option<String>,
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService")
            .field("key", &"[REDACTED]")
            .field("password_salt", &self.password_salt.is_some())
            .finish()
    }
}

impl EncryptionService {
    /// Create a new encryption service from a raw 32-byte key.
    pub fn new(key: &[u8]) -> CommonResult<Self> {
        if key.len() != KEY_LEN {
            return Err(CommonError::validation(
                "key",
                format!("Encryption key must be exactly {KEY_LEN} bytes"),
            ));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CommonError::crypto(format!("Failed to create encryption cipher: {e}")))?;

        Ok(Self { key: Zeroizing::new(key.to_vec()), cipher, password_salt: None })
    }

    /// Derive an encryption key from a passphrase and optional salt using Argon2.
    ///
    /// A fresh salt is generated when `salt` is `None`; it is recorded in every
    /// payload so the same key can be derived again on load.
    pub fn from_password_with_salt(password: &str, salt: Option<&str>) -> CommonResult<Self> {
        let salt = match salt {
            Some(existing) => SaltString::from_b64(existing)
                .map_err(|e| CommonError::crypto(format!("Invalid password salt: {e}")))?,
            None => SaltString::generate(OsRng),
        };

        let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
        Argon2::default()
            .hash_password_into(password.as_bytes(), salt.as_str().as_bytes(), &mut key)
            .map_err(|e| CommonError::crypto(format!("Key derivation failed: {e}")))?;

        let mut service = Self::new(&key)?;
        service.password_salt = Some(salt.to_string());
        Ok(service)
    }

    /// Generate a random 32-byte symmetric key from the OS RNG.
    pub fn generate_key() -> Zeroizing<Vec<u8>> {
        let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Encrypt bytes into an `EncryptedData` payload with a fresh nonce.
    pub fn encrypt(&self, data: &[u8]) -> CommonResult<EncryptedData> {
        let nonce_bytes = Self::generate_nonce();
        let ciphertext = self
            .cipher
            .encrypt(&Nonce::from(nonce_bytes), data)
            .map_err(|e| CommonError::crypto(format!("Encryption failed: {e}")))?;

        Ok(EncryptedData {
            nonce: nonce_bytes.to_vec(),
            ciphertext,
            salt: self.password_salt.clone(),
            algorithm: ALGORITHM.to_string(),
        })
    }

    /// Decrypt an [`EncryptedData`] payload back into raw bytes.
    ///
    /// Fails on an unknown algorithm tag, a malformed nonce or an
    /// authentication tag mismatch.
    pub fn decrypt(&self, encrypted: &EncryptedData) -> CommonResult<Vec<u8>> {
        if encrypted.algorithm != ALGORITHM {
            return Err(CommonError::crypto(format!(
                "Unsupported algorithm: {}",
                encrypted.algorithm
            )));
        }

        let nonce_array: [u8; NONCE_LEN] =
            encrypted.nonce.as_slice().try_into().map_err(|_| {
                CommonError::crypto(format!("Nonce must be exactly {NONCE_LEN} bytes"))
            })?;

        self.cipher
            .decrypt(&Nonce::from(nonce_array), encrypted.ciphertext.as_ref())
            .map_err(|e| CommonError::crypto(format!("Decryption failed: {e}")))
    }

    /// Encrypt bytes and encode the payload as a base64 string.
    pub fn encrypt_to_string(&self, data: &[u8]) -> CommonResult<String> {
        encode_payload(&self.encrypt(data)?)
    }

    /// Decode a base64 string and decrypt the contained payload.
    pub fn decrypt_from_string(&self, encrypted_str: &str) -> CommonResult<Vec<u8>> {
        let encrypted = decode_payload(encrypted_str)?;
        self.decrypt(&encrypted)
    }

    /// Short, non-reversible fingerprint of the current key for log correlation.
    pub fn key_fingerprint(&self) -> String {
        let digest = Sha256::digest(self.key.as_slice());
        hex::encode(&digest[..8])
    }

    /// Re-encrypt a payload under a different service.
    pub fn reencrypt(
        &self,
        encrypted: &EncryptedData,
        new_service: &Self,
    ) -> CommonResult<EncryptedData> {
        let decrypted = Zeroizing::new(self.decrypt(encrypted)?);
        new_service.encrypt(&decrypted)
    }

    fn generate_nonce() -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }
}

/// Serialize a payload to the base64 form [`decode_payload`] reads.
pub fn encode_payload(encrypted: &EncryptedData) -> CommonResult<String> {
    Ok(BASE64.encode(serde_json::to_vec(encrypted)?))
}

/// Decode the base64(JSON) envelope produced by [`EncryptionService::encrypt_to_string`].
pub fn decode_payload(encoded: &str) -> CommonResult<EncryptedData> {
    let decoded = BASE64
        .decode(encoded)
        .map_err(|e| CommonError::crypto(format!("Base64 decode failed: {e}")))?;
    Ok(serde_json::from_slice(&decoded)?)
}

/// Passphrase sealing for key artifacts.
pub mod key_storage {
    use super::{decode_payload, CommonError, CommonResult, EncryptionService, Zeroizing};

    /// Seal raw key material under a passphrase. The Argon2 salt travels
    /// inside the returned envelope.
    pub fn seal_key(key: &[u8], passphrase: &str) -> CommonResult<String> {
        let service = EncryptionService::from_password_with_salt(passphrase, None)?;
        service.encrypt_to_string(key)
    }

    /// Recover key material sealed by [`seal_key`].
    pub fn unseal_key(sealed: &str, passphrase: &str) -> CommonResult<Zeroizing<Vec<u8>>> {
        let encrypted = decode_payload(sealed)?;
        let salt = encrypted
            .salt
            .clone()
            .ok_or_else(|| CommonError::crypto("Sealed key is missing password salt"))?;
        let service = EncryptionService::from_password_with_salt(passphrase, Some(&salt))?;
        service.decrypt(&encrypted).map(Zeroizing::new)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for crypto::encryption.
    use super::*;

    /// Validates `EncryptionService::generate_key` behavior for the generate
    /// key has correct length scenario.
    ///
    /// Assertions:
    /// - Confirms `key.len()` equals `32`.
    #[test]
    fn generate_key_has_correct_length() {
        let key = EncryptionService::generate_key();
        assert_eq!(key.len(), KEY_LEN);
    }

    /// Validates `EncryptionService::new` behavior for the new service rejects
    /// invalid key size scenario.
    ///
    /// Assertions:
    /// - Ensures `result.is_err()` evaluates to true.
    #[test]
    fn new_service_rejects_invalid_key_size() {
        let result = EncryptionService::new(&[0; 16]);
        assert!(matches!(result, Err(CommonError::Validation { .. })));
    }

    /// Validates `EncryptionService::encrypt` behavior for the fresh nonce
    /// per call scenario.
    ///
    /// Assertions:
    /// - Confirms two encryptions of the same plaintext differ.
    /// - Confirms both decrypt back to the plaintext.
    #[test]
    fn encrypt_uses_fresh_nonce_each_call() {
        let service = EncryptionService::new(&EncryptionService::generate_key()).unwrap();

        let first = service.encrypt(b"same input").unwrap();
        let second = service.encrypt(b"same input").unwrap();

        assert_ne!(first.nonce, second.nonce);
        assert_eq!(service.decrypt(&first).unwrap(), b"same input");
        assert_eq!(service.decrypt(&second).unwrap(), b"same input");
    }

    /// Validates `EncryptionService::decrypt_from_string` behavior for the
    /// wrong key scenario.
    ///
    /// Assertions:
    /// - Ensures authentication fails with a crypto error.
    #[test]
    fn decrypt_with_wrong_key_fails_authentication() {
        let writer = EncryptionService::new(&EncryptionService::generate_key()).unwrap();
        let reader = EncryptionService::new(&EncryptionService::generate_key()).unwrap();

        let encoded = writer.encrypt_to_string(b"policy 123").unwrap();
        let result = reader.decrypt_from_string(&encoded);

        assert!(matches!(result, Err(CommonError::Crypto { .. })));
    }

    /// Validates `EncryptionService::decrypt` behavior for the tampered
    /// ciphertext scenario.
    ///
    /// Assertions:
    /// - Ensures a flipped ciphertext bit is rejected.
    #[test]
    fn decrypt_rejects_tampered_ciphertext() {
        let service = EncryptionService::new(&EncryptionService::generate_key()).unwrap();
        let mut encrypted = service.encrypt(b"deductible").unwrap();
        encrypted.ciphertext[0] ^= 0x01;

        assert!(service.decrypt(&encrypted).is_err());
    }

    /// Validates `EncryptionService::reencrypt` behavior for the reencrypt
    /// uses new service scenario.
    ///
    /// Assertions:
    /// - Confirms `decrypted` equals `plaintext`.
    #[test]
    fn reencrypt_uses_new_service() {
        let service1 = EncryptionService::new(&EncryptionService::generate_key()).unwrap();
        let service2 = EncryptionService::new(&EncryptionService::generate_key()).unwrap();

        let plaintext = b"rotate me";
        let encrypted = service1.encrypt(plaintext).unwrap();
        let reencrypted = service1.reencrypt(&encrypted, &service2).unwrap();

        assert_eq!(service2.decrypt(&reencrypted).unwrap(), plaintext);
        assert!(service1.decrypt(&reencrypted).is_err());
    }

    /// Validates `key_storage::seal_key` behavior for the passphrase round
    /// trip scenario.
    ///
    /// Assertions:
    /// - Confirms the unsealed key equals the original.
    /// - Ensures a wrong passphrase is rejected.
    #[test]
    fn seal_and_unseal_key_with_passphrase() {
        let key = EncryptionService::generate_key();
        let sealed = key_storage::seal_key(&key, "correct horse").unwrap();

        let unsealed = key_storage::unseal_key(&sealed, "correct horse").unwrap();
        assert_eq!(unsealed.as_slice(), key.as_slice());
        assert!(key_storage::unseal_key(&sealed, "battery staple").is_err());
    }

    /// Validates `EncryptionService::key_fingerprint` behavior.
    ///
    /// Assertions:
    /// - Confirms the fingerprint is 16 hex characters and stable per key.
    #[test]
    fn key_fingerprint_is_stable_hex() {
        let key = EncryptionService::generate_key();
        let a = EncryptionService::new(&key).unwrap();
        let b = EncryptionService::new(&key).unwrap();

        assert_eq!(a.key_fingerprint().len(), 16);
        assert_eq!(a.key_fingerprint(), b.key_fingerprint());
        assert!(!format!("{a:?}").contains(&hex::encode(key.as_slice())));
    }
}
