//! Symmetric encryption primitives used by the field cipher and key store.

pub mod encryption;

pub use encryption::{decode_payload, encode_payload, key_storage, EncryptedData, EncryptionService};
