//! Key artifact storage

mod file_key_store;

pub use file_key_store::FileKeyStore;
