//! Key management, field encryption and request validation

pub mod cipher;
pub mod keys;
pub mod ports;
pub mod rotation;
pub mod status;
pub mod validation;

pub use cipher::{CipherService, DecryptOutcome, WritePermit};
pub use keys::KeyManager;
pub use ports::{EncryptedRecordStore, EncryptedRow, KeyStore};
pub use rotation::{
    KeyRotationCoordinator, RotationOutcome, RotationPhase, RotationReport, StoreMigration,
};
pub use status::{security_status, SecurityStatus};
pub use validation::{
    generate_session_token, validate_input, validate_session_token, InputRejection,
};
