//! Security module for credential encryption and file-based key storage

mod encryption;
mod file_storage;

use crate::error::Result;
use std::path::PathBuf;

pub use encryption::{EncryptionManager, SealedSecret};

/// Encrypts secrets before they reach local storage
pub struct SecurityManager {
    encryption: EncryptionManager,
}

impl SecurityManager {
    /// Create a security manager whose master key lives in `config_dir`
    pub fn new(config_dir: PathBuf) -> Result<Self> {
        let storage = file_storage::FileStorage::new(config_dir);
        let master_key = storage.get_or_create_master_key()?;

        Ok(Self {
            encryption: EncryptionManager::new(&master_key)?,
        })
    }

    /// Security manager with a random in-memory key; nothing written to disk
    pub fn ephemeral() -> Result<Self> {
        Ok(Self {
            encryption: EncryptionManager::new(&EncryptionManager::generate_key())?,
        })
    }

    /// Seal `plaintext` for storage under `key`
    pub fn seal(&self, key: &str, plaintext: &str) -> Result<SealedSecret> {
        self.encryption.seal(key, plaintext)
    }

    pub fn open(&self, key: &str, sealed: &SealedSecret) -> Result<String> {
        self.encryption.open(key, sealed)
    }
}
