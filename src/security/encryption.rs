//! AES-256-GCM sealing of stored secrets
//!
//! Each secret is sealed with a fresh random nonce and bound to the name it
//! is stored under (as associated data), so a ciphertext moved to another
//! row does not decrypt.

use crate::error::{AppError, Result};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

const NONCE_SIZE: usize = 12;
pub const KEY_SIZE: usize = 32;

/// Ciphertext and nonce, both base64, as stored in the `auth` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSecret {
    pub ciphertext: String,
    pub nonce: String,
}

pub struct EncryptionManager {
    cipher: Aes256Gcm,
}

impl EncryptionManager {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(AppError::Encryption(format!(
                "Master key must be {} bytes, got {}",
                KEY_SIZE,
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| AppError::Encryption(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Random 256-bit key
    pub fn generate_key() -> Vec<u8> {
        Aes256Gcm::generate_key(OsRng).to_vec()
    }

    pub fn seal(&self, context: &str, plaintext: &str) -> Result<SealedSecret> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let payload = Payload {
            msg: plaintext.as_bytes(),
            aad: context.as_bytes(),
        };

        let ciphertext = self
            .cipher
            .encrypt(&nonce, payload)
            .map_err(|e| AppError::Encryption(format!("Failed to seal {}: {}", context, e)))?;

        Ok(SealedSecret {
            ciphertext: B64.encode(ciphertext),
            nonce: B64.encode(nonce),
        })
    }

    pub fn open(&self, context: &str, sealed: &SealedSecret) -> Result<String> {
        let ciphertext = B64
            .decode(&sealed.ciphertext)
            .map_err(|e| AppError::Encryption(format!("Corrupt ciphertext for {}: {}", context, e)))?;
        let nonce = B64
            .decode(&sealed.nonce)
            .map_err(|e| AppError::Encryption(format!("Corrupt nonce for {}: {}", context, e)))?;

        if nonce.len() != NONCE_SIZE {
            return Err(AppError::Encryption(format!(
                "Nonce for {} must be {} bytes, got {}",
                context,
                NONCE_SIZE,
                nonce.len()
            )));
        }

        let payload = Payload {
            msg: ciphertext.as_slice(),
            aad: context.as_bytes(),
        };
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|_| AppError::Encryption(format!("Could not decrypt {}", context)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Encryption(format!("{} is not valid UTF-8: {}", context, e)))
    }
}
