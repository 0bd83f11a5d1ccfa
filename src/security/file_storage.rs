//! File-based secret storage
//!
//! Keeps the master key for credential encryption in a local file with basic
//! obfuscation, so no OS keychain prompt is needed on start.

use crate::error::{AppError, Result};
use base64::Engine;
use rand::RngCore;
use std::fs;
use std::path::PathBuf;

const SECRETS_FILE: &str = "secrets.dat";
const MASTER_KEY_SIZE: usize = 32;

/// File-based storage for the master key
pub struct FileStorage {
    config_dir: PathBuf,
}

impl FileStorage {
    pub fn new(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Get or create the master key
    pub fn get_or_create_master_key(&self) -> Result<Vec<u8>> {
        let secrets_path = self.config_dir.join(SECRETS_FILE);

        if secrets_path.exists() {
            let data = fs::read(&secrets_path)
                .map_err(|e| AppError::Config(format!("Failed to read secrets: {}", e)))?;

            return self.decode_key(&data);
        }

        let mut master_key = vec![0u8; MASTER_KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut master_key);

        fs::create_dir_all(&self.config_dir)
            .map_err(|e| AppError::Config(format!("Failed to create config dir: {}", e)))?;

        fs::write(&secrets_path, self.encode_key(&master_key))
            .map_err(|e| AppError::Config(format!("Failed to write secrets: {}", e)))?;

        tracing::info!("Generated new master key at {:?}", secrets_path);
        Ok(master_key)
    }

    /// base64(xor(master_key, obfuscation_key))
    fn encode_key(&self, master_key: &[u8]) -> Vec<u8> {
        let obfuscated = xor_with(master_key, &self.obfuscation_key());
        base64::engine::general_purpose::STANDARD
            .encode(obfuscated)
            .into_bytes()
    }

    fn decode_key(&self, data: &[u8]) -> Result<Vec<u8>> {
        let data_str = std::str::from_utf8(data)
            .map_err(|e| AppError::Config(format!("Invalid secrets format: {}", e)))?;

        let obfuscated = base64::engine::general_purpose::STANDARD
            .decode(data_str.trim())
            .map_err(|e| AppError::Config(format!("Failed to decode master key: {}", e)))?;

        if obfuscated.len() != MASTER_KEY_SIZE {
            return Err(AppError::Config("Invalid secrets format".to_string()));
        }

        Ok(xor_with(&obfuscated, &self.obfuscation_key()))
    }

    fn obfuscation_key(&self) -> Vec<u8> {
        b"Stockwatch-Client-v1-ObfuscateK!".to_vec()
    }
}

fn xor_with(data: &[u8], key: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(key.iter().cycle())
        .map(|(a, b)| a ^ b)
        .collect()
}
