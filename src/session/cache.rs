//! Durable mirror of the bearer credential

use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::security::SecurityManager;
use parking_lot::Mutex;
use std::sync::Arc;

/// Storage key of the persisted bearer credential
pub const CREDENTIAL_KEY: &str = "token";

/// Where the session store mirrors the current credential
pub trait CredentialCache: Send + Sync {
    fn store(&self, credential: &str) -> Result<()>;
    fn load(&self) -> Result<Option<String>>;
    fn clear(&self) -> Result<()>;
}

/// Encrypted credential cache in the local SQLite database
pub struct SqliteCredentialCache {
    db: Arc<SqliteDb>,
    security: Arc<SecurityManager>,
}

impl SqliteCredentialCache {
    pub fn new(db: Arc<SqliteDb>, security: Arc<SecurityManager>) -> Self {
        Self { db, security }
    }
}

impl CredentialCache for SqliteCredentialCache {
    fn store(&self, credential: &str) -> Result<()> {
        self.db.store_secret(CREDENTIAL_KEY, credential, &self.security)
    }

    fn load(&self) -> Result<Option<String>> {
        self.db.get_secret(CREDENTIAL_KEY, &self.security)
    }

    fn clear(&self) -> Result<()> {
        self.db.delete_secret(CREDENTIAL_KEY)
    }
}

/// Process-local cache
#[derive(Default)]
pub struct MemoryCredentialCache {
    value: Mutex<Option<String>>,
}

impl CredentialCache for MemoryCredentialCache {
    fn store(&self, credential: &str) -> Result<()> {
        *self.value.lock() = Some(credential.to_string());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>> {
        Ok(self.value.lock().clone())
    }

    fn clear(&self) -> Result<()> {
        *self.value.lock() = None;
        Ok(())
    }
}
