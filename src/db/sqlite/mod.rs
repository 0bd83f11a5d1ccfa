//! SQLite database module

pub mod models;
mod auth;
mod connection;
mod migrations;
mod settings;

use crate::error::Result;
use crate::security::SecurityManager;
pub use models::Settings;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the database file and run migrations
    pub fn new(path: &Path) -> Result<Self> {
        let conn = connection::create_connection(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Database that lives only as long as the process
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Secret Methods ==========

    /// Store an encrypted secret under `key`, replacing any previous value
    pub fn store_secret(&self, key: &str, value: &str, security: &SecurityManager) -> Result<()> {
        let conn = self.conn.lock();
        auth::store_secret(&conn, key, value, security)
    }

    /// Get a decrypted secret
    pub fn get_secret(&self, key: &str, security: &SecurityManager) -> Result<Option<String>> {
        let conn = self.conn.lock();
        auth::get_secret(&conn, key, security)
    }

    /// Delete a secret; deleting a missing key is not an error
    pub fn delete_secret(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        auth::delete_secret(&conn, key)
    }

    // ========== Settings Methods ==========

    pub fn get_settings(&self) -> Result<Settings> {
        let conn = self.conn.lock();
        settings::get_settings(&conn)
    }

    pub fn update_settings(
        &self,
        auto_trading: Option<bool>,
        broker_username: Option<Option<String>>,
    ) -> Result<Settings> {
        let conn = self.conn.lock();
        settings::update_settings(&conn, auto_trading, broker_username)
    }
}
