//! SQLite connection utilities

use rusqlite::Connection;
use std::path::Path;

/// Create a new SQLite connection, creating the parent directory if needed
pub fn create_connection(path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && std::fs::create_dir_all(parent).is_err() {
            tracing::warn!("Could not create database directory {:?}", parent);
        }
    }
    Connection::open(path)
}
