//! Encrypted secret storage (bearer credential, refresh token)

use crate::error::Result;
use crate::security::{SealedSecret, SecurityManager};
use rusqlite::Connection;

/// Store encrypted secret
pub fn store_secret(
    conn: &Connection,
    key: &str,
    value: &str,
    security: &SecurityManager,
) -> Result<()> {
    let sealed = security.seal(key, value)?;

    conn.execute(
        "INSERT INTO auth (key, value_encrypted, nonce)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
           value_encrypted = excluded.value_encrypted,
           nonce = excluded.nonce,
           updated_at = datetime('now')",
        rusqlite::params![key, sealed.ciphertext, sealed.nonce],
    )?;

    Ok(())
}

/// Get decrypted secret
pub fn get_secret(
    conn: &Connection,
    key: &str,
    security: &SecurityManager,
) -> Result<Option<String>> {
    let result = conn.query_row(
        "SELECT value_encrypted, nonce FROM auth WHERE key = ?",
        [key],
        |row| {
            Ok(SealedSecret {
                ciphertext: row.get(0)?,
                nonce: row.get(1)?,
            })
        },
    );

    match result {
        Ok(sealed) => Ok(Some(security.open(key, &sealed)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Delete secret
pub fn delete_secret(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM auth WHERE key = ?", [key])?;
    Ok(())
}
