//! Settings management

use crate::db::sqlite::models::Settings;
use crate::error::Result;
use rusqlite::Connection;

/// Get settings
pub fn get_settings(conn: &Connection) -> Result<Settings> {
    let settings = conn.query_row(
        "SELECT auto_trading, broker_username, updated_at FROM settings WHERE id = 1",
        [],
        |row| {
            Ok(Settings {
                auto_trading: row.get::<_, i32>(0)? == 1,
                broker_username: row.get(1)?,
                updated_at: row.get(2)?,
            })
        },
    )?;

    Ok(settings)
}

/// Update settings; `None` leaves a field as it is
pub fn update_settings(
    conn: &Connection,
    auto_trading: Option<bool>,
    broker_username: Option<Option<String>>,
) -> Result<Settings> {
    let mut updates = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(enabled) = auto_trading {
        updates.push("auto_trading = ?");
        params.push(Box::new(enabled as i32));
    }
    if let Some(username) = broker_username {
        updates.push("broker_username = ?");
        params.push(Box::new(username));
    }

    if !updates.is_empty() {
        updates.push("updated_at = datetime('now')");

        let sql = format!("UPDATE settings SET {} WHERE id = 1", updates.join(", "));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;
    }

    get_settings(conn)
}
