use rusqlite::Connection;

use crate::errors::CoreError;

/// Create the holdings schema if it does not exist yet. Idempotent.
pub fn apply_migrations(conn: &Connection) -> Result<(), CoreError> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    log::info!("Ensuring holdings schema...");
    conn.execute_batch(SCHEMA)?;
    log::info!("Holdings schema ready");
    Ok(())
}

const SCHEMA: &str = r#"
-- One row per purchase (positive quantity) or recorded sale (negative quantity)
CREATE TABLE IF NOT EXISTS holdings (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER NOT NULL,   -- id in the external account store
    stock_symbol   TEXT NOT NULL,      -- uppercased ticker
    quantity       REAL NOT NULL,
    purchase_price REAL NOT NULL,
    created_at     INTEGER NOT NULL    -- epoch seconds
);

CREATE INDEX IF NOT EXISTS idx_holdings_user_symbol
    ON holdings(user_id, stock_symbol);
"#;
