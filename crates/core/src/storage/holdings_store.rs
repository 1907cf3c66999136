use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::CoreError;
use crate::models::holding::{normalize_symbol, Holding, NewHolding};
pub use crate::models::position::QUANTITY_TOLERANCE;
use super::migrations::apply_migrations;

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, stock_symbol, quantity, purchase_price, created_at FROM holdings";

/// SQLite-backed store of holding rows.
///
/// Owns a single connection behind an async mutex. Every operation borrows it
/// through `with_connection` / `transaction`, so the lock is released on all
/// exit paths. Cloning the store shares the same connection.
#[derive(Clone)]
pub struct HoldingsStore {
    connection: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl std::fmt::Debug for HoldingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoldingsStore").field("path", &self.path).finish()
    }
}

impl HoldingsStore {
    /// Open (or create) a store at a specific path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        log::info!("Opening holdings database at: {:?}", path);

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        if let Err(e) = apply_migrations(&conn) {
            log::error!("Failed to apply migrations: {}", e);
            return Err(e);
        }

        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Create an in-memory store (tests, throwaway sessions).
    pub fn open_in_memory() -> Result<Self, CoreError> {
        log::info!("Creating in-memory holdings database");

        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Health check - ensure database is accessible
    pub async fn health_check(&self) -> Result<(), CoreError> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    /// Execute a closure with the database connection.
    pub async fn with_connection<F, R>(&self, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&Connection) -> Result<R, CoreError> + Send,
        R: Send,
    {
        let conn = self.connection.lock().await;
        f(&conn)
    }

    /// Execute a closure inside a transaction. Rolled back if the closure fails.
    pub async fn transaction<F, R>(&self, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&Connection) -> Result<R, CoreError> + Send,
        R: Send,
    {
        let mut conn = self.connection.lock().await;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // ── Holdings ────────────────────────────────────────────────────

    /// Append a holding row.
    ///
    /// Rejects the insert if the user's resulting net quantity for the
    /// symbol would be negative (selling more than is held).
    pub async fn add_holding(&self, new: NewHolding) -> Result<Holding, CoreError> {
        let new = NewHolding {
            symbol: normalize_symbol(&new.symbol),
            ..new
        };
        validate_new_holding(&new)?;

        let created_at = Utc::now().timestamp();
        let holding = self
            .transaction(|conn| {
                let net = net_quantity_in(conn, new.user_id, &new.symbol)?;
                let resulting = net + new.quantity;
                if resulting < -QUANTITY_TOLERANCE {
                    return Err(CoreError::ValidationError(format!(
                        "Cannot sell {} {}: user {} only holds {}",
                        -new.quantity, new.symbol, new.user_id, net
                    )));
                }

                conn.execute(
                    "INSERT INTO holdings (user_id, stock_symbol, quantity, purchase_price, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![new.user_id, new.symbol, new.quantity, new.purchase_price, created_at],
                )?;
                let id = conn.last_insert_rowid();

                Ok(Holding {
                    id,
                    user_id: new.user_id,
                    symbol: new.symbol.clone(),
                    quantity: new.quantity,
                    purchase_price: new.purchase_price,
                    created_at: timestamp_to_utc(created_at),
                })
            })
            .await?;

        log::debug!(
            "Added holding {} for user {}: {} x {} @ {}",
            holding.id,
            holding.user_id,
            holding.quantity,
            holding.symbol,
            holding.purchase_price
        );
        Ok(holding)
    }

    /// Delete one of a user's holding rows.
    ///
    /// Rejects the delete if it would leave a negative net quantity
    /// (removing a purchase that a later recorded sale depends on).
    pub async fn remove_holding(&self, user_id: i64, holding_id: i64) -> Result<Holding, CoreError> {
        let removed = self
            .transaction(|conn| {
                let holding = conn
                    .query_row(
                        &format!("{SELECT_COLUMNS} WHERE id = ?1 AND user_id = ?2"),
                        params![holding_id, user_id],
                        row_to_holding,
                    )
                    .optional()?
                    .ok_or(CoreError::HoldingNotFound(holding_id))?;

                let net = net_quantity_in(conn, user_id, &holding.symbol)?;
                let resulting = net - holding.quantity;
                if resulting < -QUANTITY_TOLERANCE {
                    return Err(CoreError::ValidationError(format!(
                        "Removing holding {} would leave user {} with {} {}",
                        holding_id, user_id, resulting, holding.symbol
                    )));
                }

                conn.execute("DELETE FROM holdings WHERE id = ?1", params![holding_id])?;
                Ok(holding)
            })
            .await?;

        log::debug!("Removed holding {} for user {}", holding_id, user_id);
        Ok(removed)
    }

    /// All of a user's holding rows, in insertion order.
    pub async fn list_holdings(&self, user_id: i64) -> Result<Vec<Holding>, CoreError> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY id ASC"))?;
            let rows = stmt.query_map(params![user_id], row_to_holding)?;
            let holdings = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(holdings)
        })
        .await
    }

    /// Every holding row of every user, in insertion order.
    pub async fn list_all_holdings(&self) -> Result<Vec<Holding>, CoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))?;
            let rows = stmt.query_map([], row_to_holding)?;
            let holdings = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(holdings)
        })
        .await
    }

    /// Sum of a user's quantities for one symbol (0 when none held).
    pub async fn net_quantity(&self, user_id: i64, symbol: &str) -> Result<f64, CoreError> {
        let symbol = normalize_symbol(symbol);
        self.with_connection(|conn| net_quantity_in(conn, user_id, &symbol))
            .await
    }
}

/// Field-level checks that need no database access.
pub fn validate_new_holding(new: &NewHolding) -> Result<(), CoreError> {
    if new.symbol.is_empty() {
        return Err(CoreError::ValidationError("Symbol must not be empty".into()));
    }
    if !new.quantity.is_finite() || new.quantity.abs() <= QUANTITY_TOLERANCE {
        return Err(CoreError::ValidationError(format!(
            "Quantity must be a non-zero number, got {}",
            new.quantity
        )));
    }
    if !new.purchase_price.is_finite() || new.purchase_price < 0.0 {
        return Err(CoreError::ValidationError(format!(
            "Purchase price must be finite and non-negative, got {}",
            new.purchase_price
        )));
    }
    Ok(())
}

fn net_quantity_in(conn: &Connection, user_id: i64, symbol: &str) -> Result<f64, CoreError> {
    let net: f64 = conn.query_row(
        "SELECT COALESCE(SUM(quantity), 0.0) FROM holdings WHERE user_id = ?1 AND stock_symbol = ?2",
        params![user_id, symbol],
        |row| row.get(0),
    )?;
    Ok(net)
}

fn row_to_holding(row: &Row<'_>) -> rusqlite::Result<Holding> {
    Ok(Holding {
        id: row.get(0)?,
        user_id: row.get(1)?,
        symbol: row.get(2)?,
        quantity: row.get(3)?,
        purchase_price: row.get(4)?,
        created_at: timestamp_to_utc(row.get(5)?),
    })
}

fn timestamp_to_utc(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
