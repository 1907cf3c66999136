use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single purchase (or sale, when `quantity` is negative) record.
///
/// Rows are append-only: a holding is never edited in place, only inserted
/// or deleted. Several rows may exist for the same `(user_id, symbol)` pair
/// when a position was built up by incremental purchases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// SQLite rowid
    pub id: i64,

    /// Owner of the holding (references an external account store)
    pub user_id: i64,

    /// Ticker symbol, uppercased (e.g., "AAPL")
    pub symbol: String,

    /// Number of shares; negative for a recorded sale
    pub quantity: f64,

    /// Price paid per share at purchase time
    pub purchase_price: f64,

    /// When the row was inserted
    pub created_at: DateTime<Utc>,
}

/// Insert request for the holdings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHolding {
    pub user_id: i64,
    pub symbol: String,
    pub quantity: f64,
    pub purchase_price: f64,
}

impl NewHolding {
    pub fn new(user_id: i64, symbol: impl Into<String>, quantity: f64, purchase_price: f64) -> Self {
        Self {
            user_id,
            symbol: normalize_symbol(&symbol.into()),
            quantity,
            purchase_price,
        }
    }
}

/// Canonical form of a ticker symbol: trimmed and uppercased.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
