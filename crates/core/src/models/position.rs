use serde::{Deserialize, Serialize};

/// Net quantities this close to zero count as zero.
pub const QUANTITY_TOLERANCE: f64 = 1e-9;

/// A user's net quantity in one symbol after summing all their holdings.
///
/// Derived on demand by `AggregationService`; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPosition {
    pub symbol: String,
    pub net_quantity: f64,
}

impl AggregatedPosition {
    pub fn new(symbol: impl Into<String>, net_quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            net_quantity,
        }
    }

    /// A fully sold position has nothing left to value. Float residue from
    /// buy/sell sequences within `QUANTITY_TOLERANCE` counts as sold out.
    pub fn is_closed(&self) -> bool {
        self.net_quantity.abs() <= QUANTITY_TOLERANCE
    }
}
