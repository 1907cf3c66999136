use std::collections::HashMap;

use crate::models::holding::Holding;
use crate::models::position::AggregatedPosition;

/// Reduces raw holding rows into net positions. No I/O.
pub struct AggregationService;

impl AggregationService {
    pub fn new() -> Self {
        Self
    }

    /// Sum quantities per symbol, one entry per distinct symbol, in the order
    /// each symbol first appears in `holdings`.
    ///
    /// Fully sold symbols are kept with a zero quantity; the valuation engine
    /// skips them.
    pub fn aggregate(&self, holdings: &[Holding]) -> Vec<AggregatedPosition> {
        let mut positions: Vec<AggregatedPosition> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for holding in holdings {
            match index.get(holding.symbol.as_str()) {
                Some(&idx) => positions[idx].net_quantity += holding.quantity,
                None => {
                    index.insert(holding.symbol.as_str(), positions.len());
                    positions.push(AggregatedPosition::new(holding.symbol.clone(), holding.quantity));
                }
            }
        }

        positions
    }

    /// Net quantity for one symbol, 0 if never held.
    pub fn net_quantity(&self, holdings: &[Holding], symbol: &str) -> f64 {
        holdings
            .iter()
            .filter(|h| h.symbol == symbol)
            .map(|h| h.quantity)
            .sum()
    }
}

impl Default for AggregationService {
    fn default() -> Self {
        Self::new()
    }
}
