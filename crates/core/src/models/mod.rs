pub mod chart;
pub mod holding;
pub mod position;
pub mod price;
pub mod settings;
pub mod valuation;
