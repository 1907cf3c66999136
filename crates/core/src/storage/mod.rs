pub mod holdings_store;
pub mod migrations;
