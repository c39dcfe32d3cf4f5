//! # Futures PNL Feed
//!
//! Reads a MEXC futures account and republishes its equity, open
//! positions and realized trade statistics as one JSON document for a
//! static frontend.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Signed MEXC REST client behind the `FuturesGateway` trait
//! - `portfolio`: Position valuation, equity reconciliation, trade stats
//! - `server`: Axum router serving the snapshot
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod exchange;
pub mod portfolio;
pub mod server;
pub mod utils;

pub use config::Config;
