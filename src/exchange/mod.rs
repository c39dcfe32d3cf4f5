//! Exchange integration for the PNL feed.
//!
//! ## MEXC futures
//! Signed REST access to the USDT-margined contract API:
//! - Account data (assets, open positions, order history)
//! - Market data (tickers, contract specifications)
//!
//! Everything above this module talks to [`FuturesGateway`], never to the
//! client directly.

mod client;
mod error;
mod traits;
mod types;

pub use client::MexcClient;
pub use error::{ExchangeError, ExchangeResult};
#[cfg(test)]
pub use traits::MockFuturesGateway;
pub use traits::FuturesGateway;
pub use types::*;
