//! Portfolio aggregation: position valuation, equity reconciliation and
//! realized trade statistics.

mod service;
mod snapshot;
mod trades;
mod valuation;

pub use service::{HistoryFetch, PortfolioService};
pub use snapshot::{BalanceSummary, PnlSource, PortfolioSnapshot, SnapshotInputs};
pub use trades::{closed_trades, ClosedTrade, TradeStats};
pub use valuation::{
    value_position, ContractBook, PositionValuation, PriceBook, PriceSource, ValuationError,
};
