//! Exchange-agnostic seam between the portfolio logic and the signed REST
//! transport.
//!
//! The portfolio service only needs read access to five data sets. Keeping
//! them behind a trait lets the reconciliation code be exercised against
//! scripted responses, including partial failures.

use super::error::ExchangeResult;
use super::types::{AssetBalance, ContractDetail, HistoryQuery, OpenPosition, OrderPage, Ticker};
use async_trait::async_trait;

/// Read-only access to a futures account and its market data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FuturesGateway: Send + Sync {
    /// Balances per currency (authenticated).
    async fn account_assets(&self) -> ExchangeResult<Vec<AssetBalance>>;

    /// Currently open positions (authenticated).
    async fn open_positions(&self) -> ExchangeResult<Vec<OpenPosition>>;

    /// Tickers for every listed contract (public).
    async fn tickers(&self) -> ExchangeResult<Vec<Ticker>>;

    /// Contract specifications for every listed contract (public).
    async fn contracts(&self) -> ExchangeResult<Vec<ContractDetail>>;

    /// One page of completed historical orders (authenticated).
    async fn history_orders(&self, query: HistoryQuery) -> ExchangeResult<OrderPage>;
}
