//! Fetch-aggregate-compute pipeline behind the portfolio endpoint.

use super::snapshot::{PortfolioSnapshot, SnapshotInputs};
use super::trades::TradeStats;
use super::valuation::{ContractBook, PriceBook};
use crate::config::PortfolioConfig;
use crate::exchange::{FuturesGateway, HistoryOrder, HistoryQuery};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Orders gathered from paginated history.
#[derive(Debug, Default)]
pub struct HistoryFetch {
    pub orders: Vec<HistoryOrder>,
    pub pages: u32,
    /// More history exists than was fetched
    pub truncated: bool,
}

/// Builds portfolio snapshots from a futures gateway.
pub struct PortfolioService {
    gateway: Arc<dyn FuturesGateway>,
    config: PortfolioConfig,
}

impl PortfolioService {
    pub fn new(gateway: Arc<dyn FuturesGateway>, config: PortfolioConfig) -> Self {
        Self { gateway, config }
    }

    /// Fetch every source concurrently and assemble one snapshot.
    ///
    /// Assets and positions are required. Tickers, contract details and
    /// history degrade the snapshot with a warning when they fail.
    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> Result<PortfolioSnapshot> {
        let now = Utc::now();
        let start = now - Duration::days(i64::from(self.config.history_lookback_days));

        let (assets, positions, tickers, contracts, history) = tokio::join!(
            self.gateway.account_assets(),
            self.gateway.open_positions(),
            self.gateway.tickers(),
            self.gateway.contracts(),
            self.fetch_history(start.timestamp_millis(), now.timestamp_millis()),
        );

        let assets = assets.context("Failed to fetch account assets")?;
        let positions = positions.context("Failed to fetch open positions")?;

        let mut warnings = Vec::new();

        let prices = match tickers {
            Ok(tickers) => PriceBook::new(tickers),
            Err(e) => {
                warn!("Failed to fetch tickers: {}", e);
                warnings.push(format!("Tickers unavailable: {}", e));
                PriceBook::default()
            }
        };

        let contracts = match contracts {
            Ok(contracts) => ContractBook::new(contracts),
            Err(e) => {
                warn!("Failed to fetch contract details: {}", e);
                warnings.push(format!("Contract details unavailable: {}", e));
                ContractBook::default()
            }
        };

        let trades = match history {
            Ok(fetch) => {
                if fetch.truncated {
                    warnings.push(format!(
                        "Trade history truncated after {} page(s)",
                        fetch.pages
                    ));
                }
                Some(TradeStats::from_orders(fetch.orders, fetch.truncated))
            }
            Err(e) => {
                warn!("Failed to fetch order history: {:#}", e);
                warnings.push(format!("Trade history unavailable: {}", e));
                None
            }
        };

        let snapshot = PortfolioSnapshot::assemble(
            SnapshotInputs {
                assets,
                positions,
                prices,
                contracts,
                trades,
                warnings,
            },
            &self.config.settle_currency,
            now,
        );

        info!(
            equity = %snapshot.equity,
            unrealized_pnl = %snapshot.unrealized_pnl,
            positions = snapshot.positions.len(),
            warnings = snapshot.warnings.len(),
            "Portfolio snapshot ready"
        );
        for warning in &snapshot.warnings {
            warn!("{}", warning);
        }

        Ok(snapshot)
    }

    /// Page through completed orders in `[start_time, end_time]`.
    ///
    /// A failure on the first page is an error. A failure on a later page
    /// keeps what was already fetched and marks the result truncated.
    #[instrument(skip(self))]
    pub async fn fetch_history(&self, start_time: i64, end_time: i64) -> Result<HistoryFetch> {
        let page_size = self.config.history_page_size;
        let mut fetch = HistoryFetch::default();

        for page_num in 1..=self.config.history_max_pages {
            let query = HistoryQuery {
                page_num,
                page_size,
                start_time,
                end_time,
            };

            let page = match self.gateway.history_orders(query).await {
                Ok(page) => page,
                Err(e) if page_num == 1 => {
                    return Err(e).context("Failed to fetch first history page");
                }
                Err(e) => {
                    warn!(page_num, "History page failed, keeping earlier pages: {}", e);
                    fetch.truncated = true;
                    break;
                }
            };

            let received = page.orders.len();
            fetch.pages = page_num;
            fetch.orders.extend(page.orders);

            let short_page = received < page_size as usize;
            let last_reported = page.total_pages.is_some_and(|total| page_num >= total);
            if short_page || last_reported {
                return Ok(fetch);
            }
        }

        // Page cap reached, or a later page failed
        fetch.truncated = true;
        Ok(fetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{
        AssetBalance, ContractDetail, ExchangeError, MockFuturesGateway, OpenPosition, OrderPage,
        Ticker,
    };
    use crate::portfolio::PnlSource;
    use mockall::predicate::function;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn config(page_size: u32, max_pages: u32) -> PortfolioConfig {
        PortfolioConfig {
            settle_currency: "USDT".to_string(),
            history_page_size: page_size,
            history_max_pages: max_pages,
            history_lookback_days: 30,
        }
    }

    fn assets() -> Vec<AssetBalance> {
        serde_json::from_value(json!([{
            "currency": "USDT",
            "positionMargin": 60,
            "availableBalance": 940,
            "cashBalance": 1000,
            "frozenBalance": 0,
            "equity": 1009,
            "unrealized": 9
        }]))
        .unwrap()
    }

    fn positions() -> Vec<OpenPosition> {
        serde_json::from_value(json!([{
            "positionId": 11,
            "symbol": "BTC_USDT",
            "positionType": 1,
            "state": 1,
            "holdVol": 100,
            "holdAvgPrice": 60000,
            "im": 60,
            "leverage": 10
        }]))
        .unwrap()
    }

    fn tickers() -> Vec<Ticker> {
        serde_json::from_value(json!([{"symbol": "BTC_USDT", "lastPrice": 61000, "fairPrice": 60990}]))
            .unwrap()
    }

    fn contracts() -> Vec<ContractDetail> {
        serde_json::from_value(json!([{"symbol": "BTC_USDT", "contractSize": 0.0001, "settleCoin": "USDT"}]))
            .unwrap()
    }

    fn orders(ids: std::ops::Range<u32>) -> Vec<HistoryOrder> {
        ids.map(|id| {
            serde_json::from_value(json!({
                "orderId": id,
                "symbol": "BTC_USDT",
                "side": 4,
                "state": 3,
                "dealVol": 10,
                "profit": 2,
                "takerFee": 0.5,
                "updateTime": 1_700_000_000_000_i64 + i64::from(id)
            }))
            .unwrap()
        })
        .collect()
    }

    fn page(ids: std::ops::Range<u32>) -> OrderPage {
        OrderPage {
            orders: orders(ids),
            total_pages: None,
        }
    }

    fn api_error() -> ExchangeError {
        ExchangeError::Api {
            code: 510,
            message: "Requests are too frequent".to_string(),
        }
    }

    fn healthy_gateway() -> MockFuturesGateway {
        let mut gateway = MockFuturesGateway::new();
        gateway.expect_account_assets().returning(|| Ok(assets()));
        gateway.expect_open_positions().returning(|| Ok(positions()));
        gateway.expect_tickers().returning(|| Ok(tickers()));
        gateway.expect_contracts().returning(|| Ok(contracts()));
        gateway
    }

    #[tokio::test]
    async fn test_snapshot_with_all_sources() {
        let mut gateway = healthy_gateway();
        gateway
            .expect_history_orders()
            .returning(|_| Ok(page(0..3)));

        let service = PortfolioService::new(Arc::new(gateway), config(100, 5));
        let snapshot = service.snapshot().await.unwrap();

        assert_eq!(snapshot.unrealized_pnl, dec!(10));
        assert_eq!(snapshot.equity, dec!(1010));
        assert_eq!(snapshot.equity_drift, Some(dec!(1)));
        let trades = snapshot.trades.unwrap();
        assert_eq!(trades.count, 3);
        assert_eq!(trades.realized_pnl, dec!(4.5));
        assert!(!trades.truncated);
        assert!(snapshot.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_assets_failure_fails_snapshot() {
        let mut gateway = MockFuturesGateway::new();
        gateway
            .expect_account_assets()
            .returning(|| Err(api_error()));
        gateway.expect_open_positions().returning(|| Ok(positions()));
        gateway.expect_tickers().returning(|| Ok(tickers()));
        gateway.expect_contracts().returning(|| Ok(contracts()));
        gateway
            .expect_history_orders()
            .returning(|_| Ok(page(0..1)));

        let service = PortfolioService::new(Arc::new(gateway), config(100, 5));
        let err = service.snapshot().await.unwrap_err();

        assert!(format!("{:#}", err).contains("account assets"));
    }

    #[tokio::test]
    async fn test_positions_failure_fails_snapshot() {
        let mut gateway = MockFuturesGateway::new();
        gateway.expect_account_assets().returning(|| Ok(assets()));
        gateway
            .expect_open_positions()
            .returning(|| Err(api_error()));
        gateway.expect_tickers().returning(|| Ok(tickers()));
        gateway.expect_contracts().returning(|| Ok(contracts()));
        gateway
            .expect_history_orders()
            .returning(|_| Ok(page(0..1)));

        let service = PortfolioService::new(Arc::new(gateway), config(100, 5));
        let err = service.snapshot().await.unwrap_err();

        assert!(format!("{:#}", err).contains("open positions"));
    }

    #[tokio::test]
    async fn test_contracts_failure_degrades_to_exchange_pnl() {
        let mut gateway = MockFuturesGateway::new();
        gateway.expect_account_assets().returning(|| Ok(assets()));
        gateway.expect_open_positions().returning(|| Ok(positions()));
        gateway.expect_tickers().returning(|| Ok(tickers()));
        gateway.expect_contracts().returning(|| Err(api_error()));
        gateway
            .expect_history_orders()
            .returning(|_| Ok(page(0..1)));

        let service = PortfolioService::new(Arc::new(gateway), config(100, 5));
        let snapshot = service.snapshot().await.unwrap();

        assert_eq!(snapshot.pnl_source, PnlSource::Exchange);
        assert_eq!(snapshot.unrealized_pnl, dec!(9));
        assert_eq!(snapshot.equity, dec!(1009));
        assert_eq!(snapshot.positions[0].contract_size, None);
        assert!(snapshot
            .warnings
            .iter()
            .any(|w| w.starts_with("Contract details unavailable")));
    }

    #[tokio::test]
    async fn test_ticker_failure_degrades_to_exchange_pnl() {
        let mut gateway = MockFuturesGateway::new();
        gateway.expect_account_assets().returning(|| Ok(assets()));
        gateway.expect_open_positions().returning(|| Ok(positions()));
        gateway.expect_tickers().returning(|| Err(api_error()));
        gateway.expect_contracts().returning(|| Ok(contracts()));
        gateway
            .expect_history_orders()
            .returning(|_| Ok(page(0..1)));

        let service = PortfolioService::new(Arc::new(gateway), config(100, 5));
        let snapshot = service.snapshot().await.unwrap();

        assert_eq!(snapshot.unrealized_pnl, dec!(9));
        assert_eq!(snapshot.equity, dec!(1009));
        assert!(snapshot.warnings.iter().any(|w| w.starts_with("Tickers unavailable")));
    }

    #[tokio::test]
    async fn test_history_failure_leaves_trades_empty() {
        let mut gateway = healthy_gateway();
        gateway
            .expect_history_orders()
            .returning(|_| Err(api_error()));

        let service = PortfolioService::new(Arc::new(gateway), config(100, 5));
        let snapshot = service.snapshot().await.unwrap();

        assert!(snapshot.trades.is_none());
        assert_eq!(snapshot.equity, dec!(1010));
        assert!(snapshot.warnings.iter().any(|w| w.starts_with("Trade history unavailable")));
    }

    #[tokio::test]
    async fn test_history_stops_on_short_page() {
        let mut gateway = MockFuturesGateway::new();
        gateway
            .expect_history_orders()
            .with(function(|q: &HistoryQuery| q.page_num == 1))
            .times(1)
            .returning(|_| Ok(page(0..2)));
        gateway
            .expect_history_orders()
            .with(function(|q: &HistoryQuery| q.page_num == 2))
            .times(1)
            .returning(|_| Ok(page(2..3)));

        let service = PortfolioService::new(Arc::new(gateway), config(2, 5));
        let fetch = service.fetch_history(0, 1).await.unwrap();

        assert_eq!(fetch.orders.len(), 3);
        assert_eq!(fetch.pages, 2);
        assert!(!fetch.truncated);
    }

    #[tokio::test]
    async fn test_history_stops_at_reported_total() {
        let mut gateway = MockFuturesGateway::new();
        gateway
            .expect_history_orders()
            .times(1)
            .returning(|_| {
                Ok(OrderPage {
                    orders: orders(0..2),
                    total_pages: Some(1),
                })
            });

        let service = PortfolioService::new(Arc::new(gateway), config(2, 5));
        let fetch = service.fetch_history(0, 1).await.unwrap();

        assert_eq!(fetch.pages, 1);
        assert!(!fetch.truncated);
    }

    #[tokio::test]
    async fn test_history_page_cap_marks_truncated() {
        let mut gateway = MockFuturesGateway::new();
        gateway
            .expect_history_orders()
            .times(2)
            .returning(|q| {
                let first = (q.page_num - 1) * 2;
                Ok(page(first..first + 2))
            });

        let service = PortfolioService::new(Arc::new(gateway), config(2, 2));
        let fetch = service.fetch_history(0, 1).await.unwrap();

        assert_eq!(fetch.orders.len(), 4);
        assert!(fetch.truncated);
    }

    #[tokio::test]
    async fn test_history_later_page_failure_keeps_earlier_pages() {
        let mut gateway = MockFuturesGateway::new();
        gateway
            .expect_history_orders()
            .with(function(|q: &HistoryQuery| q.page_num == 1))
            .returning(|_| Ok(page(0..2)));
        gateway
            .expect_history_orders()
            .with(function(|q: &HistoryQuery| q.page_num == 2))
            .returning(|_| Err(api_error()));

        let service = PortfolioService::new(Arc::new(gateway), config(2, 5));
        let fetch = service.fetch_history(0, 1).await.unwrap();

        assert_eq!(fetch.orders.len(), 2);
        assert_eq!(fetch.pages, 1);
        assert!(fetch.truncated);
    }

    #[tokio::test]
    async fn test_order_repeated_across_pages_counts_once() {
        let mut gateway = MockFuturesGateway::new();
        gateway
            .expect_history_orders()
            .with(function(|q: &HistoryQuery| q.page_num == 1))
            .times(1)
            .returning(|_| Ok(page(0..2)));
        gateway
            .expect_history_orders()
            .with(function(|q: &HistoryQuery| q.page_num == 2))
            .times(1)
            .returning(|_| {
                // Order 1 shifted onto this page and was updated in between
                let mut shifted = page(1..3);
                shifted.orders[0].profit = dec!(5);
                shifted.orders[0].update_time += 60_000;
                Ok(shifted)
            });
        gateway
            .expect_history_orders()
            .with(function(|q: &HistoryQuery| q.page_num == 3))
            .times(1)
            .returning(|_| Ok(page(3..4)));

        let service = PortfolioService::new(Arc::new(gateway), config(2, 5));
        let fetch = service.fetch_history(0, 1).await.unwrap();
        assert_eq!(fetch.orders.len(), 5);

        let stats = TradeStats::from_orders(fetch.orders, fetch.truncated);

        assert_eq!(stats.count, 4);
        assert_eq!(stats.wins, 4);
        // Orders 0, 2 and 3 net 1.5 each; the updated order 1 nets 4.5
        assert_eq!(stats.realized_pnl, dec!(9));
        assert_eq!(stats.best_trade.unwrap().order_id, "1");
    }
}
