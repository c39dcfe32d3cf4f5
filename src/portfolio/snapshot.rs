//! Equity reconciliation and the published snapshot document.
//!
//! Assets, positions, tickers and contract specifications are fetched
//! independently and may disagree or be missing. Equity is computed from
//! local mark-to-market PNL only when every aggregated position could be
//! valued; otherwise the exchange's own figures are used so that a partial
//! revaluation is never mixed with a stale total.

use super::trades::TradeStats;
use super::valuation::{value_position, ContractBook, PositionValuation, PriceBook};
use crate::exchange::{AssetBalance, OpenPosition};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::debug;

/// Where the unrealized PNL total came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PnlSource {
    /// Marked locally from tickers and contract sizes
    Computed,
    /// Reported by the exchange on the settlement asset
    Exchange,
}

/// Balances of the settlement asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSummary {
    pub wallet_balance: Decimal,
    pub available_balance: Decimal,
    pub position_margin: Decimal,
    pub frozen_balance: Decimal,
    pub bonus: Decimal,
}

impl BalanceSummary {
    fn from_asset(asset: &AssetBalance) -> Self {
        let wallet_balance = asset.cash_balance.unwrap_or_else(|| {
            asset
                .available_balance
                .saturating_add(asset.frozen_balance)
                .saturating_add(asset.position_margin)
        });

        Self {
            wallet_balance,
            available_balance: asset.available_balance,
            position_margin: asset.position_margin,
            frozen_balance: asset.frozen_balance,
            bonus: asset.bonus,
        }
    }
}

/// Raw material for one snapshot.
#[derive(Debug, Default)]
pub struct SnapshotInputs {
    pub assets: Vec<AssetBalance>,
    pub positions: Vec<OpenPosition>,
    pub prices: PriceBook,
    pub contracts: ContractBook,
    /// `None` when order history could not be fetched
    pub trades: Option<TradeStats>,
    /// Problems already met while fetching
    pub warnings: Vec<String>,
}

/// The document served to the frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub generated_at: DateTime<Utc>,
    pub currency: String,
    pub balance: BalanceSummary,
    pub equity: Decimal,
    pub unrealized_pnl: Decimal,
    pub pnl_source: PnlSource,
    pub exchange_equity: Option<Decimal>,
    /// `equity - exchange_equity`
    pub equity_drift: Option<Decimal>,
    pub positions: Vec<PositionValuation>,
    pub trades: Option<TradeStats>,
    pub warnings: Vec<String>,
}

impl PortfolioSnapshot {
    /// Value positions and reconcile equity against the settlement asset.
    pub fn assemble(
        inputs: SnapshotInputs,
        settle_currency: &str,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let SnapshotInputs {
            assets,
            positions,
            prices,
            contracts,
            trades,
            mut warnings,
        } = inputs;

        let asset = assets
            .iter()
            .find(|a| a.currency.eq_ignore_ascii_case(settle_currency));
        if asset.is_none() {
            warnings.push(format!("No {} balance reported", settle_currency));
        }
        let balance = asset.map(BalanceSummary::from_asset).unwrap_or_default();

        let mut valuations = Vec::with_capacity(positions.len());
        for position in positions.iter().filter(|p| p.is_holding()) {
            match value_position(position, &prices, &contracts) {
                Ok(valued) => valuations.push(valued),
                Err(e) => warnings.push(format!("Skipped position {}", e)),
            }
        }

        let mut computed_pnl = Decimal::ZERO;
        let mut unresolved = Vec::new();
        for valued in &valuations {
            if let Some(coin) = &valued.settle_coin {
                if !coin.eq_ignore_ascii_case(settle_currency) {
                    warnings.push(format!(
                        "{} settles in {}; excluded from {} equity",
                        valued.symbol, coin, settle_currency
                    ));
                    continue;
                }
            }
            // A total that does not fit a Decimal counts as unresolved
            match valued
                .unrealized_pnl
                .and_then(|pnl| computed_pnl.checked_add(pnl))
            {
                Some(total) => computed_pnl = total,
                None => unresolved.push(valued.symbol.as_str()),
            }
        }

        let exchange_equity = asset.and_then(|a| a.equity);
        let computed_equity = balance.wallet_balance.checked_add(computed_pnl);
        let (pnl_source, unrealized_pnl, equity) = match computed_equity {
            Some(equity) if unresolved.is_empty() => (PnlSource::Computed, computed_pnl, equity),
            _ => {
                if unresolved.is_empty() {
                    warnings.push(
                        "Computed equity out of range; using exchange-reported PNL".to_string(),
                    );
                } else {
                    warnings.push(format!(
                        "Could not mark {} to market; using exchange-reported PNL",
                        unresolved.join(", ")
                    ));
                }
                let reported = asset.and_then(|a| a.unrealized).unwrap_or(Decimal::ZERO);
                let equity = exchange_equity
                    .or_else(|| balance.wallet_balance.checked_add(reported))
                    .unwrap_or(balance.wallet_balance);
                (PnlSource::Exchange, reported, equity)
            }
        };
        let equity_drift = exchange_equity.and_then(|reported| equity.checked_sub(reported));

        debug!(
            positions = valuations.len(),
            %equity,
            %unrealized_pnl,
            source = ?pnl_source,
            "Reconciled snapshot"
        );

        valuations.sort_by(by_exposure);

        Self {
            generated_at,
            currency: settle_currency.to_string(),
            balance,
            equity,
            unrealized_pnl,
            pnl_source,
            exchange_equity,
            equity_drift,
            positions: valuations,
            trades,
            warnings,
        }
    }
}

/// Largest absolute notional first, unvalued positions last, then by symbol.
fn by_exposure(a: &PositionValuation, b: &PositionValuation) -> Ordering {
    match (a.notional, b.notional) {
        (Some(x), Some(y)) => y.abs().cmp(&x.abs()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.symbol.cmp(&b.symbol))
}
