//! Mark-to-market valuation of open positions.
//!
//! Combines a position with the latest ticker and the contract
//! specification. Missing inputs leave the affected figures unresolved
//! instead of being guessed; the snapshot decides how to fall back.

use crate::exchange::{ContractDetail, OpenPosition, PositionSide, Ticker};
use crate::utils::decimal::percent_of;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Which ticker field supplied the mark price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Last,
    Fair,
}

/// Latest tickers keyed by symbol.
#[derive(Debug, Default)]
pub struct PriceBook {
    tickers: HashMap<String, Ticker>,
}

impl PriceBook {
    pub fn new(tickers: Vec<Ticker>) -> Self {
        Self {
            tickers: tickers
                .into_iter()
                .map(|t| (t.symbol.clone(), t))
                .collect(),
        }
    }

    /// Last traded price when positive, otherwise the fair price when positive.
    pub fn mark_price(&self, symbol: &str) -> Option<(Decimal, PriceSource)> {
        let ticker = self.tickers.get(symbol)?;
        let positive = |p: Option<Decimal>| p.filter(|v| *v > Decimal::ZERO);

        positive(ticker.last_price)
            .map(|p| (p, PriceSource::Last))
            .or_else(|| positive(ticker.fair_price).map(|p| (p, PriceSource::Fair)))
    }
}

/// Contract specifications keyed by symbol.
#[derive(Debug, Default)]
pub struct ContractBook {
    contracts: HashMap<String, ContractDetail>,
}

impl ContractBook {
    pub fn new(contracts: Vec<ContractDetail>) -> Self {
        Self {
            contracts: contracts
                .into_iter()
                .map(|c| (c.symbol.clone(), c))
                .collect(),
        }
    }

    /// Underlying quantity per contract, `None` when unknown or not positive.
    pub fn contract_size(&self, symbol: &str) -> Option<Decimal> {
        self.contracts
            .get(symbol)
            .and_then(|c| c.contract_size)
            .filter(|size| *size > Decimal::ZERO)
    }

    /// Settlement coin of the contract, if the exchange reported one.
    pub fn settle_coin(&self, symbol: &str) -> Option<&str> {
        self.contracts
            .get(symbol)
            .map(|c| c.settle_coin.as_str())
            .filter(|coin| !coin.is_empty())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValuationError {
    #[error("{symbol}: unknown position type {code}")]
    UnknownSide { symbol: String, code: i32 },
}

/// One open position marked to market.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionValuation {
    pub position_id: i64,
    pub symbol: String,
    pub side: PositionSide,
    /// Held volume in contracts
    pub contracts: Decimal,
    pub contract_size: Option<Decimal>,
    /// Held volume in the underlying asset
    pub quantity: Option<Decimal>,
    pub entry_price: Decimal,
    pub mark_price: Option<Decimal>,
    pub price_source: Option<PriceSource>,
    pub notional: Option<Decimal>,
    pub margin: Decimal,
    pub leverage: Option<u32>,
    pub liquidation_price: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub roe_pct: Option<Decimal>,
    #[serde(skip)]
    pub settle_coin: Option<String>,
}

impl PositionValuation {
    /// Whether PNL could be computed from local inputs.
    pub fn is_resolved(&self) -> bool {
        self.unrealized_pnl.is_some()
    }
}

/// Value a single open position.
pub fn value_position(
    position: &OpenPosition,
    prices: &PriceBook,
    contracts: &ContractBook,
) -> Result<PositionValuation, ValuationError> {
    let side = position.side().ok_or_else(|| ValuationError::UnknownSide {
        symbol: position.symbol.clone(),
        code: position.position_type,
    })?;

    let entry_price = position.entry_price();
    let contract_size = contracts.contract_size(&position.symbol);
    let quantity = contract_size.and_then(|size| position.hold_vol.checked_mul(size));
    let mark = prices.mark_price(&position.symbol);
    let mark_price = mark.map(|(price, _)| price);

    // Overflow leaves the figure unresolved, same as a missing input
    let unrealized_pnl = match (quantity, mark_price) {
        (Some(qty), Some(price)) if entry_price > Decimal::ZERO => price
            .checked_sub(entry_price)
            .and_then(|move_| move_.checked_mul(qty))
            .and_then(|pnl| pnl.checked_mul(side.sign())),
        _ => None,
    };
    let notional = match (quantity, mark_price) {
        (Some(qty), Some(price)) => price.checked_mul(qty),
        _ => None,
    };
    let roe_pct = unrealized_pnl.and_then(|pnl| percent_of(pnl, position.im));

    Ok(PositionValuation {
        position_id: position.position_id,
        symbol: position.symbol.clone(),
        side,
        contracts: position.hold_vol,
        contract_size,
        quantity,
        entry_price,
        mark_price,
        price_source: mark.map(|(_, source)| source),
        notional,
        margin: position.im,
        leverage: position.leverage,
        liquidation_price: position.liquidate_price.filter(|p| *p > Decimal::ZERO),
        unrealized_pnl,
        roe_pct,
        settle_coin: contracts.settle_coin(&position.symbol).map(str::to_string),
    })
}
