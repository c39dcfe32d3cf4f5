//! Realized PNL statistics from order history.

use crate::exchange::{HistoryOrder, PositionSide, ORDER_STATE_COMPLETED};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;

/// Number of most recent trades echoed in the snapshot.
pub const RECENT_TRADES: usize = 10;

/// A completed order that closed (part of) a position.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedTrade {
    pub order_id: String,
    pub symbol: String,
    /// Side of the position that was closed
    pub side: PositionSide,
    /// Closed volume in contracts
    pub volume: Decimal,
    pub exit_price: Decimal,
    pub gross_pnl: Decimal,
    pub fee: Decimal,
    pub net_pnl: Decimal,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    update_time: i64,
}

impl ClosedTrade {
    fn from_order(order: HistoryOrder) -> Option<Self> {
        if order.state != ORDER_STATE_COMPLETED || order.deal_vol <= Decimal::ZERO {
            return None;
        }
        let side = order.closed_side()?;
        let fee = order.taker_fee.saturating_add(order.maker_fee);

        Some(Self {
            side,
            volume: order.deal_vol,
            exit_price: order.deal_avg_price,
            gross_pnl: order.profit,
            fee,
            net_pnl: order.profit.saturating_sub(fee),
            closed_at: DateTime::<Utc>::from_timestamp_millis(order.update_time),
            update_time: order.update_time,
            order_id: order.order_id,
            symbol: order.symbol,
        })
    }
}

/// Extract closing trades, newest first.
///
/// Paginated history can return the same order twice when new orders
/// arrive between page requests; the copy with the latest update wins.
pub fn closed_trades(orders: Vec<HistoryOrder>) -> Vec<ClosedTrade> {
    let mut latest: HashMap<String, HistoryOrder> = HashMap::new();
    for order in orders {
        match latest.get(&order.order_id) {
            Some(existing) if existing.update_time >= order.update_time => {}
            _ => {
                latest.insert(order.order_id.clone(), order);
            }
        }
    }

    let mut trades: Vec<ClosedTrade> = latest
        .into_values()
        .filter_map(ClosedTrade::from_order)
        .collect();
    trades.sort_by(|a, b| {
        b.update_time
            .cmp(&a.update_time)
            .then_with(|| b.order_id.cmp(&a.order_id))
    });
    trades
}

/// Aggregate statistics over closed trades.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStats {
    pub count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate_pct: Decimal,
    pub gross_pnl: Decimal,
    pub fees: Decimal,
    pub realized_pnl: Decimal,
    pub best_trade: Option<ClosedTrade>,
    pub worst_trade: Option<ClosedTrade>,
    pub recent: Vec<ClosedTrade>,
    /// History was cut short; figures cover only what was fetched
    pub truncated: bool,
}

impl TradeStats {
    /// Build statistics from raw history orders.
    pub fn from_orders(orders: Vec<HistoryOrder>, truncated: bool) -> Self {
        Self::from_trades(closed_trades(orders), truncated)
    }

    /// Build statistics from trades sorted newest first.
    ///
    /// Ties for best or worst go to the most recent trade.
    pub fn from_trades(trades: Vec<ClosedTrade>, truncated: bool) -> Self {
        let mut best: Option<&ClosedTrade> = None;
        let mut worst: Option<&ClosedTrade> = None;
        let mut gross_pnl = Decimal::ZERO;
        let mut fees = Decimal::ZERO;
        let mut wins = 0;
        let mut losses = 0;

        for trade in &trades {
            gross_pnl = gross_pnl.saturating_add(trade.gross_pnl);
            fees = fees.saturating_add(trade.fee);
            if trade.net_pnl > Decimal::ZERO {
                wins += 1;
            } else if trade.net_pnl < Decimal::ZERO {
                losses += 1;
            }
            if best.map_or(true, |b| trade.net_pnl > b.net_pnl) {
                best = Some(trade);
            }
            if worst.map_or(true, |w| trade.net_pnl < w.net_pnl) {
                worst = Some(trade);
            }
        }

        let count = trades.len();
        let win_rate_pct = if count > 0 {
            Decimal::from(wins) / Decimal::from(count) * dec!(100)
        } else {
            Decimal::ZERO
        };

        Self {
            count,
            wins,
            losses,
            win_rate_pct,
            gross_pnl,
            fees,
            realized_pnl: gross_pnl.saturating_sub(fees),
            best_trade: best.cloned(),
            worst_trade: worst.cloned(),
            recent: trades.iter().take(RECENT_TRADES).cloned().collect(),
            truncated,
        }
    }
}
