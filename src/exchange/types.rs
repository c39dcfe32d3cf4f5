//! Type definitions for MEXC futures API responses.
//!
//! Numeric fields arrive as JSON numbers, numeric strings or `null`
//! depending on endpoint and account state, so every decimal goes through
//! the lenient deserializers in [`crate::utils::decimal`].

use crate::utils::decimal::{lenient, lenient_option};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Response wrapper shared by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub code: i64,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Futures account balance for one currency.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    pub currency: String,
    #[serde(default, deserialize_with = "lenient")]
    pub position_margin: Decimal,
    #[serde(default, deserialize_with = "lenient")]
    pub available_balance: Decimal,
    #[serde(default, deserialize_with = "lenient_option")]
    pub cash_balance: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient")]
    pub frozen_balance: Decimal,
    #[serde(default, deserialize_with = "lenient_option")]
    pub equity: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub unrealized: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient")]
    pub bonus: Decimal,
}

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Sign applied to `mark - entry` when computing PNL.
    pub fn sign(&self) -> Decimal {
        match self {
            PositionSide::Long => Decimal::ONE,
            PositionSide::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

/// An open futures position as reported by the exchange.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPosition {
    #[serde(default)]
    pub position_id: i64,
    pub symbol: String,
    /// 1 = long, 2 = short
    #[serde(default)]
    pub position_type: i32,
    /// 1 = isolated, 2 = cross
    #[serde(default)]
    pub open_type: i32,
    /// 1 = holding, 2 = system holding, 3 = closed
    #[serde(default = "default_holding_state")]
    pub state: i32,
    /// Held volume in contracts
    #[serde(default, deserialize_with = "lenient")]
    pub hold_vol: Decimal,
    #[serde(default, deserialize_with = "lenient")]
    pub hold_avg_price: Decimal,
    #[serde(default, deserialize_with = "lenient")]
    pub open_avg_price: Decimal,
    #[serde(default, deserialize_with = "lenient_option")]
    pub liquidate_price: Option<Decimal>,
    /// Initial margin
    #[serde(default, deserialize_with = "lenient")]
    pub im: Decimal,
    #[serde(default, deserialize_with = "lenient")]
    pub realised: Decimal,
    #[serde(default)]
    pub leverage: Option<u32>,
    #[serde(default)]
    pub create_time: i64,
    #[serde(default)]
    pub update_time: i64,
}

fn default_holding_state() -> i32 {
    1
}

impl OpenPosition {
    /// Direction of the position, `None` for codes this service does not know.
    pub fn side(&self) -> Option<PositionSide> {
        match self.position_type {
            1 => Some(PositionSide::Long),
            2 => Some(PositionSide::Short),
            _ => None,
        }
    }

    /// Whether the exchange still considers the position open.
    pub fn is_holding(&self) -> bool {
        matches!(self.state, 1 | 2) && self.hold_vol > Decimal::ZERO
    }

    /// Average entry price, falling back to the opening average.
    pub fn entry_price(&self) -> Decimal {
        if self.hold_avg_price > Decimal::ZERO {
            self.hold_avg_price
        } else {
            self.open_avg_price
        }
    }
}

/// Contract ticker.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub symbol: String,
    #[serde(default, deserialize_with = "lenient_option")]
    pub last_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub fair_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub index_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub bid1: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub ask1: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub funding_rate: Option<Decimal>,
    #[serde(default)]
    pub timestamp: i64,
}

/// Contract specification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetail {
    pub symbol: String,
    #[serde(default)]
    pub base_coin: String,
    #[serde(default)]
    pub quote_coin: String,
    #[serde(default)]
    pub settle_coin: String,
    /// Underlying quantity per contract
    #[serde(default, deserialize_with = "lenient_option")]
    pub contract_size: Option<Decimal>,
    #[serde(default)]
    pub state: i32,
}

/// A historical order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryOrder {
    #[serde(deserialize_with = "order_id")]
    pub order_id: String,
    pub symbol: String,
    #[serde(default)]
    pub position_id: i64,
    /// 1 = open long, 2 = close short, 3 = open short, 4 = close long
    #[serde(default)]
    pub side: i32,
    /// 3 = completed
    #[serde(default)]
    pub state: i32,
    #[serde(default, deserialize_with = "lenient")]
    pub deal_vol: Decimal,
    #[serde(default, deserialize_with = "lenient")]
    pub deal_avg_price: Decimal,
    #[serde(default, deserialize_with = "lenient")]
    pub profit: Decimal,
    #[serde(default, deserialize_with = "lenient")]
    pub taker_fee: Decimal,
    #[serde(default, deserialize_with = "lenient")]
    pub maker_fee: Decimal,
    #[serde(default)]
    pub leverage: Option<u32>,
    #[serde(default)]
    pub create_time: i64,
    #[serde(default)]
    pub update_time: i64,
}

pub const ORDER_STATE_COMPLETED: i32 = 3;

impl HistoryOrder {
    /// Side of the position this order closed, `None` for opening orders.
    pub fn closed_side(&self) -> Option<PositionSide> {
        match self.side {
            4 => Some(PositionSide::Long),
            2 => Some(PositionSide::Short),
            _ => None,
        }
    }
}

/// Order ids are large integers on some endpoints and strings on others.
fn order_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// History page, either a bare list or a paged object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawOrderPage {
    List(Vec<HistoryOrder>),
    Paged {
        #[serde(rename = "resultList", default)]
        result_list: Vec<HistoryOrder>,
        #[serde(rename = "totalPage", default)]
        total_page: Option<u32>,
    },
}

impl Default for RawOrderPage {
    fn default() -> Self {
        RawOrderPage::List(Vec::new())
    }
}

/// One page of historical orders.
#[derive(Debug, Clone, Default)]
pub struct OrderPage {
    pub orders: Vec<HistoryOrder>,
    /// Total number of pages, when the exchange reports it
    pub total_pages: Option<u32>,
}

impl From<RawOrderPage> for OrderPage {
    fn from(raw: RawOrderPage) -> Self {
        match raw {
            RawOrderPage::List(orders) => Self {
                orders,
                total_pages: None,
            },
            RawOrderPage::Paged {
                result_list,
                total_page,
            } => Self {
                orders: result_list,
                total_pages: total_page,
            },
        }
    }
}

/// Parameters for a history page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    /// 1-based page number
    pub page_num: u32,
    pub page_size: u32,
    /// Window start, epoch milliseconds
    pub start_time: i64,
    /// Window end, epoch milliseconds
    pub end_time: i64,
}

impl HistoryQuery {
    /// Query parameters as sent on the wire.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page_num", self.page_num.to_string()),
            ("page_size", self.page_size.to_string()),
            ("start_time", self.start_time.to_string()),
            ("end_time", self.end_time.to_string()),
            ("states", ORDER_STATE_COMPLETED.to_string()),
        ]
    }
}
