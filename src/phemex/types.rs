//! Phemex spot wire types

use serde::{Deserialize, Serialize};

use crate::grid::{GridError, GridResult};

/// Spot prices and quantities travel as integers scaled by 1e8
pub const SPOT_VALUE_SCALE: f64 = 100_000_000.0;

/// Business code returned by `GET /spot/orders` when nothing is resting
pub const NO_OPEN_ORDERS_CODE: i64 = 10002;

pub fn to_scaled(value: f64) -> i64 {
    (value * SPOT_VALUE_SCALE).round() as i64
}

pub fn from_scaled(value: i64) -> f64 {
    value as f64 / SPOT_VALUE_SCALE
}

/// `WIF/USDT` -> `sWIFUSDT`
pub fn spot_symbol(pair: &str) -> String {
    let joined: String = pair
        .split(|c| c == '/' || c == '-')
        .map(|part| part.trim().to_uppercase())
        .collect();
    format!("s{}", joined)
}

/// Envelope of the trading endpoints
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> GridResult<Option<T>> {
        if self.code != 0 {
            return Err(GridError::Api {
                code: self.code,
                message: self.msg,
            });
        }
        Ok(self.data)
    }
}

/// Envelope of the market data endpoints
#[derive(Debug, Deserialize)]
pub struct MarketResponse<T> {
    #[serde(default)]
    pub error: Option<MarketError>,
    #[serde(default = "Option::default")]
    pub result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct MarketError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl<T> MarketResponse<T> {
    pub fn into_result(self) -> GridResult<T> {
        if let Some(err) = self.error {
            return Err(GridError::Api {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .ok_or_else(|| GridError::Exchange("market data response without result".into()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotTicker {
    pub symbol: String,
    #[serde(default)]
    pub ask_ep: i64,
    #[serde(default)]
    pub bid_ep: i64,
    #[serde(default)]
    pub last_ep: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotOrder {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "clOrdID", default)]
    pub cl_ord_id: String,
    #[serde(default)]
    pub symbol: String,
    pub side: String,
    #[serde(rename = "priceEp", default)]
    pub price_ep: i64,
    #[serde(rename = "baseQtyEv", default)]
    pub base_qty_ev: i64,
    #[serde(rename = "leavesBaseQtyEv", default)]
    pub leaves_base_qty_ev: Option<i64>,
    #[serde(rename = "ordStatus", default)]
    pub ord_status: String,
}

impl SpotOrder {
    /// Quantity still resting on the book
    pub fn remaining_qty_ev(&self) -> i64 {
        self.leaves_base_qty_ev.unwrap_or(self.base_qty_ev)
    }
}

/// Open orders come back either as a bare list or wrapped in `rows`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OrderList {
    Rows { rows: Vec<SpotOrder> },
    Plain(Vec<SpotOrder>),
}

impl OrderList {
    pub fn into_vec(self) -> Vec<SpotOrder> {
        match self {
            OrderList::Rows { rows } => rows,
            OrderList::Plain(orders) => orders,
        }
    }
}

/// Body of `POST /spot/orders`
#[derive(Debug, Clone, Serialize)]
pub struct NewSpotOrder {
    pub symbol: String,
    #[serde(rename = "clOrdID")]
    pub cl_ord_id: String,
    pub side: &'static str,
    #[serde(rename = "qtyType")]
    pub qty_type: &'static str,
    #[serde(rename = "baseQtyEv")]
    pub base_qty_ev: i64,
    #[serde(rename = "priceEp")]
    pub price_ep: i64,
    #[serde(rename = "ordType")]
    pub ord_type: &'static str,
    #[serde(rename = "timeInForce")]
    pub time_in_force: &'static str,
}

impl NewSpotOrder {
    /// Good-till-cancel limit order sized in base units
    pub fn limit(symbol: impl Into<String>, side: &'static str, price: f64, qty: f64) -> Self {
        Self {
            symbol: symbol.into(),
            cl_ord_id: uuid::Uuid::new_v4().to_string(),
            side,
            qty_type: "ByBase",
            base_qty_ev: to_scaled(qty),
            price_ep: to_scaled(price),
            ord_type: "Limit",
            time_in_force: "GoodTillCancel",
        }
    }
}
