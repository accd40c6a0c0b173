//! Core data types for grid trading

use std::fmt;

use serde::{Deserialize, Serialize};

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Convert to exchange side string
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }
}

impl From<&str> for OrderSide {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "B" | "BUY" | "BID" => OrderSide::Buy,
            _ => OrderSide::Sell,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// A resting order as reported by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    /// Exchange order ID
    pub id: String,
    pub side: OrderSide,
    /// Limit price
    pub price: f64,
    /// Remaining quantity in base units
    pub amount: f64,
}

impl OpenOrder {
    pub fn new(id: impl Into<String>, side: OrderSide, price: f64, amount: f64) -> Self {
        Self {
            id: id.into(),
            side,
            price,
            amount,
        }
    }
}

/// Best bid/ask snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ticker {
    pub bid: f64,
    pub ask: f64,
    /// Last traded price
    pub last: f64,
}

impl Ticker {
    /// Midpoint of best bid and best ask
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// Request to place a limit order
#[derive(Debug, Clone, PartialEq)]
pub struct LimitOrderRequest {
    pub side: OrderSide,
    pub price: f64,
    pub amount: f64,
}

impl LimitOrderRequest {
    pub fn buy(price: f64, amount: f64) -> Self {
        Self {
            side: OrderSide::Buy,
            price,
            amount,
        }
    }

    pub fn sell(price: f64, amount: f64) -> Self {
        Self {
            side: OrderSide::Sell,
            price,
            amount,
        }
    }
}

/// Acknowledgement returned by the exchange for a new order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    /// Exchange order ID
    pub id: String,
    pub side: OrderSide,
    pub price: f64,
    pub amount: f64,
}

impl fmt::Display for OrderAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={} {} {} @ {}",
            self.id, self.side, self.amount, self.price
        )
    }
}

/// Control loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Normal reconciliation cycles
    Running,
    /// Entered after a cycle failed; resumes after the recovery delay
    Recovering,
}

/// Outcome counters for one reconciliation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cancelled: u32,
    pub cancel_failures: u32,
    pub placed: u32,
    pub place_failures: u32,
}

impl CycleReport {
    pub fn merge(mut self, other: CycleReport) -> Self {
        self.cancelled += other.cancelled;
        self.cancel_failures += other.cancel_failures;
        self.placed += other.placed;
        self.place_failures += other.place_failures;
        self
    }
}
