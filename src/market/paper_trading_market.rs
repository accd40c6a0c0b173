//! Paper Trading Exchange Implementation
//!
//! Reads live quotes from a real exchange but simulates order execution
//! locally by checking the mid price against resting order limits.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::grid::{GridError, GridExchange, GridResult, OpenOrder, OrderAck, OrderSide, Ticker};

/// Input configuration for creating a PaperExchange
#[derive(Debug, Clone, Deserialize)]
pub struct PaperTradingInput {
    /// Starting quote balance (e.g., USDT)
    #[serde(default = "default_initial_quote")]
    pub initial_quote: f64,
    /// Starting base balance (e.g., WIF)
    #[serde(default)]
    pub initial_base: f64,
    /// Fee charged on every simulated fill (e.g., 0.0001 = 0.01%)
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
}

fn default_initial_quote() -> f64 {
    10_000.0
}

fn default_fee_rate() -> f64 {
    0.0001
}

impl Default for PaperTradingInput {
    fn default() -> Self {
        Self {
            initial_quote: default_initial_quote(),
            initial_base: 0.0,
            fee_rate: default_fee_rate(),
        }
    }
}

/// Simulated account balances
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PaperBalances {
    pub base: f64,
    pub quote: f64,
    pub total_fees: f64,
    pub fills: u32,
}

impl PaperBalances {
    fn apply_fill(&mut self, side: OrderSide, qty: f64, price: f64, fee_rate: f64) {
        let notional = qty * price;
        let fee = notional * fee_rate;

        match side {
            OrderSide::Buy => {
                self.base += qty;
                self.quote -= notional + fee;
            }
            OrderSide::Sell => {
                self.base -= qty;
                self.quote += notional - fee;
            }
        }
        self.total_fees += fee;
        self.fills += 1;
    }

    /// Account value in quote units at `price`
    pub fn equity(&self, price: f64) -> f64 {
        self.quote + self.base * price
    }
}

/// Order resting in the simulated book
#[derive(Debug, Clone)]
struct PaperOrder {
    id: String,
    side: OrderSide,
    price: f64,
    amount: f64,
}

impl PaperOrder {
    /// Check if this order should be filled at the given price
    fn should_fill(&self, mid_price: f64) -> bool {
        match self.side {
            // Buy order fills when mid price <= limit price
            OrderSide::Buy => mid_price <= self.price,
            // Sell order fills when mid price >= limit price
            OrderSide::Sell => mid_price >= self.price,
        }
    }

    fn to_open_order(&self) -> OpenOrder {
        OpenOrder::new(self.id.clone(), self.side, self.price, self.amount)
    }
}

/// Paper trading exchange
///
/// Quotes come from `source`; orders never leave the process. Each
/// `fetch_open_orders` call first matches resting orders against the
/// current mid price, so fills surface once per reconciliation cycle.
/// Orders fill in full at the mid price. Balances are tracked but not
/// enforced.
pub struct PaperExchange<S: GridExchange> {
    source: S,
    fee_rate: f64,
    orders: Mutex<Vec<PaperOrder>>,
    balances: Mutex<PaperBalances>,
    next_id: AtomicU64,
}

impl<S: GridExchange> PaperExchange<S> {
    pub fn new(source: S, input: PaperTradingInput) -> Self {
        info!(
            "Paper trading with {} quote / {} base, fee rate {}",
            input.initial_quote, input.initial_base, input.fee_rate
        );

        Self {
            source,
            fee_rate: input.fee_rate,
            orders: Mutex::new(Vec::new()),
            balances: Mutex::new(PaperBalances {
                base: input.initial_base,
                quote: input.initial_quote,
                ..PaperBalances::default()
            }),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn balances(&self) -> PaperBalances {
        *self.balances.lock().await
    }

    /// Fill every resting order crossed by `mid_price`; returns the fill count
    pub async fn match_orders(&self, mid_price: f64) -> u32 {
        let mut orders = self.orders.lock().await;
        let mut balances = self.balances.lock().await;
        let mut filled = 0;

        orders.retain(|order| {
            if !order.should_fill(mid_price) {
                return true;
            }
            balances.apply_fill(order.side, order.amount, mid_price, self.fee_rate);
            filled += 1;
            info!(
                "Paper fill: {} {} @ {} (limit {}, id {})",
                order.side, order.amount, mid_price, order.price, order.id
            );
            false
        });

        if filled > 0 {
            info!(
                "Paper balances: base={:.6}, quote={:.4}, equity={:.4}, fees={:.6}",
                balances.base,
                balances.quote,
                balances.equity(mid_price),
                balances.total_fees
            );
        }

        filled
    }

    async fn rest(&self, side: OrderSide, amount: f64, price: f64) -> GridResult<OrderAck> {
        if !(amount > 0.0 && price > 0.0) {
            return Err(GridError::Exchange(format!(
                "rejected paper order: amount {} price {}",
                amount, price
            )));
        }

        let id = format!("paper-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.orders.lock().await.push(PaperOrder {
            id: id.clone(),
            side,
            price,
            amount,
        });

        Ok(OrderAck {
            id,
            side,
            price,
            amount,
        })
    }
}

#[async_trait]
impl<S: GridExchange> GridExchange for PaperExchange<S> {
    async fn fetch_ticker(&self, pair: &str) -> GridResult<Ticker> {
        self.source.fetch_ticker(pair).await
    }

    async fn fetch_open_orders(&self, pair: &str) -> GridResult<Vec<OpenOrder>> {
        let mid = self.source.fetch_current_price(pair).await?;
        self.match_orders(mid).await;

        Ok(self
            .orders
            .lock()
            .await
            .iter()
            .map(PaperOrder::to_open_order)
            .collect())
    }

    async fn cancel_order(&self, id: &str, _pair: &str) -> GridResult<()> {
        let mut orders = self.orders.lock().await;
        let position = orders
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| GridError::OrderNotFound(id.to_string()))?;
        orders.remove(position);
        Ok(())
    }

    async fn create_limit_buy_order(&self, _pair: &str, amount: f64, price: f64) -> GridResult<OrderAck> {
        self.rest(OrderSide::Buy, amount, price).await
    }

    async fn create_limit_sell_order(&self, _pair: &str, amount: f64, price: f64) -> GridResult<OrderAck> {
        self.rest(OrderSide::Sell, amount, price).await
    }
}
