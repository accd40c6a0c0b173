//! Exchange abstraction for grid trading - enables mocking for tests

use async_trait::async_trait;
use log::debug;

use crate::phemex::{from_scaled, spot_symbol, NewSpotOrder, PhemexClient, SpotOrder};

use super::config::AssetPrecision;
use super::errors::{GridError, GridResult};
use super::types::{LimitOrderRequest, OpenOrder, OrderAck, OrderSide, Ticker};

/// Exchange operations consumed by the reconciler - can be mocked for testing
#[async_trait]
pub trait GridExchange: Send + Sync {
    /// Best bid/ask and last traded price
    async fn fetch_ticker(&self, pair: &str) -> GridResult<Ticker>;

    /// Orders currently resting for `pair`, in exchange listing order
    async fn fetch_open_orders(&self, pair: &str) -> GridResult<Vec<OpenOrder>>;

    /// Cancel an order by exchange ID
    async fn cancel_order(&self, id: &str, pair: &str) -> GridResult<()>;

    async fn create_limit_buy_order(&self, pair: &str, amount: f64, price: f64) -> GridResult<OrderAck>;

    async fn create_limit_sell_order(&self, pair: &str, amount: f64, price: f64) -> GridResult<OrderAck>;

    /// Midpoint of best bid and best ask
    async fn fetch_current_price(&self, pair: &str) -> GridResult<f64> {
        Ok(self.fetch_ticker(pair).await?.mid())
    }

    async fn create_limit_order(&self, pair: &str, order: &LimitOrderRequest) -> GridResult<OrderAck> {
        match order.side {
            OrderSide::Buy => self.create_limit_buy_order(pair, order.amount, order.price).await,
            OrderSide::Sell => self.create_limit_sell_order(pair, order.amount, order.price).await,
        }
    }
}

// ============================================================================
// Real Phemex Implementation
// ============================================================================

/// Phemex spot exchange implementation
pub struct PhemexExchange {
    client: PhemexClient,
    precision: AssetPrecision,
}

impl PhemexExchange {
    pub fn new(client: PhemexClient, precision: AssetPrecision) -> Self {
        Self { client, precision }
    }

    pub fn client(&self) -> &PhemexClient {
        &self.client
    }

    fn to_open_order(order: SpotOrder) -> OpenOrder {
        OpenOrder {
            side: OrderSide::from(order.side.as_str()),
            price: from_scaled(order.price_ep),
            amount: from_scaled(order.remaining_qty_ev()),
            id: order.order_id,
        }
    }

    async fn place(&self, pair: &str, order: LimitOrderRequest) -> GridResult<OrderAck> {
        let price = self.precision.round_price(order.price);
        let amount = self.precision.round_size(order.amount);
        if amount <= 0.0 {
            return Err(GridError::Exchange(format!(
                "order amount {} rounds to zero with step {}",
                order.amount, self.precision.amount_step
            )));
        }

        let request = NewSpotOrder::limit(spot_symbol(pair), order.side.as_str(), price, amount);
        debug!(
            "Submitting {} {} @ {} (clOrdID {})",
            order.side, amount, price, request.cl_ord_id
        );

        let placed = self.client.place_spot_order(&request).await?;
        Ok(OrderAck {
            id: placed.order_id,
            side: order.side,
            price,
            amount,
        })
    }
}

#[async_trait]
impl GridExchange for PhemexExchange {
    async fn fetch_ticker(&self, pair: &str) -> GridResult<Ticker> {
        let ticker = self.client.spot_ticker(&spot_symbol(pair)).await?;
        if ticker.bid_ep <= 0 || ticker.ask_ep <= 0 {
            return Err(GridError::InvalidMarketData(format!(
                "{} has no two-sided quote (bid {}, ask {})",
                pair, ticker.bid_ep, ticker.ask_ep
            )));
        }

        Ok(Ticker {
            bid: from_scaled(ticker.bid_ep),
            ask: from_scaled(ticker.ask_ep),
            last: from_scaled(ticker.last_ep),
        })
    }

    async fn fetch_open_orders(&self, pair: &str) -> GridResult<Vec<OpenOrder>> {
        let orders = self.client.spot_open_orders(&spot_symbol(pair)).await?;
        Ok(orders.into_iter().map(Self::to_open_order).collect())
    }

    async fn cancel_order(&self, id: &str, pair: &str) -> GridResult<()> {
        self.client.cancel_spot_order(&spot_symbol(pair), id).await
    }

    async fn create_limit_buy_order(&self, pair: &str, amount: f64, price: f64) -> GridResult<OrderAck> {
        self.place(pair, LimitOrderRequest::buy(price, amount)).await
    }

    async fn create_limit_sell_order(&self, pair: &str, amount: f64, price: f64) -> GridResult<OrderAck> {
        self.place(pair, LimitOrderRequest::sell(price, amount)).await
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

/// Mock exchange for testing grid bots without a real exchange connection.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// In-memory order book. Created orders rest until cancelled.
    pub struct MockExchange {
        pub book: Arc<Mutex<Vec<OpenOrder>>>,
        pub placed: Arc<Mutex<Vec<LimitOrderRequest>>>,
        pub cancelled: Arc<Mutex<Vec<String>>>,
        pub ticker: Arc<Mutex<Ticker>>,
        pub fail_ticker: Arc<Mutex<bool>>,
        pub fail_open_orders: Arc<Mutex<bool>>,
        pub fail_cancel: Arc<Mutex<bool>>,
        pub fail_create: Arc<Mutex<bool>>,
        next_id: AtomicU64,
    }

    impl MockExchange {
        pub fn new(mid_price: f64) -> Self {
            Self {
                book: Arc::new(Mutex::new(Vec::new())),
                placed: Arc::new(Mutex::new(Vec::new())),
                cancelled: Arc::new(Mutex::new(Vec::new())),
                ticker: Arc::new(Mutex::new(Ticker {
                    bid: mid_price,
                    ask: mid_price,
                    last: mid_price,
                })),
                fail_ticker: Arc::new(Mutex::new(false)),
                fail_open_orders: Arc::new(Mutex::new(false)),
                fail_cancel: Arc::new(Mutex::new(false)),
                fail_create: Arc::new(Mutex::new(false)),
                next_id: AtomicU64::new(1),
            }
        }

        /// Seed the book with orders in listing order
        pub async fn with_orders(self, orders: Vec<OpenOrder>) -> Self {
            *self.book.lock().await = orders;
            self
        }

        pub async fn set_ticker(&self, ticker: Ticker) {
            *self.ticker.lock().await = ticker;
        }

        pub async fn set_fail_ticker(&self, fail: bool) {
            *self.fail_ticker.lock().await = fail;
        }

        pub async fn set_fail_open_orders(&self, fail: bool) {
            *self.fail_open_orders.lock().await = fail;
        }

        pub async fn set_fail_cancel(&self, fail: bool) {
            *self.fail_cancel.lock().await = fail;
        }

        pub async fn set_fail_create(&self, fail: bool) {
            *self.fail_create.lock().await = fail;
        }

        pub async fn placed_orders(&self) -> Vec<LimitOrderRequest> {
            self.placed.lock().await.clone()
        }

        pub async fn cancelled_ids(&self) -> Vec<String> {
            self.cancelled.lock().await.clone()
        }

        /// Forget recorded calls, keep the book
        pub async fn clear_history(&self) {
            self.placed.lock().await.clear();
            self.cancelled.lock().await.clear();
        }

        async fn create(&self, order: LimitOrderRequest) -> GridResult<OrderAck> {
            if *self.fail_create.lock().await {
                return Err(GridError::Exchange("Mock failure".into()));
            }

            let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            self.placed.lock().await.push(order.clone());
            self.book
                .lock()
                .await
                .push(OpenOrder::new(id.clone(), order.side, order.price, order.amount));

            Ok(OrderAck {
                id,
                side: order.side,
                price: order.price,
                amount: order.amount,
            })
        }
    }

    #[async_trait]
    impl GridExchange for MockExchange {
        async fn fetch_ticker(&self, _pair: &str) -> GridResult<Ticker> {
            if *self.fail_ticker.lock().await {
                return Err(GridError::Network("Mock timeout".into()));
            }
            Ok(*self.ticker.lock().await)
        }

        async fn fetch_open_orders(&self, _pair: &str) -> GridResult<Vec<OpenOrder>> {
            if *self.fail_open_orders.lock().await {
                return Err(GridError::Network("Mock timeout".into()));
            }
            Ok(self.book.lock().await.clone())
        }

        async fn cancel_order(&self, id: &str, _pair: &str) -> GridResult<()> {
            if *self.fail_cancel.lock().await {
                return Err(GridError::Exchange("Mock failure".into()));
            }

            let mut book = self.book.lock().await;
            let position = book
                .iter()
                .position(|o| o.id == id)
                .ok_or_else(|| GridError::OrderNotFound(id.to_string()))?;
            book.remove(position);
            self.cancelled.lock().await.push(id.to_string());
            Ok(())
        }

        async fn create_limit_buy_order(&self, _pair: &str, amount: f64, price: f64) -> GridResult<OrderAck> {
            self.create(LimitOrderRequest::buy(price, amount)).await
        }

        async fn create_limit_sell_order(&self, _pair: &str, amount: f64, price: f64) -> GridResult<OrderAck> {
            self.create(LimitOrderRequest::sell(price, amount)).await
        }
    }
}
