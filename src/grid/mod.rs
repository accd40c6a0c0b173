//! Grid Trading Module
//!
//! A single-pair spot grid bot. Every cycle the bot reads the open orders and
//! the current price, cancels orders that sit off the grid, and places the
//! buy and sell orders that are missing.
//!
//! # Architecture
//!
//! - [`config`] - Grid configuration and validation
//! - [`types`] - Core data types (OpenOrder, OrderSide, Ticker, etc.)
//! - [`errors`] - Grid-specific error types
//! - [`strategy`] - Grid level generation and price matching
//! - [`executor`] - Exchange abstraction (mockable for testing)
//! - [`reconciler`] - Cancellation and creation passes
//! - [`runner`] - Running/Recovering control loop
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use phemex_grid_bot::grid::{ControlLoop, GridConfig, PhemexExchange};
//!
//! // 100 levels between 1.9118 and 3.4322, amount derived from 1.1 USDT
//! let config = GridConfig::new("WIF", "USDT", 1.9118, 3.4322, 100);
//!
//! let mut bot = ControlLoop::start(config, exchange).await?;
//! bot.run().await;
//! ```
//!
//! # Testing
//!
//! ```rust,ignore
//! use phemex_grid_bot::grid::executor::mock::MockExchange;
//!
//! let exchange = MockExchange::new(2.5);
//! ```

pub mod config;
pub mod errors;
pub mod executor;
pub mod reconciler;
pub mod runner;
pub mod strategy;
pub mod types;

// Re-export commonly used types
pub use config::{AssetPrecision, GridConfig, SellMatching, RECOVERY_DELAY_SECS, SELL_AMOUNT_DISCOUNT};
pub use errors::{GridError, GridResult};
pub use executor::{GridExchange, PhemexExchange};
pub use reconciler::OrderReconciler;
pub use runner::{ControlLoop, Transition};
pub use strategy::{calculate_grid_levels, GridLevels, PriceMatcher};
pub use types::{CycleReport, LimitOrderRequest, LoopState, OpenOrder, OrderAck, OrderSide, Ticker};
