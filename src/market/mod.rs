//! Simulated Markets
//!
//! Exchange adapters that never send orders anywhere. [`PaperExchange`]
//! wraps a real quote source and fills resting orders locally.

mod paper_trading_market;

pub use paper_trading_market::{PaperBalances, PaperExchange, PaperTradingInput};
