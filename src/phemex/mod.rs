//! Phemex spot REST access
//!
//! Only the handful of endpoints the grid bot needs: the public 24h ticker,
//! open orders, order placement and cancellation. Trading calls are signed
//! with HMAC-SHA256 over `path + query + expiry + body`.

pub mod client;
pub mod types;

pub use client::{PhemexClient, PhemexConfig, MAINNET_API_URL, TESTNET_API_URL};
pub use types::{from_scaled, spot_symbol, to_scaled, NewSpotOrder, SpotOrder, SpotTicker};
