//! Grid trading configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{GridError, GridResult};
use super::strategy::PriceMatcher;

/// Pause after a failed reconciliation cycle
pub const RECOVERY_DELAY_SECS: u64 = 30;

/// Fraction shaved off every sell order amount to leave room for fees
pub const SELL_AMOUNT_DISCOUNT: f64 = 0.0001;

/// How open sell orders are checked against the grid during cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SellMatching {
    /// Keep a sell when its price matches any `level + price_step`
    #[default]
    Nearest,
    /// Expected price is `levels[i] + price_step`, where `i` is the order's
    /// position in the exchange listing
    Positional,
}

/// Exchange price/size increments for the traded pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetPrecision {
    /// Minimum price increment
    pub price_tick: f64,
    /// Minimum base quantity increment
    pub amount_step: f64,
}

impl AssetPrecision {
    pub fn new(price_tick: f64, amount_step: f64) -> Self {
        Self {
            price_tick,
            amount_step,
        }
    }

    /// Whole number of ticks nearest to `price`
    pub fn price_ticks(&self, price: f64) -> f64 {
        (price / self.price_tick).round()
    }

    /// Round a price to the nearest tick
    pub fn round_price(&self, price: f64) -> f64 {
        if self.price_tick <= 0.0 {
            return price;
        }
        self.price_ticks(price) * self.price_tick
    }

    /// Truncate a size down to the amount step
    pub fn round_size(&self, size: f64) -> f64 {
        if self.amount_step <= 0.0 {
            return size;
        }
        // Absorb representation error so 0.3 / 0.1 does not floor to 2
        ((size / self.amount_step) + 1e-9).floor() * self.amount_step
    }
}

impl Default for AssetPrecision {
    fn default() -> Self {
        Self::new(default_price_tick(), default_amount_step())
    }
}

/// Grid bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Base asset (e.g., "WIF")
    #[serde(default = "default_base")]
    pub base: String,

    /// Quote asset (e.g., "USDT")
    #[serde(default = "default_quote")]
    pub quote: String,

    /// Number of grid levels (price points, both bounds included)
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,

    /// Lowest grid level
    #[serde(default = "default_price_min")]
    pub price_min: f64,

    /// Highest grid level
    #[serde(default = "default_price_max")]
    pub price_max: f64,

    /// Base quantity per level. When absent it is derived at startup as
    /// `order_notional / last_price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_amount: Option<f64>,

    /// Quote value per level used to derive `order_amount`
    #[serde(default = "default_order_notional")]
    pub order_notional: f64,

    /// Seconds between reconciliation cycles
    #[serde(default = "default_time_interval")]
    pub time_interval_secs: u64,

    /// Exchange minimum price increment
    #[serde(default = "default_price_tick")]
    pub price_tick: f64,

    /// Exchange minimum quantity increment
    #[serde(default = "default_amount_step")]
    pub amount_step: f64,

    /// Maximum absolute difference for two prices to be treated as equal.
    /// `0.0` means exact equality; absent means both prices round to the same tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_tolerance: Option<f64>,

    #[serde(default)]
    pub sell_matching: SellMatching,
}

fn default_base() -> String {
    "WIF".to_string()
}

fn default_quote() -> String {
    "USDT".to_string()
}

fn default_grid_size() -> u32 {
    100
}

fn default_price_min() -> f64 {
    1.9118
}

fn default_price_max() -> f64 {
    3.4322
}

fn default_order_notional() -> f64 {
    1.1
}

fn default_time_interval() -> u64 {
    10
}

fn default_price_tick() -> f64 {
    0.0001
}

fn default_amount_step() -> f64 {
    0.01
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::new(
            default_base(),
            default_quote(),
            default_price_min(),
            default_price_max(),
            default_grid_size(),
        )
    }
}

impl GridConfig {
    /// Create a configuration with the required grid parameters; everything
    /// else takes its default.
    pub fn new(
        base: impl Into<String>,
        quote: impl Into<String>,
        price_min: f64,
        price_max: f64,
        grid_size: u32,
    ) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
            grid_size,
            price_min,
            price_max,
            order_amount: None,
            order_notional: default_order_notional(),
            time_interval_secs: default_time_interval(),
            price_tick: default_price_tick(),
            amount_step: default_amount_step(),
            price_tolerance: None,
            sell_matching: SellMatching::default(),
        }
    }

    /// Builder: set a fixed per-level order amount
    pub fn with_order_amount(mut self, amount: f64) -> Self {
        self.order_amount = Some(amount);
        self
    }

    /// Builder: set the quote value used to derive the order amount
    pub fn with_order_notional(mut self, notional: f64) -> Self {
        self.order_notional = notional;
        self
    }

    /// Builder: set seconds between cycles
    pub fn with_time_interval(mut self, secs: u64) -> Self {
        self.time_interval_secs = secs;
        self
    }

    /// Builder: set exchange increments
    pub fn with_precision(mut self, price_tick: f64, amount_step: f64) -> Self {
        self.price_tick = price_tick;
        self.amount_step = amount_step;
        self
    }

    /// Builder: set the price matching tolerance (`0.0` = exact)
    pub fn with_price_tolerance(mut self, tolerance: f64) -> Self {
        self.price_tolerance = Some(tolerance);
        self
    }

    /// Builder: set the sell matching mode
    pub fn with_sell_matching(mut self, mode: SellMatching) -> Self {
        self.sell_matching = mode;
        self
    }

    /// Trading pair in `BASE/QUOTE` form
    pub fn pair(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// Spacing between adjacent grid levels
    pub fn price_step(&self) -> f64 {
        (self.price_max - self.price_min) / (self.grid_size as f64 - 1.0)
    }

    pub fn precision(&self) -> AssetPrecision {
        AssetPrecision::new(self.price_tick, self.amount_step)
    }

    /// Price comparison for grid matching: same tick by default, or the
    /// configured absolute tolerance
    pub fn matcher(&self) -> PriceMatcher {
        match self.price_tolerance {
            Some(tolerance) => PriceMatcher::with_tolerance(tolerance),
            None => PriceMatcher::on_tick(self.precision()),
        }
    }

    pub fn time_interval(&self) -> Duration {
        Duration::from_secs(self.time_interval_secs)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_secs(RECOVERY_DELAY_SECS)
    }

    /// Sell quantity for a level given the buy quantity
    pub fn sell_amount(&self, order_amount: f64) -> f64 {
        order_amount - SELL_AMOUNT_DISCOUNT * order_amount
    }

    /// Configured order amount, or an error when it still has to be derived
    pub fn order_amount(&self) -> GridResult<f64> {
        self.order_amount.ok_or_else(|| {
            GridError::InvalidConfig("order_amount has not been resolved".into())
        })
    }

    /// Derive the per-level amount from the last traded price
    pub fn order_amount_from_price(&self, last_price: f64) -> GridResult<f64> {
        if !last_price.is_finite() || last_price <= 0.0 {
            return Err(GridError::InvalidMarketData(format!(
                "cannot derive order amount from price {}",
                last_price
            )));
        }
        Ok(self.order_notional / last_price)
    }

    /// Validate the configuration
    pub fn validate(&self) -> GridResult<()> {
        if self.base.is_empty() || self.quote.is_empty() {
            return Err(GridError::InvalidConfig(
                "base and quote assets cannot be empty".into(),
            ));
        }

        if self.grid_size < 2 {
            return Err(GridError::InvalidConfig(format!(
                "grid_size must be at least 2, got {}",
                self.grid_size
            )));
        }

        if !self.price_min.is_finite() || !self.price_max.is_finite() {
            return Err(GridError::InvalidConfig(
                "price bounds must be finite".into(),
            ));
        }

        if self.price_min <= 0.0 {
            return Err(GridError::InvalidConfig("price_min must be positive".into()));
        }

        if self.price_min >= self.price_max {
            return Err(GridError::InvalidConfig(
                "price_min must be less than price_max".into(),
            ));
        }

        if let Some(amount) = self.order_amount {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(GridError::InvalidConfig(
                    "order_amount must be positive".into(),
                ));
            }
        }

        if !self.order_notional.is_finite() || self.order_notional <= 0.0 {
            return Err(GridError::InvalidConfig(
                "order_notional must be positive".into(),
            ));
        }

        if self.time_interval_secs == 0 {
            return Err(GridError::InvalidConfig(
                "time_interval must be at least one second".into(),
            ));
        }

        if self.price_tick <= 0.0 || self.amount_step <= 0.0 {
            return Err(GridError::InvalidConfig(
                "price_tick and amount_step must be positive".into(),
            ));
        }

        let step = self.price_step();
        if step < self.price_tick {
            return Err(GridError::InvalidConfig(format!(
                "price step {} is smaller than the price tick {}",
                step, self.price_tick
            )));
        }

        if let Some(tolerance) = self.price_tolerance {
            if !(0.0..step / 2.0).contains(&tolerance) {
                return Err(GridError::InvalidConfig(format!(
                    "price_tolerance {} must be in [0, {})",
                    tolerance,
                    step / 2.0
                )));
            }
        }

        Ok(())
    }
}
