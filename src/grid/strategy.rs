//! Grid strategy - grid level calculation and price matching

use super::config::{AssetPrecision, GridConfig};
use super::errors::{GridError, GridResult};

/// Evenly spaced prices from `price_min` to `price_max`, both included.
///
/// The last element is pinned to `price_max` so accumulated rounding in
/// `price_min + i * step` never moves the upper bound.
pub fn calculate_grid_levels(price_min: f64, price_max: f64, grid_size: u32) -> GridResult<Vec<f64>> {
    if grid_size < 2 {
        return Err(GridError::InvalidConfig(format!(
            "grid_size must be at least 2, got {}",
            grid_size
        )));
    }
    if !price_min.is_finite() || !price_max.is_finite() || price_min >= price_max {
        return Err(GridError::InvalidConfig(format!(
            "invalid price range [{}, {}]",
            price_min, price_max
        )));
    }

    let price_step = (price_max - price_min) / (grid_size as f64 - 1.0);
    let last = grid_size as usize - 1;

    Ok((0..grid_size as usize)
        .map(|i| {
            if i == last {
                price_max
            } else {
                price_min + i as f64 * price_step
            }
        })
        .collect())
}

/// Price comparison used for every grid match
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceMatcher {
    /// Exact floating point equality
    Exact,
    /// `|a - b| <= tolerance`
    Within(f64),
    /// Both prices round to the same tick. Uses the rounding applied when
    /// orders are placed, so an exchange-echoed price always matches the
    /// level it came from.
    OnTick(AssetPrecision),
}

impl PriceMatcher {
    pub fn exact() -> Self {
        PriceMatcher::Exact
    }

    /// Absolute tolerance; zero or less means exact equality
    pub fn with_tolerance(tolerance: f64) -> Self {
        if tolerance > 0.0 {
            PriceMatcher::Within(tolerance)
        } else {
            PriceMatcher::Exact
        }
    }

    pub fn on_tick(precision: AssetPrecision) -> Self {
        if precision.price_tick > 0.0 {
            PriceMatcher::OnTick(precision)
        } else {
            PriceMatcher::Exact
        }
    }

    pub fn matches(&self, a: f64, b: f64) -> bool {
        match self {
            PriceMatcher::Exact => a == b,
            PriceMatcher::Within(tolerance) => (a - b).abs() <= *tolerance,
            PriceMatcher::OnTick(precision) => precision.price_ticks(a) == precision.price_ticks(b),
        }
    }
}

/// The computed ladder for one run
#[derive(Debug, Clone)]
pub struct GridLevels {
    levels: Vec<f64>,
    price_step: f64,
}

impl GridLevels {
    pub fn new(price_min: f64, price_max: f64, grid_size: u32) -> GridResult<Self> {
        let levels = calculate_grid_levels(price_min, price_max, grid_size)?;
        let price_step = levels[1] - levels[0];
        Ok(Self { levels, price_step })
    }

    pub fn from_config(config: &GridConfig) -> GridResult<Self> {
        Self::new(config.price_min, config.price_max, config.grid_size)
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Spacing between adjacent levels (`level[1] - level[0]`)
    pub fn price_step(&self) -> f64 {
        self.price_step
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.levels.get(index).copied()
    }

    /// Sell price paired with a buy level
    pub fn sell_price_for(&self, level: f64) -> f64 {
        level + self.price_step
    }

    /// Sell price paired with the level at `index`
    pub fn sell_price_at(&self, index: usize) -> Option<f64> {
        self.get(index).map(|level| self.sell_price_for(level))
    }

    pub fn sell_prices(&self) -> impl Iterator<Item = f64> + '_ {
        self.levels.iter().map(move |&level| self.sell_price_for(level))
    }

    /// True when `price` matches one of the buy levels
    pub fn is_buy_level(&self, price: f64, matcher: &PriceMatcher) -> bool {
        self.levels.iter().any(|&level| matcher.matches(level, price))
    }

    /// True when `price` matches one of the sell prices
    pub fn is_sell_level(&self, price: f64, matcher: &PriceMatcher) -> bool {
        self.sell_prices().any(|sell| matcher.matches(sell, price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_grid_example() {
        let grid = GridLevels::new(2.0, 4.0, 3).unwrap();

        assert_eq!(grid.levels(), &[2.0, 3.0, 4.0]);
        assert_eq!(grid.price_step(), 1.0);

        let sells: Vec<f64> = grid.sell_prices().collect();
        assert_eq!(sells, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_rejects_degenerate_grid() {
        assert!(matches!(
            calculate_grid_levels(2.0, 4.0, 1),
            Err(GridError::InvalidConfig(_))
        ));
        assert!(calculate_grid_levels(2.0, 4.0, 0).is_err());
        assert!(calculate_grid_levels(4.0, 2.0, 3).is_err());
        assert!(calculate_grid_levels(2.0, 2.0, 3).is_err());
        assert!(calculate_grid_levels(f64::NAN, 2.0, 3).is_err());
    }

    #[test]
    fn test_level_properties_hold_across_ranges() {
        let cases = [
            (1.9118, 3.4322, 100),
            (0.001, 0.002, 2),
            (100.0, 200.0, 11),
            (0.5, 0.75, 7),
            (30000.0, 35000.0, 5),
            (1.0, 1000.0, 997),
        ];

        for (min, max, size) in cases {
            let levels = calculate_grid_levels(min, max, size).unwrap();
            let step = (max - min) / (size as f64 - 1.0);

            assert_eq!(levels.len(), size as usize);
            assert_eq!(levels[0], min);
            assert_eq!(*levels.last().unwrap(), max);

            for pair in levels.windows(2) {
                assert!(pair[1] > pair[0], "levels must strictly increase");
                assert!(((pair[1] - pair[0]) - step).abs() < 1e-9 * max.max(1.0));
            }
        }
    }

    #[test]
    fn test_exact_matcher_sees_representation_drift() {
        let exact = PriceMatcher::exact();
        let tolerant = PriceMatcher::with_tolerance(1e-9);

        // 0.1 + 0.2 is 0.30000000000000004
        assert!(!exact.matches(0.1 + 0.2, 0.3));
        assert!(tolerant.matches(0.1 + 0.2, 0.3));
        assert!(!tolerant.matches(0.3, 0.31));
    }

    #[test]
    fn test_tick_matcher_holds_on_half_ticks() {
        let precision = AssetPrecision::new(0.0001, 0.01);
        let on_tick = PriceMatcher::on_tick(precision);
        let half_tick = PriceMatcher::with_tolerance(0.00005);

        // 1.0 + 7 * 0.00015 sits on a half tick; the exchange keeps 1.0011
        let sell = 1.0 + 0.00015 * 7.0;
        let echoed = crate::phemex::from_scaled(crate::phemex::to_scaled(precision.round_price(sell)));

        assert!(on_tick.matches(sell, echoed));
        assert!(!half_tick.matches(sell, echoed));
        assert!(!on_tick.matches(sell, echoed + 0.0001));
        assert_eq!(PriceMatcher::on_tick(AssetPrecision::new(0.0, 0.01)), PriceMatcher::Exact);
    }

    #[test]
    fn test_level_membership() {
        let grid = GridLevels::new(2.0, 4.0, 3).unwrap();
        let matcher = PriceMatcher::with_tolerance(0.00005);

        assert!(grid.is_buy_level(3.0, &matcher));
        assert!(grid.is_buy_level(3.00004, &matcher));
        assert!(!grid.is_buy_level(3.5, &matcher));

        assert!(grid.is_sell_level(5.0, &matcher));
        assert!(!grid.is_sell_level(2.0, &matcher));

        assert_eq!(grid.sell_price_at(0), Some(3.0));
        assert_eq!(grid.sell_price_at(3), None);
    }
}
