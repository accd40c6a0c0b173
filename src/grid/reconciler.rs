//! Order reconciler - aligns the live open-order set with the grid
//!
//! Two passes per cycle. The cancellation pass walks the open orders in
//! listing order and cancels every order that does not belong to the grid.
//! The creation pass walks the levels in ascending order and places the buy
//! at each level and the sell one step above it when no matching order is
//! resting. Both passes work from the same snapshot, so an order cancelled
//! in the first pass still counts as present in the second; it is replaced
//! on the next cycle.

use log::{error, info};

use super::config::{GridConfig, SellMatching};
use super::errors::{GridError, GridResult};
use super::executor::GridExchange;
use super::strategy::{GridLevels, PriceMatcher};
use super::types::{CycleReport, LimitOrderRequest, OpenOrder, OrderSide};

pub struct OrderReconciler<'a> {
    config: &'a GridConfig,
    grid: &'a GridLevels,
    matcher: PriceMatcher,
    order_amount: f64,
}

impl<'a> OrderReconciler<'a> {
    pub fn new(config: &'a GridConfig, grid: &'a GridLevels, order_amount: f64) -> Self {
        Self {
            config,
            grid,
            matcher: config.matcher(),
            order_amount,
        }
    }

    pub fn matcher(&self) -> &PriceMatcher {
        &self.matcher
    }

    /// Decide whether the order at listing position `index` must go.
    ///
    /// Fails only in positional mode, when a sell sits past the last level.
    pub fn should_cancel(&self, index: usize, order: &OpenOrder) -> GridResult<bool> {
        match order.side {
            OrderSide::Buy => Ok(!self.grid.is_buy_level(order.price, &self.matcher)),
            OrderSide::Sell => match self.config.sell_matching {
                SellMatching::Nearest => Ok(!self.grid.is_sell_level(order.price, &self.matcher)),
                SellMatching::Positional => {
                    let expected = self.grid.sell_price_at(index).ok_or(
                        GridError::SellIndexOutOfRange {
                            index,
                            levels: self.grid.len(),
                        },
                    )?;
                    Ok(!self.matcher.matches(order.price, expected))
                }
            },
        }
    }

    /// Orders the cancellation pass would cancel
    pub fn plan_cancellations<'o>(&self, open_orders: &'o [OpenOrder]) -> GridResult<Vec<&'o OpenOrder>> {
        let mut doomed = Vec::new();
        for (index, order) in open_orders.iter().enumerate() {
            if self.should_cancel(index, order)? {
                doomed.push(order);
            }
        }
        Ok(doomed)
    }

    /// Orders the creation pass would place, in submission order
    pub fn plan_creations(&self, open_orders: &[OpenOrder]) -> Vec<LimitOrderRequest> {
        let sell_amount = self.config.sell_amount(self.order_amount);
        let mut orders = Vec::new();

        for &level in self.grid.levels() {
            if !self.has_resting(open_orders, OrderSide::Buy, level) {
                orders.push(LimitOrderRequest::buy(level, self.order_amount));
            }

            let sell_price = self.grid.sell_price_for(level);
            if !self.has_resting(open_orders, OrderSide::Sell, sell_price) {
                orders.push(LimitOrderRequest::sell(sell_price, sell_amount));
            }
        }

        orders
    }

    fn has_resting(&self, open_orders: &[OpenOrder], side: OrderSide, price: f64) -> bool {
        open_orders
            .iter()
            .any(|o| o.side == side && self.matcher.matches(o.price, price))
    }

    /// Cancel every open order that does not belong to the grid.
    ///
    /// Individual cancel failures are logged and skipped. A positional
    /// lookup past the last level aborts the pass; cancels already issued
    /// stand.
    pub async fn cancel_unnecessary_orders<E: GridExchange + ?Sized>(
        &self,
        exchange: &E,
        open_orders: &[OpenOrder],
    ) -> GridResult<CycleReport> {
        let pair = self.config.pair();
        let mut report = CycleReport::default();

        for (index, order) in open_orders.iter().enumerate() {
            if !self.should_cancel(index, order)? {
                continue;
            }

            match exchange.cancel_order(&order.id, &pair).await {
                Ok(()) => {
                    report.cancelled += 1;
                    info!("Canceled unnecessary {} order at {}", order.side, order.price);
                }
                Err(e) => {
                    report.cancel_failures += 1;
                    error!("Error canceling {} order at {}: {}", order.side, order.price, e);
                }
            }
        }

        Ok(report)
    }

    /// Place the missing buy/sell pair for every level.
    ///
    /// Individual placement failures are logged and skipped.
    pub async fn manage_grid<E: GridExchange + ?Sized>(
        &self,
        exchange: &E,
        open_orders: &[OpenOrder],
    ) -> CycleReport {
        let pair = self.config.pair();
        let mut report = CycleReport::default();

        for order in self.plan_creations(open_orders) {
            match exchange.create_limit_order(&pair, &order).await {
                Ok(ack) => {
                    report.placed += 1;
                    info!("Created new {} order at {}: {}", order.side, order.price, ack);
                }
                Err(e) => {
                    report.place_failures += 1;
                    error!("Error creating {} order at {}: {}", order.side, order.price, e);
                }
            }
        }

        report
    }

    /// Cancellation pass followed by creation pass over one snapshot
    pub async fn reconcile<E: GridExchange + ?Sized>(
        &self,
        exchange: &E,
        open_orders: &[OpenOrder],
    ) -> GridResult<CycleReport> {
        let cancelled = self.cancel_unnecessary_orders(exchange, open_orders).await?;
        let created = self.manage_grid(exchange, open_orders).await;
        Ok(cancelled.merge(created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::executor::mock::MockExchange;
    use crate::phemex::{from_scaled, to_scaled};

    const AMOUNT: f64 = 10.0;

    fn small_config() -> GridConfig {
        GridConfig::new("WIF", "USDT", 2.0, 4.0, 3).with_order_amount(AMOUNT)
    }

    fn buy(id: &str, price: f64) -> OpenOrder {
        OpenOrder::new(id, OrderSide::Buy, price, AMOUNT)
    }

    fn sell(id: &str, price: f64) -> OpenOrder {
        OpenOrder::new(id, OrderSide::Sell, price, AMOUNT * 0.9999)
    }

    #[test]
    fn test_creation_plan_from_empty_book() {
        let config = small_config();
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);

        let plan = reconciler.plan_creations(&[]);
        let buys: Vec<_> = plan.iter().filter(|o| o.side == OrderSide::Buy).collect();
        let sells: Vec<_> = plan.iter().filter(|o| o.side == OrderSide::Sell).collect();

        assert_eq!(buys.iter().map(|o| o.price).collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_eq!(sells.iter().map(|o| o.price).collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
        assert!(buys.iter().all(|o| o.amount == AMOUNT));
        assert!(sells.iter().all(|o| (o.amount - AMOUNT * 0.9999).abs() < 1e-12));

        // Submission order: buy then sell for each level
        assert_eq!(plan[0], LimitOrderRequest::buy(2.0, AMOUNT));
        assert_eq!(plan[1].side, OrderSide::Sell);
        assert_eq!(plan[1].price, 3.0);
    }

    #[test]
    fn test_creation_skips_resting_orders() {
        let config = small_config();
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);

        let book = vec![buy("b1", 3.0), sell("s1", 5.0)];
        let plan = reconciler.plan_creations(&book);

        assert_eq!(plan.len(), 4);
        assert!(!plan.iter().any(|o| o.side == OrderSide::Buy && o.price == 3.0));
        assert!(!plan.iter().any(|o| o.side == OrderSide::Sell && o.price == 5.0));
        // A buy at 3.0 does not satisfy the sell at 3.0
        assert!(plan.iter().any(|o| o.side == OrderSide::Sell && o.price == 3.0));
    }

    #[test]
    fn test_buy_cancellation() {
        let config = small_config();
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);

        let book = vec![buy("on-grid", 3.0), buy("off-grid", 3.5), buy("below", 1.0)];
        let doomed = reconciler.plan_cancellations(&book).unwrap();
        let ids: Vec<_> = doomed.iter().map(|o| o.id.as_str()).collect();

        assert_eq!(ids, vec!["off-grid", "below"]);
    }

    #[test]
    fn test_nearest_sell_matching_ignores_listing_order() {
        let config = small_config();
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);

        // Valid sells listed in reverse grid order, plus one stray
        let book = vec![sell("s5", 5.0), sell("s4", 4.0), sell("s3", 3.0), sell("stray", 4.5)];
        let doomed = reconciler.plan_cancellations(&book).unwrap();
        let ids: Vec<_> = doomed.iter().map(|o| o.id.as_str()).collect();

        assert_eq!(ids, vec!["stray"]);
    }

    #[test]
    fn test_positional_sell_matching_follows_listing_position() {
        let config = small_config().with_sell_matching(SellMatching::Positional);
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);

        // Listed in grid order: each sell sits at levels[i] + step
        let aligned = vec![sell("s3", 3.0), sell("s4", 4.0), sell("s5", 5.0)];
        assert!(reconciler.plan_cancellations(&aligned).unwrap().is_empty());

        // Same valid sells listed in reverse: positions 0 and 2 no longer line up
        let reversed = vec![sell("s5", 5.0), sell("s4", 4.0), sell("s3", 3.0)];
        let ids: Vec<_> = reconciler
            .plan_cancellations(&reversed)
            .unwrap()
            .iter()
            .map(|o| o.id.clone())
            .collect();
        assert_eq!(ids, vec!["s5", "s3"]);

        // Buys occupy positions too: the sell at index 1 is checked against 3.0 + 1.0
        let mixed = vec![buy("b2", 2.0), sell("s3", 3.0)];
        let ids: Vec<_> = reconciler
            .plan_cancellations(&mixed)
            .unwrap()
            .iter()
            .map(|o| o.id.clone())
            .collect();
        assert_eq!(ids, vec!["s3"]);
    }

    #[test]
    fn test_positional_sell_past_last_level_is_a_cycle_error() {
        let config = small_config().with_sell_matching(SellMatching::Positional);
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);

        let book = vec![buy("b2", 2.0), buy("b3", 3.0), buy("b4", 4.0), sell("s", 5.0)];
        let result = reconciler.plan_cancellations(&book);

        assert!(matches!(
            result,
            Err(GridError::SellIndexOutOfRange { index: 3, levels: 3 })
        ));
    }

    #[test]
    fn test_exact_matching_rebuilds_on_representation_drift() {
        // Exchange echoes 3.0 back as 3.0000000001
        let drifted = vec![buy("b3", 3.000_000_000_1)];

        let exact = small_config().with_price_tolerance(0.0);
        let grid = GridLevels::from_config(&exact).unwrap();
        let reconciler = OrderReconciler::new(&exact, &grid, AMOUNT);
        assert_eq!(reconciler.plan_cancellations(&drifted).unwrap().len(), 1);
        assert!(reconciler
            .plan_creations(&drifted)
            .iter()
            .any(|o| o.side == OrderSide::Buy && o.price == 3.0));

        let tolerant = small_config();
        let grid = GridLevels::from_config(&tolerant).unwrap();
        let reconciler = OrderReconciler::new(&tolerant, &grid, AMOUNT);
        assert!(reconciler.plan_cancellations(&drifted).unwrap().is_empty());
        assert!(!reconciler
            .plan_creations(&drifted)
            .iter()
            .any(|o| o.side == OrderSide::Buy && o.price == 3.0));
    }

    /// Book as the exchange reports it back: tick-rounded, then scaled
    fn echoed_book(config: &GridConfig, plan: &[LimitOrderRequest]) -> Vec<OpenOrder> {
        let precision = config.precision();
        plan.iter()
            .enumerate()
            .map(|(i, order)| {
                let price = from_scaled(to_scaled(precision.round_price(order.price)));
                OpenOrder::new(format!("echo-{}", i), order.side, price, order.amount)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_exchange_echoed_book_is_stable() {
        let grids = [
            GridConfig::default(),
            // step 0.00015: every other level falls on a half tick
            GridConfig::new("WIF", "USDT", 1.0, 1.0009, 7),
            GridConfig::new("WIF", "USDT", 0.5, 0.75, 7),
            GridConfig::new("WIF", "USDT", 2.0, 2.0125, 26),
        ];

        for config in grids {
            let config = config.with_order_amount(AMOUNT);
            config.validate().unwrap();
            let grid = GridLevels::from_config(&config).unwrap();
            let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);

            let book = echoed_book(&config, &reconciler.plan_creations(&[]));
            assert_eq!(book.len(), 2 * grid.len());

            let exchange = MockExchange::new(config.price_min).with_orders(book.clone()).await;
            let report = reconciler.reconcile(&exchange, &book).await.unwrap();

            assert_eq!(
                report,
                CycleReport::default(),
                "grid {}..{} x{} churned",
                config.price_min,
                config.price_max,
                config.grid_size
            );
            assert!(exchange.cancelled_ids().await.is_empty());
            assert!(exchange.placed_orders().await.is_empty());
        }
    }

    #[test]
    fn test_half_tick_sell_survives_rounding() {
        let config = GridConfig::new("WIF", "USDT", 1.0, 1.0009, 7).with_order_amount(AMOUNT);
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);

        // Top sell is 1.00105 and the exchange keeps it as 1.0011
        let top_sell = grid.sell_price_at(6).unwrap();
        let echoed = from_scaled(to_scaled(config.precision().round_price(top_sell)));
        assert_eq!(echoed, 1.0011);

        let book = vec![sell("s", echoed)];
        assert!(reconciler.plan_cancellations(&book).unwrap().is_empty());

        // An absolute half-tick tolerance misses the same order
        let half_tick = config.clone().with_price_tolerance(0.00005);
        let reconciler = OrderReconciler::new(&half_tick, &grid, AMOUNT);
        assert_eq!(reconciler.plan_cancellations(&book).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_full_creation_from_zero_orders() {
        let config = GridConfig::new("WIF", "USDT", 1.9118, 3.4322, 100).with_order_amount(0.5);
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, 0.5);
        let exchange = MockExchange::new(2.5);

        let report = reconciler.reconcile(&exchange, &[]).await.unwrap();
        let placed = exchange.placed_orders().await;

        assert_eq!(report.placed, 200);
        assert_eq!(placed.iter().filter(|o| o.side == OrderSide::Buy).count(), 100);
        assert_eq!(placed.iter().filter(|o| o.side == OrderSide::Sell).count(), 100);
        assert!(exchange.cancelled_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_second_pass_over_resulting_book_is_idempotent() {
        let config = small_config();
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);
        let exchange = MockExchange::new(3.0);

        reconciler.reconcile(&exchange, &[]).await.unwrap();
        exchange.clear_history().await;

        let snapshot = exchange.fetch_open_orders("WIF/USDT").await.unwrap();
        let report = reconciler.reconcile(&exchange, &snapshot).await.unwrap();

        assert_eq!(report, CycleReport::default());
        assert!(exchange.placed_orders().await.is_empty());
        assert!(exchange.cancelled_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_skipped_not_fatal() {
        let config = small_config();
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);

        let exchange = MockExchange::new(3.0)
            .with_orders(vec![buy("off1", 2.5), buy("off2", 3.5)])
            .await;
        exchange.set_fail_cancel(true).await;
        exchange.set_fail_create(true).await;

        let snapshot = exchange.fetch_open_orders("WIF/USDT").await.unwrap();
        let report = reconciler.reconcile(&exchange, &snapshot).await.unwrap();

        assert_eq!(report.cancel_failures, 2);
        assert_eq!(report.place_failures, 6);
        assert_eq!(report.cancelled, 0);
        assert_eq!(report.placed, 0);
    }

    #[tokio::test]
    async fn test_cancelling_a_vanished_order_is_logged_and_skipped() {
        let config = small_config();
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);

        // Snapshot still lists an order the exchange already dropped
        let exchange = MockExchange::new(3.0).with_orders(vec![buy("live", 3.5)]).await;
        let snapshot = vec![buy("gone", 2.5), buy("live", 3.5)];

        let report = reconciler
            .cancel_unnecessary_orders(&exchange, &snapshot)
            .await
            .unwrap();

        assert_eq!(report.cancel_failures, 1);
        assert_eq!(report.cancelled, 1);
        assert_eq!(exchange.cancelled_ids().await, vec!["live".to_string()]);
    }

    #[tokio::test]
    async fn test_positional_error_keeps_earlier_cancels() {
        let config = small_config().with_sell_matching(SellMatching::Positional);
        let grid = GridLevels::from_config(&config).unwrap();
        let reconciler = OrderReconciler::new(&config, &grid, AMOUNT);

        let book = vec![
            buy("off", 2.5),
            buy("b3", 3.0),
            buy("b4", 4.0),
            sell("s", 5.0),
        ];
        let exchange = MockExchange::new(3.0).with_orders(book.clone()).await;

        let result = reconciler.reconcile(&exchange, &book).await;

        assert!(matches!(result, Err(GridError::SellIndexOutOfRange { .. })));
        assert_eq!(exchange.cancelled_ids().await, vec!["off".to_string()]);
        assert!(exchange.placed_orders().await.is_empty());
    }
}
