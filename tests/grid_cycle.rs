use std::time::Duration;

use phemex_grid_bot::grid::executor::mock::MockExchange;
use phemex_grid_bot::grid::{ControlLoop, GridConfig, GridExchange, LoopState, OpenOrder, OrderSide};
use phemex_grid_bot::market::{PaperExchange, PaperTradingInput};

const PAIR: &str = "WIF/USDT";

fn config() -> GridConfig {
    // Levels 2.0, 3.0, 4.0 with a step of 1.0
    GridConfig::new("WIF", "USDT", 2.0, 4.0, 3)
        .with_order_amount(10.0)
        .with_time_interval(10)
}

fn prices_of(orders: &[OpenOrder], side: OrderSide) -> Vec<f64> {
    let mut prices: Vec<f64> = orders
        .iter()
        .filter(|o| o.side == side)
        .map(|o| o.price)
        .collect();
    prices.sort_by(|a, b| a.partial_cmp(b).unwrap());
    prices
}

#[tokio::test]
async fn test_stale_book_is_replaced_by_the_grid() {
    let exchange = MockExchange::new(3.0)
        .with_orders(vec![
            OpenOrder::new("stale-buy", OrderSide::Buy, 2.5, 10.0),
            OpenOrder::new("good-buy", OrderSide::Buy, 3.0, 10.0),
            OpenOrder::new("stale-sell", OrderSide::Sell, 6.0, 9.999),
        ])
        .await;
    let mut bot = ControlLoop::new(config(), exchange).unwrap();

    let transition = bot.step().await;
    assert_eq!(transition.next, LoopState::Running);
    assert_eq!(transition.delay, Duration::from_secs(10));

    let mut cancelled = bot.exchange().cancelled_ids().await;
    cancelled.sort();
    assert_eq!(cancelled, vec!["stale-buy".to_string(), "stale-sell".to_string()]);

    let book = bot.exchange().fetch_open_orders(PAIR).await.unwrap();
    assert_eq!(prices_of(&book, OrderSide::Buy), vec![2.0, 3.0, 4.0]);
    assert_eq!(prices_of(&book, OrderSide::Sell), vec![3.0, 4.0, 5.0]);

    // A second cycle over a complete book changes nothing
    bot.exchange().clear_history().await;
    let report = bot.step().await.report.unwrap();
    assert_eq!(report.cancelled, 0);
    assert_eq!(report.placed, 0);
}

#[tokio::test]
async fn test_paper_fills_are_replenished_next_cycle() {
    let source = MockExchange::new(3.5);
    let paper = PaperExchange::new(
        source,
        PaperTradingInput {
            initial_quote: 100.0,
            initial_base: 0.0,
            fee_rate: 0.0,
        },
    );
    let mut bot = ControlLoop::new(config(), paper).unwrap();

    let first = bot.step().await.report.unwrap();
    assert_eq!(first.placed, 6);

    // Mid 3.5 crosses the buy at 4.0 and the sell at 3.0
    let second = bot.step().await.report.unwrap();
    assert_eq!(second.cancelled, 0);
    assert_eq!(second.placed, 2);

    let balances = bot.exchange().balances().await;
    assert_eq!(balances.fills, 2);
    assert!((balances.base - 0.001).abs() < 1e-9);
    assert!((balances.quote - (100.0 - 35.0 + 9.999 * 3.5)).abs() < 1e-9);
}

#[tokio::test]
async fn test_recovery_cycle_after_price_outage() {
    let exchange = MockExchange::new(3.0);
    exchange.set_fail_ticker(true).await;
    let mut bot = ControlLoop::new(config(), exchange).unwrap();

    let failed = bot.step().await;
    assert_eq!(failed.next, LoopState::Recovering);
    assert_eq!(failed.delay, Duration::from_secs(30));
    assert!(bot.exchange().placed_orders().await.is_empty());

    bot.exchange().set_fail_ticker(false).await;
    assert_eq!(bot.step().await.delay, Duration::ZERO);

    let report = bot.step().await.report.unwrap();
    assert_eq!(report.placed, 6);
}
