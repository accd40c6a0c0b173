//! Grid bot runner - main execution loop

use std::time::Duration;

use log::{error, info, warn};

use super::config::GridConfig;
use super::errors::{GridError, GridResult};
use super::executor::GridExchange;
use super::reconciler::OrderReconciler;
use super::strategy::GridLevels;
use super::types::{CycleReport, LoopState};

/// Result of one state machine step
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: LoopState,
    /// Pause before the next step
    pub delay: Duration,
    /// Counters of the cycle that ran, if one completed
    pub report: Option<CycleReport>,
}

/// Drives reconciliation cycles on a single exchange connection
pub struct ControlLoop<E: GridExchange> {
    config: GridConfig,
    grid: GridLevels,
    order_amount: f64,
    exchange: E,
    state: LoopState,
}

impl<E: GridExchange> ControlLoop<E> {
    /// Build the loop from a configuration whose order amount is already set
    pub fn new(config: GridConfig, exchange: E) -> GridResult<Self> {
        config.validate()?;
        let order_amount = config.order_amount()?;
        let grid = GridLevels::from_config(&config)?;

        info!(
            "Initialized {} grid levels from {} to {} (step {})",
            grid.len(),
            config.price_min,
            config.price_max,
            grid.price_step()
        );

        Ok(Self {
            config,
            grid,
            order_amount,
            exchange,
            state: LoopState::Running,
        })
    }

    /// Resolve the order amount from a live price when it is not configured,
    /// then build the loop
    pub async fn start(mut config: GridConfig, exchange: E) -> GridResult<Self> {
        config.validate()?;

        if config.order_amount.is_none() {
            let pair = config.pair();
            let ticker = exchange.fetch_ticker(&pair).await?;
            let amount = config.order_amount_from_price(ticker.last)?;
            info!(
                "Derived order amount {} from last price {} ({} {} per level)",
                amount, ticker.last, config.order_notional, config.quote
            );
            config.order_amount = Some(amount);
        }

        Self::new(config, exchange)
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridLevels {
        &self.grid
    }

    pub fn order_amount(&self) -> f64 {
        self.order_amount
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    /// One reconciliation cycle: fetch, log price, cancel, create.
    ///
    /// An open-order fetch failure degrades to an empty snapshot. Any other
    /// error escapes to the caller.
    pub async fn run_cycle(&self) -> GridResult<CycleReport> {
        let pair = self.config.pair();

        let open_orders = match self.exchange.fetch_open_orders(&pair).await {
            Ok(orders) => orders,
            Err(e) => {
                error!("Error fetching open orders: {}", e);
                Vec::new()
            }
        };

        let current_price = self.exchange.fetch_current_price(&pair).await?;
        info!("Current price: {}", current_price);

        let reconciler = OrderReconciler::new(&self.config, &self.grid, self.order_amount);
        reconciler.reconcile(&self.exchange, &open_orders).await
    }

    /// Advance the state machine by one step and return the pause to take
    pub async fn step(&mut self) -> Transition {
        let transition = match self.state {
            LoopState::Running => match self.run_cycle().await {
                Ok(report) => {
                    info!(
                        "Cycle complete: {} cancelled, {} placed, {} failed calls",
                        report.cancelled,
                        report.placed,
                        report.cancel_failures + report.place_failures
                    );
                    Transition {
                        next: LoopState::Running,
                        delay: self.config.time_interval(),
                        report: Some(report),
                    }
                }
                Err(e) => {
                    self.log_cycle_failure(&e);
                    Transition {
                        next: LoopState::Recovering,
                        delay: self.config.recovery_delay(),
                        report: None,
                    }
                }
            },
            LoopState::Recovering => {
                info!("Resuming grid reconciliation");
                Transition {
                    next: LoopState::Running,
                    delay: Duration::ZERO,
                    report: None,
                }
            }
        };

        self.state = transition.next;
        transition
    }

    fn log_cycle_failure(&self, e: &GridError) {
        error!("Exception in main loop: {}", e);
        warn!(
            "Retrying in {} seconds",
            self.config.recovery_delay().as_secs()
        );
    }

    /// Run forever; stopping is left to the process owner
    pub async fn run(&mut self) {
        info!("Starting grid bot for {}", self.config.pair());
        loop {
            let transition = self.step().await;
            if !transition.delay.is_zero() {
                tokio::time::sleep(transition.delay).await;
            }
        }
    }
}
