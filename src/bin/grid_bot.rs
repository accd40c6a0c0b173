//! Grid Trading Bot Binary
//!
//! Runs the WIF/USDT (by default) spot grid on Phemex.
//!
//! ## Setup
//!
//! 1. Create a `.env` file in the project root:
//!    ```text
//!    PHEMEX_API_KEY=your-key
//!    PHEMEX_API_SECRET=your-secret
//!    ```
//!
//! 2. Run the bot:
//!    ```bash
//!    cargo run --bin grid_bot -- --grid_size 100 --price_min 1.9118 --price_max 3.4322
//!    ```
//!
//! `--paper` simulates fills locally against live quotes and needs no keys.

use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};

use phemex_grid_bot::{
    config::{CliOverrides, Credentials, Settings},
    grid::{ControlLoop, GridConfig, GridExchange, GridResult, PhemexExchange},
    market::PaperExchange,
    phemex::PhemexClient,
};

#[derive(Parser, Debug)]
#[command(name = "grid_bot")]
#[command(about = "Single-pair spot grid trading bot for Phemex", long_about = None)]
#[command(version)]
struct Cli {
    /// Number of grid levels
    #[arg(long = "grid_size", alias = "grid-size")]
    grid_size: Option<u32>,

    /// Lowest grid price
    #[arg(long = "price_min", alias = "price-min")]
    price_min: Option<f64>,

    /// Highest grid price
    #[arg(long = "price_max", alias = "price-max")]
    price_max: Option<f64>,

    /// Base amount per order (default: 1.1 quote worth at the last price)
    #[arg(long = "order_amount", alias = "order-amount")]
    order_amount: Option<f64>,

    /// Seconds between cycles
    #[arg(long = "time_interval", alias = "time-interval")]
    time_interval: Option<u64>,

    /// Trading pair, e.g. WIF/USDT
    #[arg(long)]
    pair: Option<String>,

    /// TOML or JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulate fills locally instead of sending orders
    #[arg(long)]
    paper: bool,

    /// Use the Phemex testnet
    #[arg(long)]
    testnet: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            pair: self.pair.clone(),
            grid_size: self.grid_size,
            price_min: self.price_min,
            price_max: self.price_max,
            order_amount: self.order_amount,
            time_interval: self.time_interval,
            paper: self.paper,
            testnet: self.testnet,
        }
    }
}

async fn run_bot<E: GridExchange>(config: GridConfig, exchange: E) -> GridResult<()> {
    let mut bot = ControlLoop::start(config, exchange).await?;
    bot.run().await;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref(), &cli.overrides())?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log.level))
        .init();

    match dotenv {
        Ok(path) => info!("Loaded environment from: {}", path.display()),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let grid = &settings.grid;
    info!("Pair: {}", grid.pair());
    info!("Grid range: {} - {}", grid.price_min, grid.price_max);
    info!("Number of levels: {}", grid.grid_size);
    info!("Cycle interval: {}s", grid.time_interval_secs);

    let network = &settings.network;
    if network.testnet {
        info!("Using TESTNET");
    } else if !settings.is_paper() {
        warn!("Using MAINNET - Real funds at risk!");
    }

    let precision = grid.precision();

    if settings.is_paper() {
        info!("Paper trading mode: orders are simulated locally");
        let client = PhemexClient::new(network.phemex_config(None))?;
        let source = PhemexExchange::new(client, precision);
        let exchange = PaperExchange::new(source, settings.paper.clone());
        run_bot(settings.grid, exchange).await?;
    } else {
        let credentials = Credentials::from_env()?;
        let client = PhemexClient::new(network.phemex_config(Some(credentials)))?;
        let exchange = PhemexExchange::new(client, precision);
        run_bot(settings.grid, exchange).await?;
    }

    Ok(())
}
