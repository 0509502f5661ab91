//! Mini Crypto Trader - console front end
//!
//! Wires the synchronizer to the order matcher and logs market state;
//! table/chart rendering lives elsewhere.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use minitrader_core::{
    Config, JsonFileStore, KlineInterval, MarketSynchronizer, OrderMatcher, RestClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let config = Arc::new(Config::load()?);
    info!(symbol = %config.symbol, "Starting Mini Crypto Trader core");

    let store = JsonFileStore::open(&config.store_path);
    let matcher = Arc::new(Mutex::new(OrderMatcher::new(store)));

    {
        let matcher = matcher.lock().unwrap();
        info!(
            open_orders = matcher.open_orders(&config.symbol).len(),
            balance = %matcher.balance(),
            "Trading state hydrated"
        );
    }

    // Chart history backfill
    let rest = RestClient::new(&config.rest_endpoint);
    let candles = rest.klines(&config.symbol, KlineInterval::OneHour, 100).await;
    info!(candles = candles.len(), "Loaded historical candles");

    let mut sync = MarketSynchronizer::new(config.clone());

    sync.on_book_update(|view| {
        if let (Some(bid), Some(ask)) = (view.best_bid(), view.best_ask()) {
            debug!(
                best_bid = %bid.price,
                best_ask = %ask.price,
                bid_levels = view.bids.len(),
                ask_levels = view.asks.len(),
                "Order book updated"
            );
        }
    });

    sync.on_trade(|trade| {
        debug!(price = %trade.price, quantity = %trade.quantity, "Trade");
    });

    let symbol = config.symbol.clone();
    let tick_matcher = matcher.clone();
    sync.on_price_update(move |update| {
        let mut matcher = tick_matcher.lock().unwrap();
        let filled = matcher.on_price_tick(&symbol, update.price);
        if !filled.is_empty() {
            let position = matcher.position(&symbol);
            info!(
                fills = filled.len(),
                position = %position.amount,
                avg_price = %position.avg_price,
                balance = %matcher.balance(),
                "Tick filled orders"
            );
        }
    });

    sync.connect(&config.symbol);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    sync.disconnect();

    Ok(())
}
