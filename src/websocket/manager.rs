//! Market-data synchronizer
//!
//! Owns the streaming connection lifecycle: snapshot bootstrap, gap
//! detection and resynchronization, reconnection with exponential backoff,
//! and throttled emission of order book views. One tokio task holds the
//! book, the transport and every timer for one connection, so aborting the
//! task cancels all of them and a reconnect always starts from reset state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{PriceUpdate, TradeEvent, WebSocketClient};
use crate::config::Config;
use crate::error::{MarketError, Result};
use crate::orderbook::{DeltaOutcome, OrderBook, OrderBookView};
use crate::parser::ParsedMessage;
use crate::rest::RestClient;

pub type BookCallback = Box<dyn Fn(&OrderBookView) + Send + Sync>;
pub type TradeCallback = Box<dyn Fn(&TradeEvent) + Send + Sync>;
pub type PriceCallback = Box<dyn Fn(&PriceUpdate) + Send + Sync>;

/// Single-subscriber callback slots; registering replaces any prior callback
#[derive(Default)]
struct CallbackSlots {
    book: Option<BookCallback>,
    trade: Option<TradeCallback>,
    price: Option<PriceCallback>,
}

#[derive(Default)]
struct SharedState {
    callbacks: Mutex<CallbackSlots>,
    /// Latest delivered view, replayed to late book subscribers
    last_view: Mutex<Option<OrderBookView>>,
}

/// Synchronizes one symbol's order book, trades and best price
pub struct MarketSynchronizer {
    config: Arc<Config>,
    rest: RestClient,
    shared: Arc<SharedState>,
    task: Option<JoinHandle<()>>,
}

impl MarketSynchronizer {
    pub fn new(config: Arc<Config>) -> Self {
        let rest = RestClient::new(&config.rest_endpoint);
        Self {
            config,
            rest,
            shared: Arc::new(SharedState::default()),
            task: None,
        }
    }

    /// Start synchronizing `symbol`
    ///
    /// No-op while a connection task is live (connected or connecting).
    /// Never fails toward the caller; transient errors are retried per the
    /// reconnect policy.
    pub fn connect(&mut self, symbol: &str) {
        if let Some(task) = &self.task {
            if !task.is_finished() {
                return;
            }
        }

        *self.shared.last_view.lock().unwrap() = None;

        let config = self.config.clone();
        let rest = self.rest.clone();
        let shared = self.shared.clone();
        let symbol = symbol.trim().to_lowercase();

        self.task = Some(tokio::spawn(run(config, rest, symbol, shared)));
    }

    /// Tear the connection down without triggering a reconnect
    ///
    /// Aborting the connection task cancels its pending reconnect,
    /// connect-timeout and throttle timers with it. Safe to call
    /// repeatedly.
    pub fn disconnect(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        *self.shared.last_view.lock().unwrap() = None;
    }

    /// Register the order-book callback, replacing any prior one
    ///
    /// If a book view is already available it is replayed to the new
    /// subscriber immediately.
    pub fn on_book_update(&self, callback: impl Fn(&OrderBookView) + Send + Sync + 'static) {
        let replay = self.shared.last_view.lock().unwrap().clone();
        let mut slots = self.shared.callbacks.lock().unwrap();
        slots.book = Some(Box::new(callback));
        if let (Some(view), Some(cb)) = (replay.as_ref(), slots.book.as_ref()) {
            cb(view);
        }
    }

    /// Register the trade callback, replacing any prior one
    pub fn on_trade(&self, callback: impl Fn(&TradeEvent) + Send + Sync + 'static) {
        self.shared.callbacks.lock().unwrap().trade = Some(Box::new(callback));
    }

    /// Register the best-price callback, replacing any prior one
    pub fn on_price_update(&self, callback: impl Fn(&PriceUpdate) + Send + Sync + 'static) {
        self.shared.callbacks.lock().unwrap().price = Some(Box::new(callback));
    }

    pub fn remove_book_update(&self) {
        self.shared.callbacks.lock().unwrap().book = None;
    }

    pub fn remove_trade(&self) {
        self.shared.callbacks.lock().unwrap().trade = None;
    }

    pub fn remove_price_update(&self) {
        self.shared.callbacks.lock().unwrap().price = None;
    }

    /// Whether a connection task is live
    pub fn is_connected(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for MarketSynchronizer {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Backoff delay before reconnect attempt `attempt`, `None` once the
/// attempt cap is reached
fn reconnect_delay(attempt: u32, config: &Config) -> Option<Duration> {
    if attempt >= config.max_reconnect_attempts {
        return None;
    }
    let delay = config
        .reconnect_base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    Some(Duration::from_millis(delay.min(config.reconnect_max_delay_ms)))
}

async fn run(config: Arc<Config>, rest: RestClient, symbol: String, shared: Arc<SharedState>) {
    let mut attempt: u32 = 0;

    loop {
        match run_connection(&config, &rest, &symbol, &shared, &mut attempt).await {
            Ok(()) => info!(symbol = %symbol, "Market stream ended"),
            Err(e) => warn!(symbol = %symbol, error = %e, "Market stream failed"),
        }

        let Some(delay) = reconnect_delay(attempt, &config) else {
            warn!(
                symbol = %symbol,
                attempts = attempt,
                "Reconnect attempts exhausted, stopping"
            );
            return;
        };

        warn!(
            symbol = %symbol,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting"
        );
        sleep(delay).await;
        attempt += 1;
    }
}

/// One connection lifetime: bootstrap, stream, fail
async fn run_connection(
    config: &Config,
    rest: &RestClient,
    symbol: &str,
    shared: &SharedState,
    attempt: &mut u32,
) -> Result<()> {
    // Each connection starts from reset book state
    let mut book = OrderBook::new(config.depth_levels);

    let snapshot = rest.depth_snapshot(symbol, config.snapshot_limit).await?;
    book.load_snapshot(&snapshot);
    publish_view(shared, book.view());

    let mut client = WebSocketClient::new(&config.ws_endpoint, symbol);
    match timeout(
        Duration::from_secs(config.connect_timeout_secs),
        client.connect(),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            client.close().await;
            return Err(MarketError::ConnectionTimeout);
        }
    }

    // A successful open resets the backoff counter
    *attempt = 0;
    info!(symbol = %symbol, last_update_id = book.last_update_id(), "Market stream synchronized");

    let mut throttle = interval(Duration::from_millis(config.throttle_interval_ms));
    throttle.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending: Option<OrderBookView> = None;

    loop {
        tokio::select! {
            _ = throttle.tick() => {
                if let Some(view) = pending.take() {
                    publish_view(shared, view);
                }
            }
            received = client.recv() => {
                if let Some(text) = received? {
                    handle_message(&text, &mut book, &mut pending, config, rest, symbol, shared)
                        .await?;
                }
            }
        }
    }
}

async fn handle_message(
    raw: &str,
    book: &mut OrderBook,
    pending: &mut Option<OrderBookView>,
    config: &Config,
    rest: &RestClient,
    symbol: &str,
    shared: &SharedState,
) -> Result<()> {
    let parsed = match ParsedMessage::parse(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Failed to parse stream message");
            return Ok(());
        }
    };

    match parsed {
        ParsedMessage::Depth(update) => match book.apply_delta(&update) {
            DeltaOutcome::Applied => {
                *pending = Some(book.view());
            }
            DeltaOutcome::Stale => {}
            DeltaOutcome::Gap => {
                warn!(
                    symbol = %symbol,
                    last_update_id = book.last_update_id(),
                    first_update_id = update.first_update_id,
                    "Sequence gap detected, reloading snapshot"
                );
                let snapshot = rest.depth_snapshot(symbol, config.snapshot_limit).await?;
                book.load_snapshot(&snapshot);
                *pending = Some(book.view());
            }
        },
        ParsedMessage::Trade(tick) => {
            let event = TradeEvent {
                price: tick.price,
                quantity: tick.quantity,
                timestamp: tick.trade_time,
                is_buyer_maker: tick.is_buyer_maker,
            };
            if let Some(cb) = &shared.callbacks.lock().unwrap().trade {
                cb(&event);
            }
        }
        ParsedMessage::Ticker(tick) => {
            let event = PriceUpdate {
                price: tick.last_price,
                timestamp: tick.event_time,
            };
            if let Some(cb) = &shared.callbacks.lock().unwrap().price {
                cb(&event);
            }
        }
        ParsedMessage::Unknown(stream) => {
            debug!(stream = %stream, "Unhandled stream message");
        }
    }

    Ok(())
}

/// Deliver a view to the book subscriber and cache it for late subscribers
fn publish_view(shared: &SharedState, view: OrderBookView) {
    *shared.last_view.lock().unwrap() = Some(view.clone());
    if let Some(cb) = &shared.callbacks.lock().unwrap().book {
        cb(&view);
    }
}
