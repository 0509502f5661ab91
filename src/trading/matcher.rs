//! Order matcher and position tracker
//!
//! Owns the virtual order collection and the fill history, both persisted
//! whole to the key-value store; the in-memory copies are caches hydrated
//! at startup. Matching runs against incoming best-price ticks.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use super::{OrderSide, OrderStatus, Position, TradeFill, VirtualOrder};
use crate::storage::KvStore;

pub const ORDERS_KEY: &str = "virtualOrders";
pub const TRADE_HISTORY_KEY: &str = "virtualTradeHistory";
pub const INITIAL_BALANCE_KEY: &str = "virtualInitialBalance";
pub const BALANCE_KEY: &str = "virtualBalance";

/// Starting cash for a fresh store
const INITIAL_BALANCE: u64 = 100_000;

/// Matches virtual orders against price ticks and tracks the results
pub struct OrderMatcher<S: KvStore> {
    store: S,
    orders: Vec<VirtualOrder>,
    history: Vec<TradeFill>,
}

impl<S: KvStore> OrderMatcher<S> {
    /// Hydrate the order and history caches from the store
    pub fn new(store: S) -> Self {
        let orders: Vec<VirtualOrder> = store.get(ORDERS_KEY, Vec::new());
        let history: Vec<TradeFill> = store.get(TRADE_HISTORY_KEY, Vec::new());
        Self {
            store,
            orders,
            history,
        }
    }

    /// Create an open order and persist the collection
    ///
    /// Price/amount positivity and balance sufficiency are the caller's
    /// concern; placement itself is unconditional.
    pub fn place_order(
        &mut self,
        side: OrderSide,
        price: Decimal,
        amount: Decimal,
        symbol: &str,
    ) -> String {
        let order = VirtualOrder {
            id: Uuid::new_v4().to_string(),
            side,
            price,
            amount,
            symbol: symbol.to_string(),
            status: OrderStatus::Open,
        };
        let id = order.id.clone();

        info!(id = %id, side = ?side, price = %price, amount = %amount, "Order placed");
        self.orders.push(order);
        self.store.set(ORDERS_KEY, &self.orders);
        id
    }

    /// Remove the order with `id` if present; silently does nothing otherwise
    pub fn cancel_order(&mut self, id: &str) {
        let before = self.orders.len();
        self.orders.retain(|order| order.id != id);
        if self.orders.len() != before {
            self.store.set(ORDERS_KEY, &self.orders);
        }
    }

    /// Match open orders of `symbol` against a best-price tick
    ///
    /// A buy fills when the tick is at or below its limit, a sell when at
    /// or above. Filled orders take the tick as execution price. All fills
    /// from one tick are appended to the history as one batch, guarded by
    /// id presence so re-evaluation cannot duplicate entries. Returns the
    /// ids filled by this tick.
    pub fn on_price_tick(&mut self, symbol: &str, price: Decimal) -> Vec<String> {
        let mut filled = Vec::new();

        for order in &mut self.orders {
            if order.status != OrderStatus::Open || order.symbol != symbol {
                continue;
            }
            let crosses = match order.side {
                OrderSide::Buy => price <= order.price,
                OrderSide::Sell => price >= order.price,
            };
            if crosses {
                order.price = price;
                order.status = OrderStatus::Filled;
                filled.push(order.id.clone());
            }
        }

        if filled.is_empty() {
            return filled;
        }

        self.store.set(ORDERS_KEY, &self.orders);

        let now = Utc::now().timestamp_millis();
        for order in self
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Filled && o.symbol == symbol)
        {
            if self.history.iter().any(|fill| fill.id == order.id) {
                continue;
            }
            self.history.push(TradeFill {
                id: order.id.clone(),
                side: order.side,
                price: order.price,
                amount: order.amount,
                symbol: order.symbol.clone(),
                time: now,
            });
        }
        self.store.set(TRADE_HISTORY_KEY, &self.history);

        info!(symbol = %symbol, price = %price, fills = filled.len(), "Orders filled");
        filled
    }

    /// Open orders for `symbol`
    pub fn open_orders(&self, symbol: &str) -> Vec<&VirtualOrder> {
        self.orders
            .iter()
            .filter(|o| o.status == OrderStatus::Open && o.symbol == symbol)
            .collect()
    }

    /// Fill history for `symbol`, oldest first
    pub fn history(&self, symbol: &str) -> Vec<&TradeFill> {
        self.history
            .iter()
            .filter(|fill| fill.symbol == symbol)
            .collect()
    }

    /// Fold the fill history for `symbol` into a position
    ///
    /// Net amount is Σbuys − Σsells; average price is cumulative buy cost
    /// over cumulative buy amount. A flat or net-short history reports a
    /// zero position; the matcher itself never rejects oversells.
    pub fn position(&self, symbol: &str) -> Position {
        let mut total_buy = Decimal::ZERO;
        let mut total_sell = Decimal::ZERO;
        let mut total_cost = Decimal::ZERO;

        for fill in self.history.iter().filter(|f| f.symbol == symbol) {
            match fill.side {
                OrderSide::Buy => {
                    total_buy += fill.amount;
                    total_cost += fill.amount * fill.price;
                }
                OrderSide::Sell => total_sell += fill.amount,
            }
        }

        let net = total_buy - total_sell;
        if net > Decimal::ZERO {
            Position {
                amount: net,
                avg_price: total_cost / total_buy,
            }
        } else {
            Position {
                amount: Decimal::ZERO,
                avg_price: Decimal::ZERO,
            }
        }
    }

    /// Fold the whole fill history into the cash balance
    ///
    /// The result is re-persisted on every computation; the stored value
    /// is a continuously refreshed cache, the history stays authoritative.
    pub fn balance(&self) -> Decimal {
        let mut balance = self.initial_balance();
        for fill in &self.history {
            match fill.side {
                OrderSide::Buy => balance -= fill.amount * fill.price,
                OrderSide::Sell => balance += fill.amount * fill.price,
            }
        }
        self.store.set(BALANCE_KEY, &balance);
        balance
    }

    /// Starting balance, persisted once on first read
    fn initial_balance(&self) -> Decimal {
        match self.store.get::<Option<Decimal>>(INITIAL_BALANCE_KEY, None) {
            Some(balance) => balance,
            None => {
                let initial = Decimal::from(INITIAL_BALANCE);
                self.store.set(INITIAL_BALANCE_KEY, &initial);
                initial
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonFileStore, MemoryStore};
    use rust_decimal_macros::dec;

    const SYMBOL: &str = "btcusdt";

    fn matcher() -> OrderMatcher<MemoryStore> {
        OrderMatcher::new(MemoryStore::new())
    }

    #[test]
    fn buy_fills_at_or_below_limit() {
        for tick in [dec!(100), dec!(99), dec!(50)] {
            let mut m = matcher();
            m.place_order(OrderSide::Buy, dec!(100), dec!(1), SYMBOL);
            let filled = m.on_price_tick(SYMBOL, tick);
            assert_eq!(filled.len(), 1, "buy@100 should fill at tick {tick}");
        }

        let mut m = matcher();
        m.place_order(OrderSide::Buy, dec!(100), dec!(1), SYMBOL);
        assert!(m.on_price_tick(SYMBOL, dec!(101)).is_empty());
        assert_eq!(m.open_orders(SYMBOL).len(), 1);
    }

    #[test]
    fn sell_fills_at_or_above_limit() {
        for tick in [dec!(100), dec!(101), dec!(150)] {
            let mut m = matcher();
            m.place_order(OrderSide::Sell, dec!(100), dec!(1), SYMBOL);
            let filled = m.on_price_tick(SYMBOL, tick);
            assert_eq!(filled.len(), 1, "sell@100 should fill at tick {tick}");
        }

        let mut m = matcher();
        m.place_order(OrderSide::Sell, dec!(100), dec!(1), SYMBOL);
        assert!(m.on_price_tick(SYMBOL, dec!(99)).is_empty());
        assert_eq!(m.open_orders(SYMBOL).len(), 1);
    }

    #[test]
    fn fill_records_execution_price_not_limit() {
        let mut m = matcher();
        let id = m.place_order(OrderSide::Buy, dec!(100), dec!(2), SYMBOL);
        m.on_price_tick(SYMBOL, dec!(95));

        let history = m.history(SYMBOL);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, id);
        assert_eq!(history[0].price, dec!(95));
        assert_eq!(history[0].amount, dec!(2));
    }

    #[test]
    fn other_symbols_are_untouched() {
        let mut m = matcher();
        m.place_order(OrderSide::Buy, dec!(100), dec!(1), "ethusdt");
        assert!(m.on_price_tick(SYMBOL, dec!(50)).is_empty());
        assert_eq!(m.open_orders("ethusdt").len(), 1);
    }

    #[test]
    fn re_evaluation_does_not_duplicate_history() {
        let mut m = matcher();
        let first = m.place_order(OrderSide::Buy, dec!(100), dec!(1), SYMBOL);
        m.on_price_tick(SYMBOL, dec!(100));
        assert_eq!(m.history(SYMBOL).len(), 1);

        // A later tick re-walks the filled order while filling a second one
        m.place_order(OrderSide::Buy, dec!(95), dec!(1), SYMBOL);
        m.on_price_tick(SYMBOL, dec!(90));

        let history = m.history(SYMBOL);
        assert_eq!(history.len(), 2);
        assert_eq!(
            history.iter().filter(|f| f.id == first).count(),
            1,
            "first fill must appear exactly once"
        );
    }

    #[test]
    fn multiple_orders_fill_from_one_tick() {
        let mut m = matcher();
        m.place_order(OrderSide::Buy, dec!(100), dec!(1), SYMBOL);
        m.place_order(OrderSide::Buy, dec!(105), dec!(1), SYMBOL);
        m.place_order(OrderSide::Sell, dec!(90), dec!(1), SYMBOL);

        let filled = m.on_price_tick(SYMBOL, dec!(95));
        assert_eq!(filled.len(), 3);
        assert_eq!(m.history(SYMBOL).len(), 3);
        assert!(m.open_orders(SYMBOL).is_empty());
    }

    #[test]
    fn cancel_removes_open_order() {
        let mut m = matcher();
        let id = m.place_order(OrderSide::Buy, dec!(100), dec!(1), SYMBOL);
        m.cancel_order(&id);
        assert!(m.open_orders(SYMBOL).is_empty());
        assert!(m.on_price_tick(SYMBOL, dec!(50)).is_empty());
    }

    #[test]
    fn cancel_of_unknown_id_is_a_noop() {
        let mut m = matcher();
        m.place_order(OrderSide::Buy, dec!(100), dec!(1), SYMBOL);
        m.cancel_order("no-such-id");
        assert_eq!(m.open_orders(SYMBOL).len(), 1);
    }

    #[test]
    fn interleaved_placement_and_matching_loses_nothing() {
        let mut m = matcher();
        let first = m.place_order(OrderSide::Buy, dec!(100), dec!(1), SYMBOL);
        m.on_price_tick(SYMBOL, dec!(100));
        let second = m.place_order(OrderSide::Buy, dec!(90), dec!(1), SYMBOL);

        // The first fill must still be on record alongside the new order
        let stored: Vec<VirtualOrder> = m.store.get(ORDERS_KEY, Vec::new());
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|o| o.id == first && o.status == OrderStatus::Filled));
        assert!(stored.iter().any(|o| o.id == second && o.status == OrderStatus::Open));

        m.on_price_tick(SYMBOL, dec!(85));
        assert_eq!(m.history(SYMBOL).len(), 2);
    }

    #[test]
    fn position_uses_volume_weighted_average_cost() {
        let mut m = matcher();
        m.place_order(OrderSide::Buy, dec!(100), dec!(1), SYMBOL);
        m.on_price_tick(SYMBOL, dec!(100));
        m.place_order(OrderSide::Buy, dec!(200), dec!(1), SYMBOL);
        m.on_price_tick(SYMBOL, dec!(200));
        m.place_order(OrderSide::Sell, dec!(150), dec!(1), SYMBOL);
        m.on_price_tick(SYMBOL, dec!(150));

        let position = m.position(SYMBOL);
        assert_eq!(position.amount, dec!(1));
        assert_eq!(position.avg_price, dec!(150));
    }

    #[test]
    fn flat_position_reports_zero() {
        let m = matcher();
        let position = m.position(SYMBOL);
        assert_eq!(position.amount, Decimal::ZERO);
        assert_eq!(position.avg_price, Decimal::ZERO);
    }

    #[test]
    fn oversell_is_not_rejected_and_reports_zero_position() {
        let mut m = matcher();
        m.place_order(OrderSide::Sell, dec!(100), dec!(5), SYMBOL);
        let filled = m.on_price_tick(SYMBOL, dec!(100));
        assert_eq!(filled.len(), 1);

        let position = m.position(SYMBOL);
        assert_eq!(position.amount, Decimal::ZERO);
        assert_eq!(m.balance(), dec!(100500));
    }

    #[test]
    fn balance_round_trip() {
        let mut m = matcher();
        m.place_order(OrderSide::Buy, dec!(100), dec!(1), SYMBOL);
        m.on_price_tick(SYMBOL, dec!(100));
        m.place_order(OrderSide::Sell, dec!(200), dec!(1), SYMBOL);
        m.on_price_tick(SYMBOL, dec!(200));

        assert_eq!(m.balance(), dec!(100100));

        let cached: Option<Decimal> = m.store.get(BALANCE_KEY, None);
        assert_eq!(cached, Some(dec!(100100)));
    }

    #[test]
    fn initial_balance_is_persisted_once() {
        let m = matcher();
        assert_eq!(m.balance(), dec!(100000));

        // Overwrite the persisted seed; later folds must keep honoring it
        m.store.set(INITIAL_BALANCE_KEY, &dec!(5000));
        assert_eq!(m.balance(), dec!(5000));
    }

    #[test]
    fn state_survives_rehydration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let placed = {
            let mut m = OrderMatcher::new(JsonFileStore::open(&path));
            let id = m.place_order(OrderSide::Buy, dec!(100), dec!(1), SYMBOL);
            m.on_price_tick(SYMBOL, dec!(100));
            m.place_order(OrderSide::Sell, dec!(500), dec!(1), SYMBOL);
            id
        };

        let m = OrderMatcher::new(JsonFileStore::open(&path));
        assert_eq!(m.history(SYMBOL).len(), 1);
        assert_eq!(m.history(SYMBOL)[0].id, placed);
        assert_eq!(m.open_orders(SYMBOL).len(), 1);
        assert_eq!(m.position(SYMBOL).amount, dec!(1));
    }
}
