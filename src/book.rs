//! L2 order book management
//!
//! One book per subscribed symbol, fed by snapshot-plus-delta updates from
//! the WebSocket (the venue's `l2Book` channel actually pushes full
//! snapshots, but incremental updates are supported for completeness).
//! Each book owns a copy of its symbol string; nothing in here may alias a
//! transport buffer.

use crate::decimal::Decimal;
use crate::errors::{HyperfillError, Result};
use crate::types::{Orderbook, OrderbookLevel, Side, TradingPair};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::{debug, trace};

/// Size and order count at one price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookEntry {
    pub size: Decimal,
    pub order_count: u32,
}

/// One incremental change; zero size removes the level
#[derive(Debug, Clone, Copy)]
pub struct BookUpdate {
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub order_count: u32,
}

/// Result of walking the ladder for a hypothetical order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlippageEstimate {
    /// Size-weighted average fill price
    pub avg_price: Decimal,
    pub filled_quantity: Decimal,
    /// Price of the deepest level touched
    pub worst_price: Decimal,
}

/// Per-symbol sorted ladders
///
/// `BTreeMap` keeps both sides price-ordered; bids read best-first via
/// `next_back`, asks via `next`.
#[derive(Debug, Clone)]
pub struct OrderBook {
    /// Owned copy of the venue symbol
    coin: String,
    bids: BTreeMap<Decimal, BookEntry>,
    asks: BTreeMap<Decimal, BookEntry>,
    /// Venue timestamp of the newest applied message (millis)
    last_update_ts: u64,
}

impl OrderBook {
    pub fn new(coin: impl Into<String>) -> Self {
        Self {
            coin: coin.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update_ts: 0,
        }
    }

    pub fn coin(&self) -> &str {
        &self.coin
    }

    pub fn last_update_ts(&self) -> u64 {
        self.last_update_ts
    }

    /// Replace both ladders wholesale; zero-quantity levels are filtered
    pub fn apply_snapshot(
        &mut self,
        bids: Vec<OrderbookLevel>,
        asks: Vec<OrderbookLevel>,
        timestamp_ms: u64,
    ) {
        if timestamp_ms < self.last_update_ts {
            trace!(coin = %self.coin, timestamp_ms, "stale snapshot dropped");
            return;
        }
        self.bids = bids
            .into_iter()
            .filter(|level| level.quantity > Decimal::ZERO)
            .map(|level| {
                (
                    level.price,
                    BookEntry {
                        size: level.quantity,
                        order_count: level.order_count,
                    },
                )
            })
            .collect();
        self.asks = asks
            .into_iter()
            .filter(|level| level.quantity > Decimal::ZERO)
            .map(|level| {
                (
                    level.price,
                    BookEntry {
                        size: level.quantity,
                        order_count: level.order_count,
                    },
                )
            })
            .collect();
        self.last_update_ts = timestamp_ms;
        debug!(
            coin = %self.coin,
            bids = self.bids.len(),
            asks = self.asks.len(),
            "snapshot applied"
        );
    }

    /// Apply incremental changes; messages older than the newest applied
    /// timestamp are discarded
    pub fn apply_update(&mut self, changes: &[BookUpdate], timestamp_ms: u64) {
        if timestamp_ms < self.last_update_ts {
            trace!(coin = %self.coin, timestamp_ms, "stale update dropped");
            return;
        }
        for change in changes {
            let ladder = match change.side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            if change.size.is_zero() {
                ladder.remove(&change.price);
            } else {
                ladder.insert(
                    change.price,
                    BookEntry {
                        size: change.size,
                        order_count: change.order_count,
                    },
                );
            }
        }
        self.last_update_ts = timestamp_ms;
    }

    pub fn best_bid(&self) -> Option<OrderbookLevel> {
        self.bids.iter().next_back().map(to_level)
    }

    pub fn best_ask(&self) -> Option<OrderbookLevel> {
        self.asks.iter().next().map(to_level)
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        bid.try_add(ask).ok()?.try_div(Decimal::from_int(2)).ok()
    }

    pub fn spread(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        ask.try_sub(bid).ok()
    }

    /// Spread relative to mid, in basis points
    pub fn spread_bps(&self) -> Option<Decimal> {
        let spread = self.spread()?;
        let mid = self.mid_price()?;
        if mid.is_zero() {
            return None;
        }
        spread
            .try_div(mid)
            .ok()?
            .try_mul(Decimal::from_int(10_000))
            .ok()
    }

    /// Total quantity on `side` at prices no worse than `price_limit`
    pub fn depth(&self, side: Side, price_limit: Decimal) -> Decimal {
        let total = match side {
            Side::Buy => self
                .bids
                .range(price_limit..)
                .map(|(_, entry)| entry.size)
                .try_fold(Decimal::ZERO, |acc, size| acc.try_add(size)),
            Side::Sell => self
                .asks
                .range(..=price_limit)
                .map(|(_, entry)| entry.size)
                .try_fold(Decimal::ZERO, |acc, size| acc.try_add(size)),
        };
        total.unwrap_or(Decimal::ZERO)
    }

    /// Walk the opposite ladder for an order of `quantity` on `side`,
    /// accumulating fills until the quantity is exhausted
    pub fn slippage_estimate(&self, side: Side, quantity: Decimal) -> Result<SlippageEstimate> {
        if quantity <= Decimal::ZERO {
            return Err(HyperfillError::invalid_format(format!(
                "slippage estimate requires positive quantity, got {quantity}"
            )));
        }

        // A buy consumes asks from the bottom, a sell consumes bids from
        // the top
        let levels: Vec<(Decimal, Decimal)> = match side {
            Side::Buy => self.asks.iter().map(|(p, e)| (*p, e.size)).collect(),
            Side::Sell => self.bids.iter().rev().map(|(p, e)| (*p, e.size)).collect(),
        };

        let mut remaining = quantity;
        let mut notional = Decimal::ZERO;
        let mut worst_price = Decimal::ZERO;

        for (price, size) in levels {
            let fill = remaining.min(size);
            notional = notional.try_add(fill.try_mul(price)?)?;
            worst_price = price;
            remaining = remaining.try_sub(fill)?;
            if remaining.is_zero() {
                break;
            }
        }

        if remaining > Decimal::ZERO {
            return Err(HyperfillError::insufficient_liquidity(format!(
                "{} of {} unfilled walking the {} ladder for {}",
                remaining,
                quantity,
                side.opposite().as_str(),
                self.coin
            )));
        }

        Ok(SlippageEstimate {
            avg_price: notional.try_div(quantity)?,
            filled_quantity: quantity,
            worst_price,
        })
    }

    /// Best-first levels on one side, up to `depth` entries
    pub fn levels(&self, side: Side, depth: usize) -> Vec<OrderbookLevel> {
        match side {
            Side::Buy => self.bids.iter().rev().take(depth).map(to_level).collect(),
            Side::Sell => self.asks.iter().take(depth).map(to_level).collect(),
        }
    }

    /// Detached unified snapshot, best-first on both sides
    pub fn to_orderbook(&self, pair: TradingPair, depth: Option<usize>) -> Orderbook {
        let depth = depth.unwrap_or(usize::MAX);
        Orderbook {
            pair,
            bids: self.levels(Side::Buy, depth),
            asks: self.levels(Side::Sell, depth),
            timestamp_ms: self.last_update_ts,
        }
    }

    /// A healthy book never crosses
    pub fn is_valid(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price < ask.price,
            _ => true,
        }
    }
}

fn to_level((price, entry): (&Decimal, &BookEntry)) -> OrderbookLevel {
    OrderbookLevel {
        price: *price,
        quantity: entry.size,
        order_count: entry.order_count,
    }
}

/// Thread-safe registry of books, one per subscribed symbol
///
/// All mutation happens under a single lock; I/O never does.
#[derive(Debug, Default)]
pub struct BookManager {
    books: Mutex<HashMap<String, OrderBook>>,
}

impl BookManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_snapshot(
        &self,
        coin: &str,
        bids: Vec<OrderbookLevel>,
        asks: Vec<OrderbookLevel>,
        timestamp_ms: u64,
    ) {
        let mut books = self.books.lock().expect("book lock poisoned");
        books
            // The map key and the book's own field are both owned copies,
            // duplicated from the transport buffer
            .entry(coin.to_string())
            .or_insert_with(|| OrderBook::new(coin.to_string()))
            .apply_snapshot(bids, asks, timestamp_ms);
    }

    pub fn apply_update(
        &self,
        coin: &str,
        changes: &[BookUpdate],
        timestamp_ms: u64,
    ) -> Result<()> {
        let mut books = self.books.lock().expect("book lock poisoned");
        let book = books.get_mut(coin).ok_or_else(|| {
            HyperfillError::invalid_pair(format!("no book tracked for {coin}"))
        })?;
        book.apply_update(changes, timestamp_ms);
        Ok(())
    }

    /// Clone of the book for `coin`, if tracked
    pub fn get(&self, coin: &str) -> Option<OrderBook> {
        let books = self.books.lock().expect("book lock poisoned");
        books.get(coin).cloned()
    }

    pub fn best_bid(&self, coin: &str) -> Option<OrderbookLevel> {
        let books = self.books.lock().expect("book lock poisoned");
        books.get(coin).and_then(|book| book.best_bid())
    }

    pub fn best_ask(&self, coin: &str) -> Option<OrderbookLevel> {
        let books = self.books.lock().expect("book lock poisoned");
        books.get(coin).and_then(|book| book.best_ask())
    }

    pub fn remove(&self, coin: &str) -> bool {
        let mut books = self.books.lock().expect("book lock poisoned");
        books.remove(coin).is_some()
    }

    pub fn coins(&self) -> Vec<String> {
        let books = self.books.lock().expect("book lock poisoned");
        books.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn level(price: &str, qty: &str, n: u32) -> OrderbookLevel {
        OrderbookLevel {
            price: dec(price),
            quantity: dec(qty),
            order_count: n,
        }
    }

    fn sample_book() -> OrderBook {
        let mut book = OrderBook::new("BTC");
        book.apply_snapshot(
            vec![level("50000", "1.0", 3), level("49999", "2.0", 1)],
            vec![level("50001", "0.5", 1), level("50002", "1.5", 2)],
            1_000,
        );
        book
    }

    #[test]
    fn test_snapshot_then_update() {
        // Snapshot: best bid 50000, best ask 50001, spread 1
        let mut book = sample_book();
        assert_eq!(book.best_bid().unwrap().price, dec("50000"));
        assert_eq!(book.best_ask().unwrap().price, dec("50001"));
        assert_eq!(book.spread().unwrap(), dec("1"));

        // Remove 50000 bid, add 49998
        book.apply_update(
            &[
                BookUpdate {
                    side: Side::Buy,
                    price: dec("50000"),
                    size: Decimal::ZERO,
                    order_count: 0,
                },
                BookUpdate {
                    side: Side::Buy,
                    price: dec("49998"),
                    size: dec("4.0"),
                    order_count: 2,
                },
            ],
            2_000,
        );

        let bids = book.levels(Side::Buy, 10);
        assert_eq!(bids.len(), 2);
        assert_eq!(bids[0], level("49999", "2.0", 1));
        assert_eq!(bids[1], level("49998", "4.0", 2));
        assert_eq!(book.best_bid().unwrap().price, dec("49999"));
    }

    #[test]
    fn test_stale_messages_dropped() {
        let mut book = sample_book();
        book.apply_update(
            &[BookUpdate {
                side: Side::Buy,
                price: dec("50000"),
                size: Decimal::ZERO,
                order_count: 0,
            }],
            500, // older than the snapshot
        );
        assert_eq!(book.best_bid().unwrap().price, dec("50000"));

        book.apply_snapshot(vec![], vec![], 400);
        assert!(book.best_bid().is_some());
        assert_eq!(book.last_update_ts(), 1_000);
    }

    #[test]
    fn test_snapshot_filters_zero_quantity() {
        let mut book = OrderBook::new("ETH");
        book.apply_snapshot(
            vec![level("2000", "1.0", 1), level("1999", "0", 0)],
            vec![level("2001", "0", 0)],
            1,
        );
        assert_eq!(book.levels(Side::Buy, 10).len(), 1);
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn test_mid_and_spread_bps() {
        let book = sample_book();
        assert_eq!(book.mid_price().unwrap(), dec("50000.5"));
        // 1 / 50000.5 * 10000 ≈ 0.1999 bps
        let bps = book.spread_bps().unwrap();
        assert!(bps > dec("0.19") && bps < dec("0.21"));

        let empty = OrderBook::new("ETH");
        assert!(empty.mid_price().is_none());
        assert!(empty.spread().is_none());
    }

    #[test]
    fn test_depth() {
        let book = sample_book();
        assert_eq!(book.depth(Side::Buy, dec("49999")), dec("3.0"));
        assert_eq!(book.depth(Side::Buy, dec("50000")), dec("1.0"));
        assert_eq!(book.depth(Side::Sell, dec("50002")), dec("2.0"));
        assert_eq!(book.depth(Side::Sell, dec("50001")), dec("0.5"));
    }

    #[test]
    fn test_slippage_walks_levels() {
        let book = sample_book();
        // Buy 1.0: 0.5 @ 50001 + 0.5 @ 50002 -> VWAP 50001.5
        let estimate = book.slippage_estimate(Side::Buy, dec("1.0")).unwrap();
        assert_eq!(estimate.avg_price, dec("50001.5"));
        assert_eq!(estimate.worst_price, dec("50002"));
        assert_eq!(estimate.filled_quantity, dec("1.0"));

        // Sell 1.0 fills entirely at the best bid
        let estimate = book.slippage_estimate(Side::Sell, dec("1.0")).unwrap();
        assert_eq!(estimate.avg_price, dec("50000"));
    }

    #[test]
    fn test_slippage_insufficient_liquidity() {
        let book = sample_book();
        let err = book.slippage_estimate(Side::Buy, dec("100")).unwrap_err();
        assert!(matches!(
            err,
            HyperfillError::Data {
                kind: crate::errors::DataErrorKind::InsufficientLiquidity,
                ..
            }
        ));
    }

    #[test]
    fn test_to_orderbook_is_detached_and_ordered() {
        let mut book = sample_book();
        let snapshot = book.to_orderbook("BTC-USDC".parse().unwrap(), None);
        book.apply_snapshot(vec![], vec![], 3_000);

        assert_eq!(snapshot.bids[0].price, dec("50000"));
        assert_eq!(snapshot.bids[1].price, dec("49999"));
        assert_eq!(snapshot.asks[0].price, dec("50001"));
        assert_eq!(snapshot.asks[1].price, dec("50002"));
        assert_eq!(snapshot.timestamp_ms, 1_000);
    }

    #[test]
    fn test_manager_owns_symbol_strings() {
        let manager = BookManager::new();
        {
            // Simulates a transient transport buffer going out of scope
            let transient = String::from("SOL");
            manager.apply_snapshot(&transient, vec![level("150", "10", 1)], vec![], 1);
        }
        assert_eq!(manager.best_bid("SOL").unwrap().price, dec("150"));
        assert_eq!(manager.coins(), vec!["SOL".to_string()]);
        assert!(manager.remove("SOL"));
        assert!(manager.get("SOL").is_none());
    }

    #[test]
    fn test_manager_update_requires_tracked_book() {
        let manager = BookManager::new();
        let result = manager.apply_update(
            "DOGE",
            &[BookUpdate {
                side: Side::Buy,
                price: dec("0.1"),
                size: dec("100"),
                order_count: 1,
            }],
            1,
        );
        assert!(result.is_err());
    }

    proptest! {
        // After any sequence of updates: bids strictly descending, asks
        // strictly ascending, no zero-quantity levels
        #[test]
        fn prop_ladders_stay_sorted_and_positive(
            updates in proptest::collection::vec(
                (any::<bool>(), 1u32..100, 0u32..50), 0..200
            )
        ) {
            let mut book = OrderBook::new("TEST");
            for (ts, (is_buy, price, size)) in updates.into_iter().enumerate() {
                book.apply_update(
                    &[BookUpdate {
                        side: if is_buy { Side::Buy } else { Side::Sell },
                        price: Decimal::from_int(price as i64),
                        size: Decimal::from_int(size as i64),
                        order_count: 1,
                    }],
                    ts as u64,
                );
            }
            let bids = book.levels(Side::Buy, usize::MAX);
            for pair in bids.windows(2) {
                prop_assert!(pair[0].price > pair[1].price);
            }
            let asks = book.levels(Side::Sell, usize::MAX);
            for pair in asks.windows(2) {
                prop_assert!(pair[0].price < pair[1].price);
            }
            for level in bids.iter().chain(asks.iter()) {
                prop_assert!(level.quantity > Decimal::ZERO);
            }
        }
    }
}
