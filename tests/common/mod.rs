//! Shared test fixtures
//!
//! `MockConnector` implements every connector method so the order manager
//! and position tracker can run complete lifecycles with no venue attached.

use async_trait::async_trait;
use hyperfill::{
    Account, Balance, CancelAllResult, Candle, Connector, Decimal, ExchangeOrderId, HyperfillError,
    Order, OrderAck, OrderRequest, Orderbook, Position, Result, Side, Ticker, TradingPair,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub fn btc_usdc() -> TradingPair {
    "BTC-USDC".parse().unwrap()
}

/// Fully scriptable in-memory connector
#[derive(Default)]
pub struct MockConnector {
    connected: AtomicBool,
    pub create_results: Mutex<VecDeque<Result<OrderAck>>>,
    pub cancel_results: Mutex<VecDeque<Result<()>>>,
    pub open_orders: Mutex<Vec<Order>>,
    pub positions: Mutex<Vec<Position>>,
    pub account: Mutex<Account>,
    pub mids: Mutex<HashMap<TradingPair, Decimal>>,
    /// Every order request the manager handed to the connector
    pub submitted: Mutex<Vec<OrderRequest>>,
    /// Every (pair, oid) cancel the manager issued
    pub cancelled: Mutex<Vec<(TradingPair, ExchangeOrderId)>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_create(&self, result: Result<OrderAck>) {
        self.create_results.lock().unwrap().push_back(result);
    }

    pub fn push_cancel(&self, result: Result<()>) {
        self.cancel_results.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn get_ticker(&self, pair: &TradingPair) -> Result<Ticker> {
        let mids = self.mids.lock().unwrap();
        let mid = mids.get(pair).copied();
        Ok(Ticker {
            pair: pair.clone(),
            bid: mid,
            ask: mid,
            last: mid,
            volume_24h: None,
            timestamp_ms: 0,
        })
    }

    async fn get_orderbook(&self, pair: &TradingPair, _depth: Option<usize>) -> Result<Orderbook> {
        Ok(Orderbook {
            pair: pair.clone(),
            bids: Vec::new(),
            asks: Vec::new(),
            timestamp_ms: 0,
        })
    }

    async fn get_all_mids(&self) -> Result<HashMap<TradingPair, Decimal>> {
        Ok(self.mids.lock().unwrap().clone())
    }

    async fn get_candles(
        &self,
        _pair: &TradingPair,
        _interval: &str,
        _start_time_ms: u64,
        _end_time_ms: u64,
    ) -> Result<Vec<Candle>> {
        Ok(Vec::new())
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        self.submitted.lock().unwrap().push(request.clone());
        self.create_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(HyperfillError::invariant("no scripted create result")))
    }

    async fn cancel_order(
        &self,
        pair: &TradingPair,
        exchange_order_id: ExchangeOrderId,
    ) -> Result<()> {
        self.cancelled
            .lock()
            .unwrap()
            .push((pair.clone(), exchange_order_id));
        self.cancel_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn cancel_all(&self, pair: Option<&TradingPair>) -> Result<CancelAllResult> {
        let open = self.open_orders.lock().unwrap();
        let count = open
            .iter()
            .filter(|order| pair.is_none() || Some(&order.pair) == pair)
            .count();
        Ok(CancelAllResult {
            cancelled: count,
            failures: Vec::new(),
        })
    }

    async fn get_order(&self, exchange_order_id: ExchangeOrderId) -> Result<Order> {
        self.open_orders
            .lock()
            .unwrap()
            .iter()
            .find(|order| order.exchange_order_id == Some(exchange_order_id))
            .cloned()
            .ok_or_else(|| HyperfillError::order_not_found(format!("oid {exchange_order_id}")))
    }

    async fn get_open_orders(&self, pair: Option<&TradingPair>) -> Result<Vec<Order>> {
        Ok(self
            .open_orders
            .lock()
            .unwrap()
            .iter()
            .filter(|order| pair.is_none() || Some(&order.pair) == pair)
            .cloned()
            .collect())
    }

    async fn get_balance(&self) -> Result<Vec<Balance>> {
        let account = self.account.lock().unwrap();
        Ok(vec![Balance {
            asset: "USDC".to_string(),
            total: account.total_balance,
            available: account.available_balance,
            locked: account
                .total_balance
                .try_sub(account.available_balance)
                .unwrap_or(Decimal::ZERO),
        }])
    }

    async fn get_positions(&self) -> Result<Vec<Position>> {
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn get_account(&self) -> Result<Account> {
        Ok(self.account.lock().unwrap().clone())
    }

    async fn update_leverage(
        &self,
        _pair: &TradingPair,
        _leverage: u32,
        _cross: bool,
    ) -> Result<()> {
        Ok(())
    }
}

/// A buy fill against the mock order
pub fn buy_fill(
    oid: ExchangeOrderId,
    tid: u64,
    pair: TradingPair,
    price: &str,
    size: &str,
) -> hyperfill::Fill {
    hyperfill::Fill {
        trade_id: tid,
        exchange_order_id: oid,
        pair,
        side: Side::Buy,
        price: dec(price),
        size: dec(size),
        fee: Decimal::ZERO,
        closed_pnl: None,
        timestamp_ms: tid,
    }
}
