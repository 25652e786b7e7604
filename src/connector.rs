//! Exchange abstraction layer
//!
//! The order manager and position tracker depend only on the [`Connector`]
//! trait; concrete venues plug in behind it. All methods speak the unified
//! types from `types`; symbol mapping between `TradingPair` and venue-native
//! strings happens inside each implementation, never in callers.

use crate::decimal::Decimal;
use crate::errors::{HyperfillError, Result};
use crate::types::{
    Account, Balance, Candle, ExchangeOrderId, Fill, Order, OrderRequest, OrderStatus, Orderbook,
    Position, Ticker, TradingPair,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Outcome of a successful order submission
///
/// A resting limit returns only the exchange id; a crossed or IOC order
/// comes back already executed with its fill totals. Rejections surface as
/// `OrderRejected` errors, not as a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAck {
    Resting {
        exchange_order_id: ExchangeOrderId,
    },
    Filled {
        exchange_order_id: ExchangeOrderId,
        filled_quantity: Decimal,
        avg_fill_price: Decimal,
    },
}

impl OrderAck {
    pub fn exchange_order_id(&self) -> ExchangeOrderId {
        match self {
            OrderAck::Resting { exchange_order_id }
            | OrderAck::Filled {
                exchange_order_id, ..
            } => *exchange_order_id,
        }
    }
}

/// Per-order outcome of a batch cancel
#[derive(Debug, Clone, Default)]
pub struct CancelAllResult {
    pub cancelled: usize,
    /// Orders the venue refused to cancel, with its reason
    pub failures: Vec<(ExchangeOrderId, String)>,
}

impl CancelAllResult {
    /// The aggregate only fails when every sub-operation failed
    pub fn into_result(self) -> Result<CancelAllResult> {
        if self.cancelled == 0 && !self.failures.is_empty() {
            let detail: Vec<String> = self
                .failures
                .iter()
                .map(|(oid, reason)| format!("{oid}: {reason}"))
                .collect();
            return Err(HyperfillError::order_rejected(format!(
                "all cancels failed: {}",
                detail.join("; ")
            )));
        }
        Ok(self)
    }
}

/// Order status change pushed over the user stream
#[derive(Debug, Clone)]
pub struct OrderUpdateEvent {
    pub exchange_order_id: ExchangeOrderId,
    pub pair: TradingPair,
    pub status: OrderStatus,
    pub timestamp_ms: u64,
}

/// Unified event demultiplexed from one WebSocket message
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The L2 book for this pair absorbed a snapshot or update
    BookUpdated(TradingPair),
    /// Fresh mid prices, pair → mid
    MidPrices(HashMap<TradingPair, Decimal>),
    /// Order lifecycle change for this account
    OrderUpdate(OrderUpdateEvent),
    /// Execution against one of this account's orders
    Fill(Fill),
}

/// Polymorphic exchange connector
///
/// Implementations are responsible for authentication, symbol mapping,
/// venue-specific rounding, and converting wire shapes to unified types.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stable connector identifier, e.g. "hyperliquid"
    fn name(&self) -> &str;

    /// Prepare the connector for trading (metadata, sessions)
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    async fn get_ticker(&self, pair: &TradingPair) -> Result<Ticker>;

    async fn get_orderbook(&self, pair: &TradingPair, depth: Option<usize>) -> Result<Orderbook>;

    /// Mid prices for every listed instrument, pair → mid
    async fn get_all_mids(&self) -> Result<HashMap<TradingPair, Decimal>>;

    async fn get_candles(
        &self,
        pair: &TradingPair,
        interval: &str,
        start_time_ms: u64,
        end_time_ms: u64,
    ) -> Result<Vec<Candle>>;

    /// Submit an order; business rejections fail with `OrderRejected`
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderAck>;

    /// Cancel by exchange id; a terminal order fails with
    /// `OrderNotCancellable`
    async fn cancel_order(
        &self,
        pair: &TradingPair,
        exchange_order_id: ExchangeOrderId,
    ) -> Result<()>;

    /// Cancel every open order, optionally limited to one pair
    async fn cancel_all(&self, pair: Option<&TradingPair>) -> Result<CancelAllResult>;

    async fn get_order(&self, exchange_order_id: ExchangeOrderId) -> Result<Order>;

    async fn get_open_orders(&self, pair: Option<&TradingPair>) -> Result<Vec<Order>>;

    async fn get_balance(&self) -> Result<Vec<Balance>>;

    async fn get_positions(&self) -> Result<Vec<Position>>;

    /// Account-level margin summary
    async fn get_account(&self) -> Result<Account>;

    /// Set leverage for a pair (cross or isolated margin)
    async fn update_leverage(&self, pair: &TradingPair, leverage: u32, cross: bool) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_ack_exposes_id() {
        let resting = OrderAck::Resting {
            exchange_order_id: 12345,
        };
        assert_eq!(resting.exchange_order_id(), 12345);

        let filled = OrderAck::Filled {
            exchange_order_id: 12346,
            filled_quantity: "0.01".parse().unwrap(),
            avg_fill_price: "50100".parse().unwrap(),
        };
        assert_eq!(filled.exchange_order_id(), 12346);
    }

    #[test]
    fn test_cancel_all_aggregate_semantics() {
        // Partial failure is a success with per-order detail
        let partial = CancelAllResult {
            cancelled: 2,
            failures: vec![(7, "already filled".to_string())],
        };
        assert!(partial.into_result().is_ok());

        // Everything failing fails the aggregate
        let total = CancelAllResult {
            cancelled: 0,
            failures: vec![(7, "already filled".to_string())],
        };
        assert!(total.into_result().is_err());

        // Nothing to cancel is a success
        let empty = CancelAllResult::default();
        assert_eq!(empty.into_result().unwrap().cancelled, 0);
    }
}
