//! Order lifecycle management
//!
//! The order manager owns the authoritative order state behind a dual-indexed
//! store: client order ids are allocated before submission and stay stable
//! for the caller, exchange order ids attach on first acceptance. WebSocket
//! order updates and fills drive status forward; terminal orders move to an
//! append-only history log.
//!
//! All store mutation happens under one mutex. Connector I/O and event
//! dispatch always happen outside it.

use crate::connector::{Connector, OrderAck, OrderUpdateEvent};
use crate::decimal::Decimal;
use crate::errors::{HyperfillError, Result};
use crate::types::{
    ClientOrderId, ExchangeOrderId, Fill, Order, OrderRequest, OrderStatus, TradingPair,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Order state change pushed to subscribers
///
/// Every variant carries a detached snapshot of the order after the change.
#[derive(Debug, Clone)]
pub enum OrderEvent {
    Submitted(Order),
    /// Resting on the venue book
    Accepted(Order),
    /// Partial execution
    Fill { order: Order, fill: Fill },
    Filled(Order),
    Cancelled(Order),
    Rejected(Order),
    Expired(Order),
}

#[derive(Debug, Default)]
struct OrderStore {
    /// The single authoritative copy of every live and pending order
    by_client_id: HashMap<ClientOrderId, Order>,
    /// Exchange id → client id, populated on first acceptance
    by_exchange_id: HashMap<ExchangeOrderId, ClientOrderId>,
    /// Non-terminal orders in submission order
    open: Vec<ClientOrderId>,
    /// Append-only log of terminal orders
    history: Vec<Order>,
    /// Trade ids already applied, so replayed fills cannot double-count
    seen_fills: HashSet<u64>,
}

impl OrderStore {
    fn insert_new(&mut self, order: Order) {
        self.open.push(order.client_order_id.clone());
        self.by_client_id
            .insert(order.client_order_id.clone(), order);
    }

    fn index_exchange_id(&mut self, client_id: &str, exchange_order_id: ExchangeOrderId) {
        self.by_exchange_id
            .insert(exchange_order_id, client_id.to_string());
    }

    /// Move a terminal order out of the live set into history
    fn retire(&mut self, client_id: &str) {
        if let Some(order) = self.by_client_id.remove(client_id) {
            debug_assert!(order.status.is_terminal());
            if let Some(oid) = order.exchange_order_id {
                self.by_exchange_id.remove(&oid);
            }
            self.open.retain(|id| id != client_id);
            self.history.push(order);
        }
    }

    fn client_id_for_exchange_id(&self, exchange_order_id: ExchangeOrderId) -> Option<String> {
        self.by_exchange_id.get(&exchange_order_id).cloned()
    }
}

/// Order manager: submission, cancellation, and event-driven status tracking
pub struct OrderManager {
    connector: Arc<dyn Connector>,
    store: Mutex<OrderStore>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<OrderEvent>>>,
}

impl OrderManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            store: Mutex::new(OrderStore::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Receive every subsequent order event
    pub fn subscribe_events(&self) -> mpsc::UnboundedReceiver<OrderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .push(tx);
        rx
    }

    /// Dispatch outside the store lock; closed receivers drop out
    fn emit(&self, events: Vec<OrderEvent>) {
        if events.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        subscribers.retain(|tx| events.iter().all(|event| tx.send(event.clone()).is_ok()));
    }

    /// Submit an order and track it through its lifetime
    ///
    /// The order is never silently lost: a network failure leaves it in
    /// `Pending` with the error recorded, for `reconcile` to resolve.
    pub async fn submit(&self, mut request: OrderRequest) -> Result<Order> {
        request.validate()?;
        let client_id = request
            .client_order_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        request.client_order_id = Some(client_id.clone());

        // Duplicate submission under the same client id returns the
        // existing order rather than double-submitting
        {
            let store = self.store.lock().expect("order store lock poisoned");
            if let Some(existing) = store.by_client_id.get(&client_id) {
                info!(%client_id, "duplicate submission returned existing order");
                return Ok(existing.clone());
            }
        }

        let now = Utc::now();
        let order = Order {
            client_order_id: client_id.clone(),
            exchange_order_id: None,
            pair: request.pair.clone(),
            side: request.side,
            order_type: request.order_type,
            price: request.price,
            quantity: request.quantity,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: None,
            status: OrderStatus::Pending,
            tif: request.tif,
            reduce_only: request.reduce_only,
            created_at: now,
            updated_at: now,
            error_message: None,
        };
        {
            let mut store = self.store.lock().expect("order store lock poisoned");
            store.insert_new(order.clone());
        }
        self.emit(vec![OrderEvent::Submitted(order)]);

        // I/O strictly outside the lock
        let ack = self.connector.create_order(&request).await;

        let (snapshot, events) = {
            let mut store = self.store.lock().expect("order store lock poisoned");
            let order = store
                .by_client_id
                .get_mut(&client_id)
                .ok_or_else(|| HyperfillError::invariant("submitted order vanished from store"))?;
            order.updated_at = Utc::now();

            match ack {
                Ok(OrderAck::Resting { exchange_order_id }) => {
                    order.exchange_order_id = Some(exchange_order_id);
                    order.status = OrderStatus::Open;
                    let snapshot = order.clone();
                    store.index_exchange_id(&client_id, exchange_order_id);
                    (snapshot.clone(), vec![OrderEvent::Accepted(snapshot)])
                }
                Ok(OrderAck::Filled {
                    exchange_order_id,
                    filled_quantity,
                    avg_fill_price,
                }) => {
                    order.exchange_order_id = Some(exchange_order_id);
                    order.filled_quantity = filled_quantity;
                    order.avg_fill_price = Some(avg_fill_price);
                    order.status = OrderStatus::Filled;
                    let snapshot = order.clone();
                    store.retire(&client_id);
                    (snapshot.clone(), vec![OrderEvent::Filled(snapshot)])
                }
                Err(err) if err.is_ambiguous() => {
                    // The action may have executed; keep the order pending
                    // for reconciliation instead of inventing an outcome
                    order.error_message = Some(err.to_string());
                    warn!(%client_id, error = %err, "submission ambiguous, order kept pending");
                    drop(store);
                    return Err(err);
                }
                Err(err) => {
                    order.status = OrderStatus::Rejected;
                    order.error_message = Some(err.to_string());
                    let snapshot = order.clone();
                    store.retire(&client_id);
                    drop(store);
                    self.emit(vec![OrderEvent::Rejected(snapshot)]);
                    return Err(err);
                }
            }
        };
        self.emit(events);
        Ok(snapshot)
    }

    /// Cancel by client order id
    ///
    /// Cancelling an already-terminal order returns `OrderNotCancellable`;
    /// callers treat that as informational, not fatal.
    pub async fn cancel(&self, client_order_id: &str) -> Result<()> {
        let (pair, exchange_order_id) = {
            let store = self.store.lock().expect("order store lock poisoned");
            match store.by_client_id.get(client_order_id) {
                Some(order) => {
                    if order.status.is_terminal() {
                        return Err(HyperfillError::order_not_cancellable(format!(
                            "{client_order_id} is already {:?}",
                            order.status
                        )));
                    }
                    match order.exchange_order_id {
                        Some(oid) => (order.pair.clone(), oid),
                        None => {
                            return Err(HyperfillError::order_not_cancellable(format!(
                                "{client_order_id} has no exchange id yet"
                            )))
                        }
                    }
                }
                None => {
                    return Err(HyperfillError::order_not_found(format!(
                        "unknown order {client_order_id}"
                    )))
                }
            }
        };

        self.connector.cancel_order(&pair, exchange_order_id).await?;

        let snapshot = {
            let mut store = self.store.lock().expect("order store lock poisoned");
            let order = store.by_client_id.get_mut(client_order_id);
            match order {
                Some(order) if !order.status.is_terminal() => {
                    order.status = OrderStatus::Cancelled;
                    order.updated_at = Utc::now();
                    let snapshot = order.clone();
                    store.retire(client_order_id);
                    Some(snapshot)
                }
                _ => None,
            }
        };
        if let Some(snapshot) = snapshot {
            self.emit(vec![OrderEvent::Cancelled(snapshot)]);
        }
        Ok(())
    }

    /// Cancel all open orders, optionally limited to one pair; returns the
    /// number cancelled
    pub async fn cancel_all(&self, pair: Option<&TradingPair>) -> Result<usize> {
        let result = self.connector.cancel_all(pair).await?;
        let failed: HashSet<ExchangeOrderId> =
            result.failures.iter().map(|(oid, _)| *oid).collect();

        let (snapshots, count) = {
            let mut store = self.store.lock().expect("order store lock poisoned");
            let cancelled: Vec<ClientOrderId> = store
                .open
                .iter()
                .filter(|client_id| {
                    store.by_client_id.get(*client_id).is_some_and(|order| {
                        let pair_matches =
                            pair.is_none_or(|wanted| order.pair == *wanted);
                        let oid_cancelled = order
                            .exchange_order_id
                            .is_some_and(|oid| !failed.contains(&oid));
                        pair_matches && oid_cancelled
                    })
                })
                .cloned()
                .collect();

            let mut snapshots = Vec::with_capacity(cancelled.len());
            for client_id in &cancelled {
                if let Some(order) = store.by_client_id.get_mut(client_id) {
                    order.status = OrderStatus::Cancelled;
                    order.updated_at = Utc::now();
                    snapshots.push(order.clone());
                }
                store.retire(client_id);
            }
            (snapshots, result.cancelled)
        };
        self.emit(snapshots.into_iter().map(OrderEvent::Cancelled).collect());
        Ok(count)
    }

    /// Read-only lookup by client id, or by exchange id when the argument
    /// parses as one
    pub fn get(&self, id: &str) -> Option<Order> {
        let store = self.store.lock().expect("order store lock poisoned");
        if let Some(order) = store.by_client_id.get(id) {
            return Some(order.clone());
        }
        let exchange_id: ExchangeOrderId = id.parse().ok()?;
        let client_id = store.client_id_for_exchange_id(exchange_id)?;
        store.by_client_id.get(&client_id).cloned()
    }

    pub fn get_by_exchange_id(&self, exchange_order_id: ExchangeOrderId) -> Option<Order> {
        let store = self.store.lock().expect("order store lock poisoned");
        let client_id = store.client_id_for_exchange_id(exchange_order_id)?;
        store.by_client_id.get(&client_id).cloned()
    }

    /// Snapshots of every non-terminal order, in submission order
    pub fn open_orders(&self) -> Vec<Order> {
        let store = self.store.lock().expect("order store lock poisoned");
        store
            .open
            .iter()
            .filter_map(|client_id| store.by_client_id.get(client_id))
            .cloned()
            .collect()
    }

    /// Snapshots of the terminal-order log, oldest first
    pub fn history(&self) -> Vec<Order> {
        let store = self.store.lock().expect("order store lock poisoned");
        store.history.clone()
    }

    /// Apply an order status pushed over the user stream
    ///
    /// Updates for unknown exchange ids are logged and ignored; they are
    /// expected during reconnect when channels race.
    pub fn on_order_update(&self, update: &OrderUpdateEvent) {
        let snapshot = {
            let mut store = self.store.lock().expect("order store lock poisoned");
            let Some(client_id) = store.client_id_for_exchange_id(update.exchange_order_id)
            else {
                debug!(
                    oid = update.exchange_order_id,
                    status = ?update.status,
                    "order update for unknown exchange id ignored"
                );
                return;
            };
            let Some(order) = store.by_client_id.get_mut(&client_id) else {
                return;
            };
            if order.status.is_terminal() {
                return;
            }
            order.status = update.status;
            order.updated_at = Utc::now();
            if update.status == OrderStatus::Filled {
                order.filled_quantity = order.quantity;
            }
            let snapshot = order.clone();
            if update.status.is_terminal() {
                store.retire(&client_id);
            }
            snapshot
        };

        let event = match snapshot.status {
            OrderStatus::Filled => OrderEvent::Filled(snapshot),
            OrderStatus::Cancelled => OrderEvent::Cancelled(snapshot),
            OrderStatus::Rejected => OrderEvent::Rejected(snapshot),
            OrderStatus::Expired => OrderEvent::Expired(snapshot),
            _ => OrderEvent::Accepted(snapshot),
        };
        self.emit(vec![event]);
    }

    /// Apply one execution pushed over the user stream
    ///
    /// Duplicate trade ids (snapshot replay after reconnect) are dropped.
    /// Fills for unknown orders are ignored here; the position tracker
    /// still receives them from the stream router.
    pub fn on_user_fill(&self, fill: &Fill) {
        let (snapshot, completed) = {
            let mut store = self.store.lock().expect("order store lock poisoned");
            if !store.seen_fills.insert(fill.trade_id) {
                debug!(tid = fill.trade_id, "duplicate fill dropped");
                return;
            }
            let Some(client_id) = store.client_id_for_exchange_id(fill.exchange_order_id) else {
                debug!(
                    oid = fill.exchange_order_id,
                    tid = fill.trade_id,
                    "fill for unknown exchange id ignored"
                );
                return;
            };
            let Some(order) = store.by_client_id.get_mut(&client_id) else {
                return;
            };

            let new_filled = match order.filled_quantity.try_add(fill.size) {
                Ok(total) if total <= order.quantity => total,
                _ => {
                    warn!(
                        %client_id,
                        tid = fill.trade_id,
                        "fill would exceed order quantity, ignored"
                    );
                    return;
                }
            };
            // Size-weighted mean across all fills
            order.avg_fill_price = weighted_avg(
                order.avg_fill_price,
                order.filled_quantity,
                fill.price,
                fill.size,
            );
            order.filled_quantity = new_filled;
            order.updated_at = Utc::now();

            let completed = order.filled_quantity == order.quantity;
            order.status = if completed {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
            let snapshot = order.clone();
            if completed {
                store.retire(&client_id);
            }
            (snapshot, completed)
        };

        let mut events = vec![OrderEvent::Fill {
            order: snapshot.clone(),
            fill: fill.clone(),
        }];
        if completed {
            events.push(OrderEvent::Filled(snapshot));
        }
        self.emit(events);
    }

    /// Resolve submission ambiguity after a reconnect
    ///
    /// Orders the venue still reports open are refreshed. Tracked open
    /// orders the venue no longer lists are fetched individually and
    /// retired with their true terminal status. Pending orders that never
    /// obtained an exchange id are expired.
    pub async fn reconcile(&self) -> Result<usize> {
        let venue_orders = self.connector.get_open_orders(None).await?;
        let venue_oids: HashSet<ExchangeOrderId> = venue_orders
            .iter()
            .filter_map(|order| order.exchange_order_id)
            .collect();

        // Collect candidates under the lock, resolve over I/O outside it
        let (missing, stuck_pending) = {
            let store = self.store.lock().expect("order store lock poisoned");
            let mut missing = Vec::new();
            let mut stuck = Vec::new();
            for client_id in &store.open {
                let Some(order) = store.by_client_id.get(client_id) else {
                    continue;
                };
                match order.exchange_order_id {
                    Some(oid) if !venue_oids.contains(&oid) => {
                        missing.push((client_id.clone(), oid));
                    }
                    None if order.status == OrderStatus::Pending
                        && order.error_message.is_some() =>
                    {
                        stuck.push(client_id.clone());
                    }
                    _ => {}
                }
            }
            (missing, stuck)
        };

        let mut transitions = 0;
        let mut events = Vec::new();

        for (client_id, oid) in missing {
            let status = match self.connector.get_order(oid).await {
                Ok(order) if order.status.is_terminal() => order.status,
                Ok(_) => continue,
                Err(_) => OrderStatus::Cancelled,
            };
            let mut store = self.store.lock().expect("order store lock poisoned");
            if let Some(order) = store.by_client_id.get_mut(&client_id) {
                order.status = status;
                order.updated_at = Utc::now();
                if status == OrderStatus::Filled {
                    order.filled_quantity = order.quantity;
                }
                let snapshot = order.clone();
                store.retire(&client_id);
                transitions += 1;
                events.push(match status {
                    OrderStatus::Filled => OrderEvent::Filled(snapshot),
                    _ => OrderEvent::Cancelled(snapshot),
                });
            }
        }

        {
            let mut store = self.store.lock().expect("order store lock poisoned");
            for client_id in stuck_pending {
                if let Some(order) = store.by_client_id.get_mut(&client_id) {
                    order.status = OrderStatus::Expired;
                    order.updated_at = Utc::now();
                    let snapshot = order.clone();
                    store.retire(&client_id);
                    transitions += 1;
                    events.push(OrderEvent::Expired(snapshot));
                }
            }
        }

        if transitions > 0 {
            info!(transitions, "reconciliation applied");
        }
        self.emit(events);
        Ok(transitions)
    }
}

fn weighted_avg(
    old_avg: Option<Decimal>,
    old_qty: Decimal,
    price: Decimal,
    size: Decimal,
) -> Option<Decimal> {
    let old_avg = old_avg.unwrap_or(Decimal::ZERO);
    let total = old_qty.try_add(size).ok()?;
    if total.is_zero() {
        return None;
    }
    let notional = old_avg
        .try_mul(old_qty)
        .ok()?
        .try_add(price.try_mul(size).ok()?)
        .ok()?;
    notional.try_div(total).ok()
}

impl std::fmt::Debug for OrderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.store.lock().expect("order store lock poisoned");
        f.debug_struct("OrderManager")
            .field("open", &store.open.len())
            .field("history", &store.history.len())
            .finish()
    }
}
