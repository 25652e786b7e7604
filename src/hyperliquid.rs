//! Hyperliquid connector
//!
//! Concrete [`Connector`] implementation speaking the venue's protocol:
//! unauthenticated reads over `POST /info`, EIP-712-signed actions over
//! `POST /exchange`, and WebSocket market/user data demultiplexed into
//! unified engine events.
//!
//! Two addressing rules run through everything here. Read queries are always
//! keyed by the master account address. Action signatures always recover to
//! the API wallet address. Mixing the two is the venue's most common
//! integration failure ("User or API Wallet does not exist").

use crate::actions::{
    AllMids, AssetInfo, CancelAction, CancelResponseStatus, ClearinghouseState, ExchangeAction,
    ExchangeRequest, ExchangeResponseData, ExchangeResponsePayload, InfoRequest, L2BookSnapshot,
    Meta, OpenOrderInfo, OrderAction, OrderKind, OrderResponseStatus, OrderStatusResponse,
    UserFillInfo, WireLevel,
};
use crate::auth::ActionSigner;
use crate::book::BookManager;
use crate::config::ExchangeConfig;
use crate::connector::{
    CancelAllResult, Connector, OrderAck, OrderUpdateEvent, StreamEvent,
};
use crate::decimal::Decimal;
use crate::errors::{HyperfillError, Result};
use crate::transport::HttpTransport;
use crate::types::{
    Account, Balance, Candle, ExchangeOrderId, Fill, MasterAddress, Order, OrderRequest,
    OrderStatus, OrderType, Orderbook, OrderbookLevel, Position, PositionSide, Side, Ticker,
    TimeInForce, TradingPair,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

#[cfg(feature = "stream")]
use crate::stream::{WsClient, WsMessage, WsUserEvent};

/// Quote asset for every perpetual on the venue
const QUOTE_ASSET: &str = "USDC";

/// Maximum decimal places a perp price may carry, before subtracting the
/// asset's size decimals
const MAX_PRICE_DECIMALS: u32 = 6;

/// Price buffer applied to market orders, submitted as IOC limits
/// far through the touch
const MARKET_SLIPPAGE_BPS: i64 = 500;

/// Per-asset metadata derived from the universe
#[derive(Debug, Clone, Copy)]
struct AssetMeta {
    /// Index into the venue universe, the `a` field of every action
    index: u32,
    sz_decimals: u32,
}

impl AssetMeta {
    /// Smallest price increment the venue accepts for this asset
    fn tick_size(&self) -> Decimal {
        let price_decimals = MAX_PRICE_DECIMALS.saturating_sub(self.sz_decimals);
        Decimal::from_raw(10i128.pow(crate::decimal::SCALE - price_decimals))
    }

    /// Smallest size increment
    fn lot_size(&self) -> Decimal {
        Decimal::from_raw(10i128.pow(crate::decimal::SCALE - self.sz_decimals))
    }
}

/// Hyperliquid implementation of the connector interface
pub struct HyperliquidConnector {
    config: ExchangeConfig,
    transport: HttpTransport,
    /// Master account; required for any user-scoped read
    master: Option<MasterAddress>,
    /// API wallet signer; required for any action
    signer: Option<ActionSigner>,
    /// coin → asset metadata, loaded from the `meta` endpoint
    assets: RwLock<HashMap<String, AssetMeta>>,
    books: Arc<BookManager>,
    connected: AtomicBool,
}

impl HyperliquidConnector {
    pub fn new(config: ExchangeConfig) -> Result<Self> {
        let base_url = config.http_url().to_string();
        Self::with_base_url(config, base_url)
    }

    /// Construct against an explicit HTTP base URL (tests, proxies)
    pub fn with_base_url(config: ExchangeConfig, base_url: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(base_url, &config.http)?;
        let master = if config.api_key.is_empty() {
            None
        } else {
            Some(config.master_address()?)
        };
        let signer = config
            .secret_key
            .clone()
            .map(|key| ActionSigner::new(key, config.testnet));

        Ok(Self {
            config,
            transport,
            master,
            signer,
            assets: RwLock::new(HashMap::new()),
            books: Arc::new(BookManager::new()),
            connected: AtomicBool::new(false),
        })
    }

    /// The book registry this connector feeds from the WebSocket
    pub fn books(&self) -> Arc<BookManager> {
        self.books.clone()
    }

    /// A WebSocket client wired to this connector's venue and rate limiter
    #[cfg(feature = "stream")]
    pub fn market_stream(&self) -> WsClient {
        WsClient::new(
            self.config.ws_url(),
            self.config.websocket.clone(),
            self.transport.rate_limiter(),
        )
    }

    /// The master address used for read queries
    pub fn master_address(&self) -> Result<&MasterAddress> {
        self.master
            .as_ref()
            .ok_or_else(|| HyperfillError::config("api_key (master address) not configured"))
    }

    fn require_signer(&self) -> Result<&ActionSigner> {
        self.signer
            .as_ref()
            .ok_or_else(HyperfillError::signer_required)
    }

    /// `"BTC-USDC"` → `"BTC"`; only USDC-quoted perps exist on the venue
    fn coin_for_pair(&self, pair: &TradingPair) -> Result<String> {
        if pair.quote != QUOTE_ASSET {
            return Err(HyperfillError::invalid_pair(format!(
                "{pair}: venue lists only {QUOTE_ASSET}-quoted perpetuals"
            )));
        }
        Ok(pair.base.clone())
    }

    fn pair_for_coin(&self, coin: &str) -> TradingPair {
        TradingPair::new(coin, QUOTE_ASSET)
    }

    /// Asset metadata for a coin, fetching the universe on first use
    async fn asset_meta(&self, coin: &str) -> Result<AssetMeta> {
        if let Some(meta) = self
            .assets
            .read()
            .expect("asset lock poisoned")
            .get(coin)
            .copied()
        {
            return Ok(meta);
        }
        self.refresh_meta().await?;
        self.assets
            .read()
            .expect("asset lock poisoned")
            .get(coin)
            .copied()
            .ok_or_else(|| {
                HyperfillError::invalid_pair(format!("{coin} not listed in venue universe"))
            })
    }

    async fn refresh_meta(&self) -> Result<()> {
        let meta: Meta = self.transport.post_info(&InfoRequest::meta()).await?;
        let mut assets = HashMap::with_capacity(meta.universe.len());
        for (index, asset) in meta.universe.into_iter().enumerate() {
            let AssetInfo {
                name, sz_decimals, ..
            } = asset;
            assets.insert(
                name,
                AssetMeta {
                    index: index as u32,
                    sz_decimals,
                },
            );
        }
        info!(assets = assets.len(), "universe metadata loaded");
        *self.assets.write().expect("asset lock poisoned") = assets;
        Ok(())
    }

    /// Round an outbound price to the asset's tick, half away from zero
    fn round_price(&self, meta: AssetMeta, price: Decimal) -> Result<Decimal> {
        let rounded = price.round_to_tick(meta.tick_size())?;
        if rounded <= Decimal::ZERO {
            return Err(HyperfillError::invalid_tick_size(format!(
                "price {price} rounds to zero at tick {}",
                meta.tick_size()
            )));
        }
        Ok(rounded)
    }

    /// Truncate an outbound size to the asset's lot; zero after rounding is
    /// an error, not an order
    fn round_size(&self, meta: AssetMeta, size: Decimal) -> Result<Decimal> {
        let lot = meta.lot_size();
        let truncated = Decimal::from_raw(size.raw() - size.raw() % lot.raw());
        if truncated <= Decimal::ZERO {
            return Err(HyperfillError::invalid_format(format!(
                "size {size} rounds to zero at lot {lot}"
            )));
        }
        Ok(truncated)
    }

    /// Fetch the venue book and produce a protected far-through price for a
    /// market order
    async fn market_price(&self, coin: &str, side: Side, meta: AssetMeta) -> Result<Decimal> {
        let snapshot: L2BookSnapshot = self
            .transport
            .post_info(&InfoRequest::l2_book(coin))
            .await?;
        let [bids, asks] = &snapshot.levels;
        let reference = match side {
            Side::Buy => asks.first(),
            Side::Sell => bids.first(),
        }
        .map(|level| level.px)
        .ok_or_else(|| {
            HyperfillError::insufficient_liquidity(format!(
                "no {} liquidity for {coin}",
                side.opposite().as_str()
            ))
        })?;

        let buffer = Decimal::from_raw(
            Decimal::from_int(MARKET_SLIPPAGE_BPS).raw() / 10_000,
        );
        let factor = match side {
            Side::Buy => Decimal::ONE.try_add(buffer)?,
            Side::Sell => Decimal::ONE.try_sub(buffer)?,
        };
        self.round_price(meta, reference.try_mul(factor)?)
    }

    /// Sign and submit one exchange action
    async fn submit_action(&self, action: ExchangeAction) -> Result<ExchangeResponseData> {
        let signer = self.require_signer()?;
        let nonce = self.transport.next_nonce();
        let signature = signer.sign(&action, nonce)?;
        let request = ExchangeRequest {
            action,
            nonce,
            signature,
            vault_address: signer.vault_address().map(str::to_string),
        };
        let response = self.transport.post_exchange(&request).await?;
        match response.response {
            ExchangeResponsePayload::Error(message) => {
                // Top-level failure: the venue's reason verbatim
                Err(HyperfillError::order_rejected(message))
            }
            ExchangeResponsePayload::Data(data) => Ok(data),
        }
    }

    fn wire_levels_to_unified(levels: &[WireLevel]) -> Vec<OrderbookLevel> {
        levels
            .iter()
            .map(|level| OrderbookLevel {
                price: level.px,
                quantity: level.sz,
                order_count: level.n,
            })
            .collect()
    }

    /// Pull the venue book into the local registry and return the coin's
    /// unified snapshot
    async fn fetch_book(&self, coin: &str) -> Result<L2BookSnapshot> {
        let snapshot: L2BookSnapshot = self
            .transport
            .post_info(&InfoRequest::l2_book(coin))
            .await?;
        let [bids, asks] = &snapshot.levels;
        self.books.apply_snapshot(
            &snapshot.coin,
            Self::wire_levels_to_unified(bids),
            Self::wire_levels_to_unified(asks),
            snapshot.time,
        );
        Ok(snapshot)
    }

    fn open_order_to_unified(&self, info: &OpenOrderInfo) -> Order {
        let filled = info
            .orig_sz
            .try_sub(info.sz)
            .unwrap_or(Decimal::ZERO)
            .max(Decimal::ZERO);
        let status = if filled > Decimal::ZERO {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Open
        };
        let created = chrono::DateTime::from_timestamp_millis(info.timestamp as i64)
            .unwrap_or_else(Utc::now);
        Order {
            // Orders discovered from the venue carry a synthetic client id
            client_order_id: format!("hl-{}", info.oid),
            exchange_order_id: Some(info.oid),
            pair: self.pair_for_coin(&info.coin),
            side: if info.is_buy() { Side::Buy } else { Side::Sell },
            order_type: OrderType::Limit,
            price: Some(info.limit_px),
            quantity: info.orig_sz,
            filled_quantity: filled,
            avg_fill_price: None,
            status,
            tif: TimeInForce::Gtc,
            reduce_only: false,
            created_at: created,
            updated_at: Utc::now(),
            error_message: None,
        }
    }

    fn fill_to_unified(&self, fill: &UserFillInfo) -> Fill {
        Fill {
            trade_id: fill.tid,
            exchange_order_id: fill.oid,
            pair: self.pair_for_coin(&fill.coin),
            side: if fill.is_buy() { Side::Buy } else { Side::Sell },
            price: fill.px,
            size: fill.sz,
            fee: fill.fee,
            closed_pnl: Some(fill.closed_pnl),
            timestamp_ms: fill.time,
        }
    }

    /// Replace a resting order's price and size in place
    ///
    /// The replacement carries the same frozen action-field order as a fresh
    /// submission; only the wrapping `modify` action differs.
    pub async fn modify_order(
        &self,
        exchange_order_id: ExchangeOrderId,
        request: &OrderRequest,
    ) -> Result<()> {
        request.validate()?;
        let coin = self.coin_for_pair(&request.pair)?;
        let meta = self.asset_meta(&coin).await?;
        let price = request
            .price
            .ok_or_else(|| HyperfillError::invalid_format("modify requires a price"))?;
        let price = self.round_price(meta, price)?;
        let size = self.round_size(meta, request.quantity)?;

        let data = self
            .submit_action(ExchangeAction::modify(
                exchange_order_id,
                OrderAction {
                    asset: meta.index,
                    is_buy: request.side.is_buy(),
                    price,
                    size,
                    reduce_only: request.reduce_only,
                    kind: OrderKind::limit(request.tif.as_venue_str()),
                },
            ))
            .await?;
        match data {
            ExchangeResponseData::Modify { data } | ExchangeResponseData::Cancel { data } => {
                match data.statuses.into_iter().next() {
                    Some(CancelResponseStatus::Error { error }) => {
                        Err(HyperfillError::order_rejected(error))
                    }
                    _ => Ok(()),
                }
            }
            ExchangeResponseData::Default | ExchangeResponseData::Unknown => Ok(()),
            other => Err(HyperfillError::invalid_response(format!(
                "expected modify response, got {other:?}"
            ))),
        }
    }

    /// Historical fills for the master account, oldest first
    pub async fn get_user_fills(&self) -> Result<Vec<Fill>> {
        let master = self.master_address()?;
        let fills: Vec<UserFillInfo> = self
            .transport
            .post_info(&InfoRequest::user_fills(master))
            .await?;
        let mut fills: Vec<Fill> = fills.iter().map(|f| self.fill_to_unified(f)).collect();
        fills.sort_by_key(|f| f.timestamp_ms);
        Ok(fills)
    }

    async fn clearinghouse(&self) -> Result<ClearinghouseState> {
        let master = self.master_address()?;
        self.transport
            .post_info(&InfoRequest::clearinghouse_state(master))
            .await
    }

    /// Demultiplex one WebSocket message into unified engine events,
    /// applying book updates as a side effect
    #[cfg(feature = "stream")]
    pub fn process_ws_message(&self, message: WsMessage) -> Vec<StreamEvent> {
        match message {
            WsMessage::L2Book(snapshot) => {
                let [bids, asks] = &snapshot.levels;
                self.books.apply_snapshot(
                    &snapshot.coin,
                    Self::wire_levels_to_unified(bids),
                    Self::wire_levels_to_unified(asks),
                    snapshot.time,
                );
                vec![StreamEvent::BookUpdated(self.pair_for_coin(&snapshot.coin))]
            }
            WsMessage::AllMids(data) => {
                let mids = data
                    .mids
                    .into_iter()
                    .map(|(coin, mid)| (self.pair_for_coin(&coin), mid))
                    .collect();
                vec![StreamEvent::MidPrices(mids)]
            }
            WsMessage::OrderUpdates(updates) => updates
                .iter()
                .filter_map(|update| {
                    let status = match map_venue_order_status(&update.status) {
                        Some(status) => status,
                        None => {
                            warn!(status = %update.status, oid = update.order.oid,
                                "unknown order status ignored");
                            return None;
                        }
                    };
                    Some(StreamEvent::OrderUpdate(OrderUpdateEvent {
                        exchange_order_id: update.order.oid,
                        pair: self.pair_for_coin(&update.order.coin),
                        status,
                        timestamp_ms: update.status_timestamp,
                    }))
                })
                .collect(),
            WsMessage::UserFills(batch) => batch
                .fills
                .iter()
                .map(|fill| StreamEvent::Fill(self.fill_to_unified(fill)))
                .collect(),
            WsMessage::UserEvents(WsUserEvent::Fills { fills }) => fills
                .iter()
                .map(|fill| StreamEvent::Fill(self.fill_to_unified(fill)))
                .collect(),
            WsMessage::Error(message) => {
                warn!(%message, "venue reported stream error");
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

/// Map the venue's order status strings onto the unified state machine
fn map_venue_order_status(status: &str) -> Option<OrderStatus> {
    match status {
        "open" => Some(OrderStatus::Open),
        "filled" => Some(OrderStatus::Filled),
        "canceled" | "marginCanceled" => Some(OrderStatus::Cancelled),
        "rejected" => Some(OrderStatus::Rejected),
        _ => None,
    }
}

#[async_trait]
impl Connector for HyperliquidConnector {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn connect(&self) -> Result<()> {
        self.refresh_meta().await?;
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
        let coin = self.coin_for_pair(pair)?;
        let snapshot = self.fetch_book(&coin).await?;
        let [bids, asks] = &snapshot.levels;
        let mids: AllMids = self.transport.post_info(&InfoRequest::all_mids()).await?;
        Ok(Ticker {
            pair: pair.clone(),
            bid: bids.first().map(|level| level.px),
            ask: asks.first().map(|level| level.px),
            last: mids.get(&coin).copied(),
            volume_24h: None,
            timestamp_ms: snapshot.time,
        })
    }

    async fn get_orderbook(&self, pair: &TradingPair, depth: Option<usize>) -> Result<Orderbook> {
        let coin = self.coin_for_pair(pair)?;
        self.fetch_book(&coin).await?;
        let book = self.books.get(&coin).ok_or_else(|| {
            HyperfillError::invariant(format!("book for {coin} vanished after snapshot"))
        })?;
        Ok(book.to_orderbook(pair.clone(), depth))
    }

    async fn get_all_mids(&self) -> Result<HashMap<TradingPair, Decimal>> {
        let mids: AllMids = self.transport.post_info(&InfoRequest::all_mids()).await?;
        Ok(mids
            .into_iter()
            .filter(|(coin, _)| !coin.starts_with('@'))
            .map(|(coin, mid)| (self.pair_for_coin(&coin), mid))
            .collect())
    }

    async fn get_candles(
        &self,
        pair: &TradingPair,
        interval: &str,
        start_time_ms: u64,
        end_time_ms: u64,
    ) -> Result<Vec<Candle>> {
        let coin = self.coin_for_pair(pair)?;
        let rows: Vec<crate::actions::CandleData> = self
            .transport
            .post_info(&InfoRequest::candle_snapshot(
                &coin,
                interval,
                start_time_ms,
                end_time_ms,
            ))
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Candle {
                pair: pair.clone(),
                interval: row.i,
                open_time_ms: row.t,
                close_time_ms: row.close_time,
                open: row.o,
                high: row.h,
                low: row.l,
                close: row.c,
                volume: row.v,
                trade_count: row.n,
            })
            .collect())
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        request.validate()?;
        let coin = self.coin_for_pair(&request.pair)?;
        let meta = self.asset_meta(&coin).await?;

        let (price, tif) = match request.order_type {
            OrderType::Limit => {
                let price = request.price.ok_or_else(|| {
                    HyperfillError::invalid_format("limit order requires a price")
                })?;
                (self.round_price(meta, price)?, request.tif)
            }
            // Market: IOC limit far through the touch
            OrderType::Market => (
                self.market_price(&coin, request.side, meta).await?,
                TimeInForce::Ioc,
            ),
        };
        let size = self.round_size(meta, request.quantity)?;

        debug!(%coin, side = request.side.as_str(), %price, %size, "submitting order");
        let action = ExchangeAction::order(vec![OrderAction {
            asset: meta.index,
            is_buy: request.side.is_buy(),
            price,
            size,
            reduce_only: request.reduce_only,
            kind: OrderKind::limit(tif.as_venue_str()),
        }]);

        let data = self.submit_action(action).await?;
        let statuses = match data {
            ExchangeResponseData::Order { data } => data.statuses,
            other => {
                return Err(HyperfillError::invalid_order_response(format!(
                    "expected order response, got {other:?}"
                )))
            }
        };
        match statuses.into_iter().next() {
            Some(OrderResponseStatus::Resting { resting }) => Ok(OrderAck::Resting {
                exchange_order_id: resting.oid,
            }),
            Some(OrderResponseStatus::Filled { filled }) => Ok(OrderAck::Filled {
                exchange_order_id: filled.oid,
                filled_quantity: filled.total_sz,
                avg_fill_price: filled.avg_px,
            }),
            Some(OrderResponseStatus::Error { error }) => {
                Err(HyperfillError::order_rejected(error))
            }
            None => Err(HyperfillError::invalid_order_response(
                "order response carried no statuses",
            )),
        }
    }

    async fn cancel_order(
        &self,
        pair: &TradingPair,
        exchange_order_id: ExchangeOrderId,
    ) -> Result<()> {
        let coin = self.coin_for_pair(pair)?;
        let meta = self.asset_meta(&coin).await?;
        let data = self
            .submit_action(ExchangeAction::cancel(vec![CancelAction {
                asset: meta.index,
                oid: exchange_order_id,
            }]))
            .await?;
        let statuses = match data {
            ExchangeResponseData::Cancel { data } => data.statuses,
            other => {
                return Err(HyperfillError::invalid_response(format!(
                    "expected cancel response, got {other:?}"
                )))
            }
        };
        match statuses.into_iter().next() {
            Some(CancelResponseStatus::Success(_)) => Ok(()),
            Some(CancelResponseStatus::Error { error }) => {
                // The venue folds "unknown, already canceled, or filled"
                // into one message
                Err(HyperfillError::order_not_cancellable(error))
            }
            None => Err(HyperfillError::invalid_response(
                "cancel response carried no statuses",
            )),
        }
    }

    async fn cancel_all(&self, pair: Option<&TradingPair>) -> Result<CancelAllResult> {
        let open = self.get_open_orders(pair).await?;
        if open.is_empty() {
            return Ok(CancelAllResult::default());
        }

        let mut cancels = Vec::with_capacity(open.len());
        let mut oids = Vec::with_capacity(open.len());
        for order in &open {
            let coin = self.coin_for_pair(&order.pair)?;
            let meta = self.asset_meta(&coin).await?;
            let oid = order.exchange_order_id.ok_or_else(|| {
                HyperfillError::invariant("venue reported an open order without an oid")
            })?;
            cancels.push(CancelAction {
                asset: meta.index,
                oid,
            });
            oids.push(oid);
        }

        let data = match self.submit_action(ExchangeAction::cancel(cancels)).await {
            Ok(data) => data,
            Err(err @ HyperfillError::Business { .. }) => return Err(err),
            Err(err) => {
                // Batch endpoint unavailable; fall back to per-order cancels
                warn!(error = %err, "batch cancel failed, falling back to per-order cancels");
                let mut result = CancelAllResult::default();
                for order in &open {
                    let Some(oid) = order.exchange_order_id else {
                        continue;
                    };
                    match self.cancel_order(&order.pair, oid).await {
                        Ok(()) => result.cancelled += 1,
                        Err(e) => result.failures.push((oid, e.to_string())),
                    }
                }
                return result.into_result();
            }
        };
        let statuses = match data {
            ExchangeResponseData::Cancel { data } => data.statuses,
            other => {
                return Err(HyperfillError::invalid_response(format!(
                    "expected cancel response, got {other:?}"
                )))
            }
        };

        let mut result = CancelAllResult::default();
        for (oid, status) in oids.into_iter().zip(statuses) {
            match status {
                CancelResponseStatus::Success(_) => result.cancelled += 1,
                CancelResponseStatus::Error { error } => result.failures.push((oid, error)),
            }
        }
        result.into_result()
    }

    async fn get_order(&self, exchange_order_id: ExchangeOrderId) -> Result<Order> {
        let master = self.master_address()?;
        let response: OrderStatusResponse = self
            .transport
            .post_info(&InfoRequest::order_status(master, exchange_order_id))
            .await?;
        let info = response.order.ok_or_else(|| {
            HyperfillError::order_not_found(format!("oid {exchange_order_id} unknown to venue"))
        })?;
        let mut order = self.open_order_to_unified(&info.order);
        if let Some(status) = map_venue_order_status(&info.status) {
            order.status = status;
            if status == OrderStatus::Filled {
                order.filled_quantity = order.quantity;
            }
        }
        Ok(order)
    }

    async fn get_open_orders(&self, pair: Option<&TradingPair>) -> Result<Vec<Order>> {
        let master = self.master_address()?;
        let infos: Vec<OpenOrderInfo> = self
            .transport
            .post_info(&InfoRequest::open_orders(master))
            .await?;
        let wanted_coin = match pair {
            Some(pair) => Some(self.coin_for_pair(pair)?),
            None => None,
        };
        Ok(infos
            .iter()
            .filter(|info| {
                wanted_coin
                    .as_deref()
                    .map_or(true, |coin| info.coin == coin)
            })
            .map(|info| self.open_order_to_unified(info))
            .collect())
    }

    async fn get_balance(&self) -> Result<Vec<Balance>> {
        let state = self.clearinghouse().await?;
        let summary = state
            .cross_margin_summary
            .or(state.margin_summary)
            .ok_or_else(|| {
                HyperfillError::invalid_response("clearinghouse state missing margin summary")
            })?;
        let total = summary.account_value;
        let available = state.withdrawable.unwrap_or(Decimal::ZERO);
        Ok(vec![Balance {
            asset: QUOTE_ASSET.to_string(),
            total,
            available,
            locked: total.try_sub(available).unwrap_or(Decimal::ZERO),
        }])
    }

    async fn get_positions(&self) -> Result<Vec<Position>> {
        let state = self.clearinghouse().await?;
        let now = Utc::now();
        Ok(state
            .asset_positions
            .iter()
            .filter(|ap| !ap.position.szi.is_zero())
            .map(|ap| {
                let data = &ap.position;
                let side = if data.szi.is_sign_negative() {
                    PositionSide::Short
                } else {
                    PositionSide::Long
                };
                Position {
                    pair: self.pair_for_coin(&data.coin),
                    side,
                    size: data.szi.abs(),
                    entry_price: data.entry_px.unwrap_or(Decimal::ZERO),
                    mark_price: None,
                    liquidation_price: data.liquidation_px,
                    leverage: data.leverage.as_ref().map_or(1, |l| l.value),
                    margin_used: data.margin_used,
                    unrealized_pnl: data.unrealized_pnl,
                    realized_pnl_cumulative: Decimal::ZERO,
                    return_on_equity: Some(data.return_on_equity),
                    opened_at: now,
                    updated_at: now,
                }
            })
            .collect())
    }

    async fn get_account(&self) -> Result<Account> {
        let state = self.clearinghouse().await?;
        let unrealized = state
            .asset_positions
            .iter()
            .map(|ap| ap.position.unrealized_pnl)
            .try_fold(Decimal::ZERO, |acc, pnl| acc.try_add(pnl))?;
        let summary = state
            .cross_margin_summary
            .or(state.margin_summary)
            .ok_or_else(|| {
                HyperfillError::invalid_response("clearinghouse state missing margin summary")
            })?;
        let available = state.withdrawable.unwrap_or(Decimal::ZERO);
        Ok(Account {
            total_balance: summary.account_value,
            available_balance: available,
            margin_used: summary.total_margin_used,
            account_value: summary.account_value,
            total_unrealized_pnl: unrealized,
            total_realized_pnl: Decimal::ZERO,
        })
    }

    async fn update_leverage(&self, pair: &TradingPair, leverage: u32, cross: bool) -> Result<()> {
        let coin = self.coin_for_pair(pair)?;
        let meta = self.asset_meta(&coin).await?;
        self.submit_action(ExchangeAction::update_leverage(meta.index, cross, leverage))
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for HyperliquidConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperliquidConnector")
            .field("name", &self.config.name)
            .field("testnet", &self.config.testnet)
            .field("connected", &self.is_connected())
            .finish()
    }
}
