//! WebSocket streaming for Hyperliquid market and user data
//!
//! The client keeps the subscription set as the authoritative source of
//! truth: reconnection replays every subscription, so downstream state
//! (order books, order manager, position tracker) is rebuilt from the fresh
//! snapshots the venue sends after each subscribe.
//!
//! Subscriptions are keyed by their structural identity (channel, coin,
//! user, interval) rather than serialized JSON, so the same logical
//! subscription can never be duplicated by formatting differences.

use crate::actions::{CandleData, L2BookSnapshot, UserFillInfo};
use crate::config::WsConfig;
use crate::decimal::Decimal;
use crate::errors::{HyperfillError, Result};
use crate::types::MasterAddress;
use crate::utils::rate_limit::TokenBucket;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One WebSocket data feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Subscription {
    AllMids,
    L2Book {
        coin: String,
        #[serde(rename = "nSigFigs", skip_serializing_if = "Option::is_none")]
        n_sig_figs: Option<u32>,
    },
    Trades {
        coin: String,
    },
    Candle {
        coin: String,
        interval: String,
    },
    OrderUpdates {
        user: String,
    },
    UserFills {
        user: String,
    },
    UserEvents {
        user: String,
    },
    ClearinghouseState {
        user: String,
    },
}

impl Subscription {
    pub fn l2_book(coin: impl Into<String>) -> Self {
        Self::L2Book {
            coin: coin.into(),
            n_sig_figs: None,
        }
    }

    pub fn trades(coin: impl Into<String>) -> Self {
        Self::Trades { coin: coin.into() }
    }

    pub fn candle(coin: impl Into<String>, interval: impl Into<String>) -> Self {
        Self::Candle {
            coin: coin.into(),
            interval: interval.into(),
        }
    }

    /// User channels take the master address; the signer address subscribes
    /// to an account that does not exist
    pub fn order_updates(user: &MasterAddress) -> Self {
        Self::OrderUpdates {
            user: user.to_hex(),
        }
    }

    pub fn user_fills(user: &MasterAddress) -> Self {
        Self::UserFills {
            user: user.to_hex(),
        }
    }

    pub fn user_events(user: &MasterAddress) -> Self {
        Self::UserEvents {
            user: user.to_hex(),
        }
    }

    pub fn clearinghouse_state(user: &MasterAddress) -> Self {
        Self::ClearinghouseState {
            user: user.to_hex(),
        }
    }
}

/// Outbound control frame
#[derive(Debug, Serialize)]
#[serde(tag = "method", rename_all = "lowercase")]
enum WsRequest<'a> {
    Subscribe { subscription: &'a Subscription },
    Unsubscribe { subscription: &'a Subscription },
    Ping,
}

/// All mid prices push
#[derive(Debug, Clone, Deserialize)]
pub struct AllMidsData {
    pub mids: HashMap<String, Decimal>,
}

/// One public trade
#[derive(Debug, Clone, Deserialize)]
pub struct WsTrade {
    pub coin: String,
    /// "B" or "A"
    pub side: String,
    pub px: Decimal,
    pub sz: Decimal,
    pub time: u64,
    pub tid: u64,
}

/// Order status push from the `orderUpdates` channel
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsOrderUpdate {
    pub order: WsBasicOrder,
    /// "open", "filled", "canceled", "rejected", "marginCanceled", ...
    pub status: String,
    pub status_timestamp: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsBasicOrder {
    pub coin: String,
    pub side: String,
    pub limit_px: Decimal,
    pub sz: Decimal,
    pub oid: u64,
    pub timestamp: u64,
    pub orig_sz: Decimal,
    #[serde(default)]
    pub cloid: Option<String>,
}

/// Fill batch from the `userFills` channel
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsUserFills {
    #[serde(default)]
    pub is_snapshot: Option<bool>,
    pub user: String,
    pub fills: Vec<UserFillInfo>,
}

/// `userEvents` payloads; only fills are structurally interesting here
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WsUserEvent {
    Fills { fills: Vec<UserFillInfo> },
    Other(serde_json::Value),
}

/// Parsed inbound message, demultiplexed by channel
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "channel", content = "data")]
pub enum WsMessage {
    #[serde(rename = "subscriptionResponse")]
    SubscriptionResponse(serde_json::Value),
    #[serde(rename = "allMids")]
    AllMids(AllMidsData),
    #[serde(rename = "l2Book")]
    L2Book(L2BookSnapshot),
    #[serde(rename = "trades")]
    Trades(Vec<WsTrade>),
    #[serde(rename = "candle")]
    Candle(CandleData),
    #[serde(rename = "orderUpdates")]
    OrderUpdates(Vec<WsOrderUpdate>),
    #[serde(rename = "userFills")]
    UserFills(WsUserFills),
    #[serde(rename = "userEvents")]
    UserEvents(WsUserEvent),
    #[serde(rename = "clearinghouseState")]
    ClearinghouseState(crate::actions::ClearinghouseState),
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error(String),
}

/// Connection statistics
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub messages_received: u64,
    pub messages_sent: u64,
    pub errors: u64,
    pub reconnect_count: u32,
}

/// WebSocket client with automatic reconnection and subscription replay
pub struct WsClient {
    url: String,
    config: WsConfig,
    connection: Option<WsConnection>,
    subscriptions: HashSet<Subscription>,
    rate_limiter: Arc<TokenBucket>,
    stats: StreamStats,
    last_ping_sent: Option<Instant>,
    last_pong: Option<Instant>,
}

impl WsClient {
    pub fn new(url: impl Into<String>, config: WsConfig, rate_limiter: Arc<TokenBucket>) -> Self {
        Self {
            url: url.into(),
            config,
            connection: None,
            subscriptions: HashSet::new(),
            rate_limiter,
            stats: StreamStats::default(),
            last_ping_sent: None,
            last_pong: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats.clone()
    }

    /// The current replay set
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let mut subs: Vec<_> = self.subscriptions.iter().cloned().collect();
        subs.sort_by_key(|s| serde_json::to_string(s).unwrap_or_default());
        subs
    }

    /// Connect and replay every tracked subscription
    pub async fn connect(&mut self) -> Result<()> {
        let (connection, _) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| {
                HyperfillError::connection_failed(format!("WebSocket connect failed: {e}"))
            })?;
        self.connection = Some(connection);
        self.last_pong = Some(Instant::now());
        self.last_ping_sent = None;
        info!(url = %self.url, "WebSocket connected");

        // Deterministic replay order keeps reconnect behavior reproducible
        for subscription in self.subscriptions() {
            self.send_request(&WsRequest::Subscribe {
                subscription: &subscription,
            })
            .await?;
            debug!(?subscription, "subscription replayed");
        }
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            let _ = connection.close(None).await;
        }
        info!("WebSocket disconnected");
    }

    /// Track and (when connected) send a subscription
    pub async fn subscribe(&mut self, subscription: Subscription) -> Result<()> {
        if self.subscriptions.contains(&subscription) {
            return Ok(());
        }
        if self.connection.is_some() {
            // Subscribe frames share the HTTP token bucket
            if !self.rate_limiter.try_consume() {
                return Err(HyperfillError::rate_limited(
                    "token bucket exhausted for subscribe frame",
                ));
            }
            self.send_request(&WsRequest::Subscribe {
                subscription: &subscription,
            })
            .await?;
        }
        self.subscriptions.insert(subscription);
        Ok(())
    }

    pub async fn unsubscribe(&mut self, subscription: &Subscription) -> Result<()> {
        if !self.subscriptions.remove(subscription) {
            return Ok(());
        }
        if self.connection.is_some() {
            self.send_request(&WsRequest::Unsubscribe { subscription })
                .await?;
        }
        Ok(())
    }

    async fn send_request(&mut self, request: &WsRequest<'_>) -> Result<()> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| HyperfillError::connection_lost("WebSocket not connected"))?;
        let text = serde_json::to_string(request)?;
        connection.send(Message::Text(text)).await?;
        self.stats.messages_sent += 1;
        Ok(())
    }

    /// Receive the next parsed message, transparently handling pings,
    /// pongs, and reconnection
    pub async fn next_message(&mut self) -> Result<WsMessage> {
        loop {
            if self.connection.is_none() {
                self.reconnect().await?;
            }
            self.maintain_heartbeat().await?;
            let Some(connection) = self.connection.as_mut() else {
                // Heartbeat dropped a dead connection; retry from the top
                continue;
            };

            // Wake up at least once per ping interval to drive the heartbeat
            let wait = Duration::from_millis(self.config.ping_interval_ms.max(1_000) / 2);
            let frame = match tokio::time::timeout(wait, connection.next()).await {
                Ok(frame) => frame,
                Err(_) => continue,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    self.stats.messages_received += 1;
                    match serde_json::from_str::<WsMessage>(&text) {
                        Ok(WsMessage::Pong) => {
                            self.last_pong = Some(Instant::now());
                        }
                        Ok(message) => return Ok(message),
                        Err(e) => {
                            // Unknown channels are logged, never fatal
                            self.stats.errors += 1;
                            warn!(error = %e, raw = %text, "unparseable WebSocket message");
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if let Some(connection) = self.connection.as_mut() {
                        let _ = connection.send(Message::Pong(payload)).await;
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    self.last_pong = Some(Instant::now());
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("WebSocket closed by server");
                    self.connection = None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "WebSocket receive error");
                    self.stats.errors += 1;
                    self.connection = None;
                }
            }
        }
    }

    /// Send pings on the configured cadence; drop the connection when pongs
    /// stop coming back
    async fn maintain_heartbeat(&mut self) -> Result<()> {
        let interval = Duration::from_millis(self.config.ping_interval_ms);
        let now = Instant::now();

        if let Some(last_pong) = self.last_pong {
            if now.duration_since(last_pong) > interval * 2 {
                warn!("missed pongs beyond threshold, forcing reconnect");
                self.connection = None;
                self.reconnect().await?;
                return Ok(());
            }
        }

        let due = match self.last_ping_sent {
            Some(sent) => now.duration_since(sent) >= interval,
            None => true,
        };
        if due && self.connection.is_some() {
            // A failed ping means the socket is gone; reconnect, don't fail
            if let Err(e) = self.send_request(&WsRequest::Ping).await {
                warn!(error = %e, "ping send failed, dropping connection");
                self.connection = None;
                return Ok(());
            }
            self.last_ping_sent = Some(now);
        }
        Ok(())
    }

    /// Bounded exponential backoff, then full subscription replay
    async fn reconnect(&mut self) -> Result<()> {
        let mut delay = Duration::from_millis(self.config.reconnect_initial_backoff_ms);
        let cap = Duration::from_millis(self.config.reconnect_max_backoff_ms);

        for attempt in 1..=self.config.reconnect_max_attempts {
            warn!(attempt, "attempting WebSocket reconnect");
            match self.connect().await {
                Ok(()) => {
                    self.stats.reconnect_count += 1;
                    info!(attempt, "WebSocket reconnected");
                    return Ok(());
                }
                Err(e) => {
                    error!(attempt, error = %e, "reconnect attempt failed");
                    if attempt < self.config.reconnect_max_attempts {
                        tokio::time::sleep(delay).await;
                        delay = std::cmp::min(delay * 2, cap);
                    }
                }
            }
        }

        Err(HyperfillError::connection_lost(format!(
            "failed to reconnect after {} attempts",
            self.config.reconnect_max_attempts
        )))
    }
}

impl std::fmt::Debug for WsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsClient")
            .field("url", &self.url)
            .field("connected", &self.connection.is_some())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
