//! Hyperfill-rs: High-performance Rust trading engine for Hyperliquid
//!
//! # Features
//!
//! - **Exchange-abstracted trading core** with a polymorphic connector trait
//! - **Hyperliquid protocol engine**: EIP-712 action signing, canonical
//!   MessagePack encoding, dual-shape order response parsing
//! - **L2 order book management** with snapshot+delta sync and slippage
//!   estimation
//! - **Order lifecycle tracking** with a dual-indexed store and event-driven
//!   status propagation
//! - **Fills-driven position accounting** with mark-price revaluation and
//!   exchange reconciliation
//! - **Exact decimal arithmetic** (fixed 18-digit scale) across all price,
//!   size, and PnL math
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hyperfill::{
//!     Connector, ExchangeConfig, HyperliquidConnector, OrderManager, OrderRequest,
//!     PositionTracker, PrivateKey, Side,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = ExchangeConfig::public("hyperliquid", true);
//!     config.api_key = "0x1234567890123456789012345678901234567890".to_string();
//!     config.secret_key = Some(PrivateKey::new(
//!         "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
//!     )?);
//!
//!     let connector = Arc::new(HyperliquidConnector::new(config)?);
//!     connector.connect().await?;
//!
//!     let orders = OrderManager::new(connector.clone());
//!     let positions = PositionTracker::new();
//!     positions.sync(connector.as_ref()).await?;
//!
//!     let request = OrderRequest::limit(
//!         "BTC-USDC".parse()?,
//!         Side::Buy,
//!         "50000".parse()?,
//!         "0.01".parse()?,
//!     );
//!     let order = orders.submit(request).await?;
//!     println!("resting: {:?}", order.exchange_order_id);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Streaming
//!
//! With the default `stream` feature, market and user data arrive over the
//! WebSocket and are demultiplexed into unified events:
//!
//! ```rust,no_run
//! # use hyperfill::{HyperliquidConnector, Subscription, StreamEvent};
//! # async fn run(connector: HyperliquidConnector) -> hyperfill::Result<()> {
//! let mut stream = connector.market_stream();
//! stream.subscribe(Subscription::l2_book("ETH")).await?;
//! stream.connect().await?;
//!
//! loop {
//!     let message = stream.next_message().await?;
//!     for event in connector.process_ws_message(message) {
//!         match event {
//!             StreamEvent::BookUpdated(pair) => { /* read connector.books() */ }
//!             StreamEvent::Fill(fill) => { /* orders.on_user_fill + positions.apply_fill */ }
//!             _ => {}
//!         }
//!     }
//! }
//! # }
//! ```

use tracing::info;

// Initialize logging
pub fn init() {
    tracing_subscriber::fmt::init();
    info!("Hyperfill-rs initialized");
}

// Re-export core value types
pub use crate::decimal::Decimal;
pub use crate::errors::{
    ArithmeticErrorKind, AuthErrorKind, BusinessErrorKind, DataErrorKind, HyperfillError,
    NetworkErrorKind, ProtocolErrorKind, Result, SystemErrorKind,
};
pub use crate::types::{
    Account, Balance, Candle, ClientOrderId, ExchangeOrderId, Fill, MasterAddress, Order,
    OrderRequest, OrderStatus, OrderType, Orderbook, OrderbookLevel, Position, PositionSide, Side,
    SignerAddress, Ticker, TimeInForce, TradingPair,
};

// Re-export configuration
pub use crate::config::{
    Config, Credentials, ExchangeConfig, HttpConfig, PrivateKey, WsConfig, MAINNET_HTTP_URL,
    MAINNET_WS_URL, TESTNET_HTTP_URL, TESTNET_WS_URL,
};

// Re-export the connector abstraction and the Hyperliquid implementation
pub use crate::connector::{CancelAllResult, Connector, OrderAck, OrderUpdateEvent, StreamEvent};
pub use crate::hyperliquid::HyperliquidConnector;

// Re-export the trading state components
pub use crate::book::{BookManager, BookUpdate, OrderBook, SlippageEstimate};
pub use crate::orders::{OrderEvent, OrderManager};
pub use crate::positions::{PortfolioPnl, PositionTracker};

// Re-export transport surfaces
pub use crate::transport::HttpTransport;
#[cfg(feature = "stream")]
pub use crate::stream::{StreamStats, Subscription, WsClient, WsMessage};

// Module declarations
pub mod actions;
pub mod auth;
pub mod book;
pub mod config;
pub mod connector;
pub mod decimal;
pub mod errors;
pub mod hyperliquid;
pub mod orders;
pub mod positions;
#[cfg(feature = "stream")]
pub mod stream;
pub mod transport;
pub mod types;
pub mod utils;
