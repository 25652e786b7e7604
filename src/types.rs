//! Unified trading types
//!
//! Exchange-agnostic primitives shared by the connector interface, order
//! manager, and position tracker. Venue-native shapes (Hyperliquid wire
//! models) live in `actions` and are converted to these types at the
//! connector boundary.

use crate::decimal::Decimal;
use crate::errors::{HyperfillError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Client-assigned order identity, stable across the order's lifetime
pub type ClientOrderId = String;

/// Exchange-assigned order id (`oid`)
pub type ExchangeOrderId = u64;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

/// Order type
///
/// The venue has no native market orders; `Market` is submitted as an IOC
/// limit at a far-through price by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    /// Good till cancelled
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Add liquidity only (post-only)
    Alo,
}

impl TimeInForce {
    /// Venue wire form ("Gtc" / "Ioc" / "Alo")
    pub fn as_venue_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "Gtc",
            TimeInForce::Ioc => "Ioc",
            TimeInForce::Alo => "Alo",
        }
    }
}

/// Order lifecycle state
///
/// `Pending → {Open, Filled, Rejected}`, then
/// `Open → {PartiallyFilled, Filled, Cancelled, Expired}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }
}

/// A traded instrument in canonical `"BASE-QUOTE"` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = HyperfillError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('-') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() => {
                Ok(TradingPair::new(base, quote))
            }
            _ => Err(HyperfillError::invalid_pair(format!(
                "expected BASE-QUOTE, got {s:?}"
            ))),
        }
    }
}

/// Parameters for creating an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub pair: TradingPair,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Required for limit orders; ignored for market orders
    pub price: Option<Decimal>,
    pub tif: TimeInForce,
    pub reduce_only: bool,
    /// Caller-supplied identity; allocated by the order manager if absent
    pub client_order_id: Option<ClientOrderId>,
}

impl OrderRequest {
    pub fn limit(pair: TradingPair, side: Side, price: Decimal, quantity: Decimal) -> Self {
        Self {
            pair,
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            tif: TimeInForce::Gtc,
            reduce_only: false,
            client_order_id: None,
        }
    }

    pub fn market(pair: TradingPair, side: Side, quantity: Decimal) -> Self {
        Self {
            pair,
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            tif: TimeInForce::Ioc,
            reduce_only: false,
            client_order_id: None,
        }
    }

    /// Structural validation; the connector re-verifies tick alignment
    pub fn validate(&self) -> Result<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(HyperfillError::invalid_format(format!(
                "order quantity must be positive, got {}",
                self.quantity
            )));
        }
        match (self.order_type, self.price) {
            (OrderType::Limit, None) => Err(HyperfillError::invalid_format(
                "limit order requires a price",
            )),
            (OrderType::Limit, Some(price)) if price <= Decimal::ZERO => Err(
                HyperfillError::invalid_format(format!("limit price must be positive, got {price}")),
            ),
            _ => Ok(()),
        }
    }
}

/// Order state as tracked by the order manager
///
/// The store holds the single authoritative copy; values handed to callers
/// are snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub client_order_id: ClientOrderId,
    pub exchange_order_id: Option<ExchangeOrderId>,
    pub pair: TradingPair,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    /// Size-weighted mean fill price; present iff `filled_quantity > 0`
    pub avg_fill_price: Option<Decimal>,
    pub status: OrderStatus,
    pub tif: TimeInForce,
    pub reduce_only: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl Order {
    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity
            .try_sub(self.filled_quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A single execution against an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Venue trade id, unique per fill; used for de-duplication
    pub trade_id: u64,
    pub exchange_order_id: ExchangeOrderId,
    pub pair: TradingPair,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub fee: Decimal,
    /// Venue-reported realized PnL for reducing fills
    pub closed_pnl: Option<Decimal>,
    pub timestamp_ms: u64,
}

/// Top-of-book market summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: TradingPair,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub last: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub timestamp_ms: u64,
}

/// One aggregated price level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderbookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
    pub order_count: u32,
}

/// Price-aggregated order book snapshot
///
/// Bids are strictly descending by price, asks strictly ascending; no level
/// carries zero quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orderbook {
    pub pair: TradingPair,
    pub bids: Vec<OrderbookLevel>,
    pub asks: Vec<OrderbookLevel>,
    pub timestamp_ms: u64,
}

/// One OHLCV row as returned by the venue (no aggregation is performed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub pair: TradingPair,
    pub interval: String,
    pub open_time_ms: u64,
    pub close_time_ms: u64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub trade_count: u32,
}

/// Direction of an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
    Flat,
}

impl PositionSide {
    /// +1 for long, -1 for short, 0 for flat
    pub fn sign(&self) -> i32 {
        match self {
            PositionSide::Long => 1,
            PositionSide::Short => -1,
            PositionSide::Flat => 0,
        }
    }
}

/// Open position state
///
/// `size` is always non-negative; direction lives in `side`. A flat position
/// has zero size and zero entry price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub pair: TradingPair,
    pub side: PositionSide,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Option<Decimal>,
    pub liquidation_price: Option<Decimal>,
    pub leverage: u32,
    pub margin_used: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl_cumulative: Decimal,
    pub return_on_equity: Option<Decimal>,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    pub fn flat(pair: TradingPair) -> Self {
        let now = Utc::now();
        Self {
            pair,
            side: PositionSide::Flat,
            size: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            mark_price: None,
            liquidation_price: None,
            leverage: 1,
            margin_used: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl_cumulative: Decimal::ZERO,
            return_on_equity: None,
            opened_at: now,
            updated_at: now,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::Flat
    }
}

/// Per-asset balance; `total = available + locked`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub total: Decimal,
    pub available: Decimal,
    pub locked: Decimal,
}

/// Account-level margin summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub total_balance: Decimal,
    pub available_balance: Decimal,
    pub margin_used: Decimal,
    pub account_value: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub total_realized_pnl: Decimal,
}

/// The asset-owning account address, used for every read query
///
/// Distinct from [`SignerAddress`] on purpose: querying by the signer's
/// address returns an empty account ("User or API Wallet does not exist").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MasterAddress([u8; 20]);

/// The API wallet address that action signatures recover to
///
/// Never valid as a read-query `user` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignerAddress([u8; 20]);

fn parse_eth_address(s: &str) -> Result<[u8; 20]> {
    let hex_part = s.trim().strip_prefix("0x").unwrap_or(s.trim());
    if hex_part.len() != 40 {
        return Err(HyperfillError::invalid_format(format!(
            "address must be 20 bytes (40 hex chars): {s:?}"
        )));
    }
    let bytes = hex::decode(hex_part)
        .map_err(|e| HyperfillError::invalid_format(format!("invalid hex in address: {e}")))?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Ok(out)
}

impl MasterAddress {
    pub fn parse(s: &str) -> Result<Self> {
        parse_eth_address(s).map(Self)
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Lowercase 0x-prefixed hex, the form the venue expects in `user` fields
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for MasterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl SignerAddress {
    pub fn parse(s: &str) -> Result<Self> {
        parse_eth_address(s).map(Self)
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for SignerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_round_trip() {
        let pair: TradingPair = "BTC-USDC".parse().unwrap();
        assert_eq!(pair.base, "BTC");
        assert_eq!(pair.quote, "USDC");
        assert_eq!(pair.to_string(), "BTC-USDC");
        assert_eq!(TradingPair::new("eth", "usdc").to_string(), "ETH-USDC");
    }

    #[test]
    fn test_pair_rejects_malformed() {
        assert!("BTC".parse::<TradingPair>().is_err());
        assert!("-USDC".parse::<TradingPair>().is_err());
        assert!("BTC-".parse::<TradingPair>().is_err());
    }

    #[test]
    fn test_order_request_validation() {
        let pair: TradingPair = "BTC-USDC".parse().unwrap();
        let ok = OrderRequest::limit(
            pair.clone(),
            Side::Buy,
            Decimal::from_int(50_000),
            "0.01".parse().unwrap(),
        );
        assert!(ok.validate().is_ok());

        let mut no_price = ok.clone();
        no_price.price = None;
        assert!(no_price.validate().is_err());

        let mut zero_qty = ok.clone();
        zero_qty.quantity = Decimal::ZERO;
        assert!(zero_qty.validate().is_err());

        // Market orders do not require a price
        let market = OrderRequest::market(pair, Side::Sell, "0.5".parse().unwrap());
        assert!(market.validate().is_ok());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
    }

    #[test]
    fn test_address_parsing_and_display() {
        let addr = MasterAddress::parse("0xAbCd567890123456789012345678901234567890").unwrap();
        assert_eq!(
            addr.to_hex(),
            "0xabcd567890123456789012345678901234567890"
        );
        assert!(MasterAddress::parse("0x1234").is_err());
        assert!(SignerAddress::parse("not hex").is_err());
    }

    #[test]
    fn test_position_side_sign() {
        assert_eq!(PositionSide::Long.sign(), 1);
        assert_eq!(PositionSide::Short.sign(), -1);
        assert_eq!(PositionSide::Flat.sign(), 0);
    }
}
