//! Hyperliquid wire models and canonical action encoding
//!
//! Everything that crosses the HTTP boundary lives here: the signed exchange
//! actions, the unsigned info queries, and the response shapes for both.
//!
//! Exchange actions are encoded to MessagePack before signing, and the
//! signature is computed over those exact bytes. Field order is therefore
//! frozen: `{a, b, p, s, r, t}` for orders, `{a, o}` for cancels. Reordering
//! a field, or formatting a price with a stray trailing zero, produces a
//! signature that recovers to a random address, which the venue reports as
//! "User or API Wallet does not exist".

use crate::decimal::Decimal;
use crate::errors::{HyperfillError, Result};
use crate::types::MasterAddress;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Exchange actions (signed, POST /exchange)
// ============================================================================

/// One order inside an `order` action batch
///
/// Declaration order is the msgpack field order; do not reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAction {
    /// Asset index into the venue universe
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "b")]
    pub is_buy: bool,
    /// Limit price, normalized string form
    #[serde(rename = "p")]
    pub price: Decimal,
    /// Size in base units, normalized string form
    #[serde(rename = "s")]
    pub size: Decimal,
    #[serde(rename = "r")]
    pub reduce_only: bool,
    #[serde(rename = "t")]
    pub kind: OrderKind,
}

/// Order-type tagged union (`t` field)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderKind {
    pub limit: LimitParams,
}

impl OrderKind {
    pub fn limit(tif: &str) -> Self {
        Self {
            limit: LimitParams {
                tif: tif.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitParams {
    /// "Gtc", "Ioc", or "Alo"
    pub tif: String,
}

/// One cancel inside a `cancel` action batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAction {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "o")]
    pub oid: u64,
}

/// A signed exchange action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExchangeAction {
    #[serde(rename = "order")]
    Order {
        orders: Vec<OrderAction>,
        grouping: String,
    },
    #[serde(rename = "cancel")]
    Cancel { cancels: Vec<CancelAction> },
    #[serde(rename = "modify")]
    Modify { oid: u64, order: OrderAction },
    #[serde(rename = "updateLeverage")]
    UpdateLeverage {
        asset: u32,
        #[serde(rename = "isCross")]
        is_cross: bool,
        leverage: u32,
    },
}

impl ExchangeAction {
    pub fn order(orders: Vec<OrderAction>) -> Self {
        Self::Order {
            orders,
            grouping: "na".to_string(),
        }
    }

    pub fn cancel(cancels: Vec<CancelAction>) -> Self {
        Self::Cancel { cancels }
    }

    pub fn modify(oid: u64, order: OrderAction) -> Self {
        Self::Modify { oid, order }
    }

    pub fn update_leverage(asset: u32, is_cross: bool, leverage: u32) -> Self {
        Self::UpdateLeverage {
            asset,
            is_cross,
            leverage,
        }
    }

    /// Canonical MessagePack bytes, the substrate of the EIP-712 signature
    ///
    /// `to_vec_named` emits struct fields as a map in declaration order, so
    /// the same logical action always produces the same bytes.
    pub fn action_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self)
            .map_err(|e| HyperfillError::invalid_format(format!("msgpack encode failed: {e}")))
    }
}

/// ECDSA signature components as the venue expects them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSignature {
    /// 0x-prefixed 32-byte hex
    pub r: String,
    /// 0x-prefixed 32-byte hex
    pub s: String,
    /// 27 or 28
    pub v: u64,
}

/// Body of `POST /exchange`
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRequest {
    pub action: ExchangeAction,
    pub nonce: u64,
    pub signature: ActionSignature,
    #[serde(rename = "vaultAddress", skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<String>,
}

// ============================================================================
// Info queries (unsigned, POST /info)
// ============================================================================

/// Body of `POST /info`
///
/// Constructors taking an address require a [`MasterAddress`]: read queries
/// keyed by the API wallet address silently return an empty account.
#[derive(Debug, Clone, Serialize)]
pub struct InfoRequest {
    #[serde(rename = "type")]
    pub request_type: String,
    // Flattened Option serializes as no fields when None
    #[serde(flatten)]
    pub params: Option<InfoParams>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InfoParams {
    Coin {
        coin: String,
    },
    User {
        user: String,
    },
    OrderStatus {
        user: String,
        oid: u64,
    },
    CandleSnapshot {
        req: CandleSnapshotParams,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleSnapshotParams {
    pub coin: String,
    pub interval: String,
    pub start_time: u64,
    pub end_time: u64,
}

impl InfoRequest {
    pub fn meta() -> Self {
        Self {
            request_type: "meta".to_string(),
            params: None,
        }
    }

    pub fn all_mids() -> Self {
        Self {
            request_type: "allMids".to_string(),
            params: None,
        }
    }

    pub fn l2_book(coin: &str) -> Self {
        Self {
            request_type: "l2Book".to_string(),
            params: Some(InfoParams::Coin {
                coin: coin.to_string(),
            }),
        }
    }

    pub fn clearinghouse_state(user: &MasterAddress) -> Self {
        Self {
            request_type: "clearinghouseState".to_string(),
            params: Some(InfoParams::User {
                user: user.to_hex(),
            }),
        }
    }

    pub fn open_orders(user: &MasterAddress) -> Self {
        Self {
            request_type: "openOrders".to_string(),
            params: Some(InfoParams::User {
                user: user.to_hex(),
            }),
        }
    }

    pub fn order_status(user: &MasterAddress, oid: u64) -> Self {
        Self {
            request_type: "orderStatus".to_string(),
            params: Some(InfoParams::OrderStatus {
                user: user.to_hex(),
                oid,
            }),
        }
    }

    pub fn user_fills(user: &MasterAddress) -> Self {
        Self {
            request_type: "userFills".to_string(),
            params: Some(InfoParams::User {
                user: user.to_hex(),
            }),
        }
    }

    pub fn candle_snapshot(coin: &str, interval: &str, start_time: u64, end_time: u64) -> Self {
        Self {
            request_type: "candleSnapshot".to_string(),
            params: Some(InfoParams::CandleSnapshot {
                req: CandleSnapshotParams {
                    coin: coin.to_string(),
                    interval: interval.to_string(),
                    start_time,
                    end_time,
                },
            }),
        }
    }
}

// ============================================================================
// Exchange responses
// ============================================================================

/// Envelope returned by `POST /exchange`
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    pub status: String,
    pub response: ExchangeResponsePayload,
}

/// `response` is a plain string on top-level failure, an object on success
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExchangeResponsePayload {
    Error(String),
    Data(ExchangeResponseData),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ExchangeResponseData {
    #[serde(rename = "order")]
    Order { data: OrderResponseData },
    #[serde(rename = "cancel")]
    Cancel { data: CancelResponseData },
    /// Modify statuses share the cancel success/error shape
    #[serde(rename = "modify")]
    Modify { data: CancelResponseData },
    #[serde(rename = "default")]
    Default,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponseData {
    pub statuses: Vec<OrderResponseStatus>,
}

/// Per-order outcome of an `order` action
///
/// A resting limit comes back as `{resting:{oid}}`; a crossed or IOC order
/// comes back already executed as `{filled:{oid, totalSz, avgPx}}`. Both are
/// success; treating `filled` as a shape mismatch made every market order
/// look failed.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OrderResponseStatus {
    Resting { resting: RestingInfo },
    Filled { filled: FilledInfo },
    Error { error: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestingInfo {
    pub oid: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilledInfo {
    pub oid: u64,
    #[serde(rename = "totalSz")]
    pub total_sz: Decimal,
    #[serde(rename = "avgPx")]
    pub avg_px: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelResponseData {
    pub statuses: Vec<CancelResponseStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CancelResponseStatus {
    /// Usually the literal "success"
    Success(String),
    Error { error: String },
}

// ============================================================================
// Info responses
// ============================================================================

/// Universe metadata from `{type: "meta"}`
#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub universe: Vec<AssetInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub name: String,
    pub sz_decimals: u32,
    #[serde(default)]
    pub max_leverage: Option<u32>,
}

/// All mid prices from `{type: "allMids"}`, coin → mid
pub type AllMids = HashMap<String, Decimal>;

/// L2 book snapshot from `{type: "l2Book"}`
#[derive(Debug, Clone, Deserialize)]
pub struct L2BookSnapshot {
    pub coin: String,
    pub time: u64,
    /// `[bids, asks]`
    pub levels: [Vec<WireLevel>; 2],
}

/// One price level as the venue sends it
#[derive(Debug, Clone, Deserialize)]
pub struct WireLevel {
    pub px: Decimal,
    pub sz: Decimal,
    pub n: u32,
}

/// One open order from `{type: "openOrders"}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrderInfo {
    pub coin: String,
    /// "B" for bid, "A" for ask
    pub side: String,
    pub limit_px: Decimal,
    pub sz: Decimal,
    pub oid: u64,
    pub timestamp: u64,
    pub orig_sz: Decimal,
}

impl OpenOrderInfo {
    pub fn is_buy(&self) -> bool {
        self.side == "B"
    }
}

/// Response to `{type: "orderStatus"}`
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusResponse {
    /// "order" when found, "unknownOid" otherwise
    pub status: String,
    #[serde(default)]
    pub order: Option<OrderStatusInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusInfo {
    pub order: OpenOrderInfo,
    pub status: String,
    pub status_timestamp: u64,
}

/// One fill from `{type: "userFills"}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFillInfo {
    pub coin: String,
    pub px: Decimal,
    pub sz: Decimal,
    /// "B" or "A"
    pub side: String,
    pub time: u64,
    pub closed_pnl: Decimal,
    pub oid: u64,
    pub tid: u64,
    pub fee: Decimal,
    pub crossed: bool,
}

impl UserFillInfo {
    pub fn is_buy(&self) -> bool {
        self.side == "B"
    }
}

/// Account state from `{type: "clearinghouseState"}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    #[serde(default)]
    pub asset_positions: Vec<AssetPosition>,
    #[serde(default)]
    pub margin_summary: Option<MarginSummary>,
    #[serde(default)]
    pub cross_margin_summary: Option<MarginSummary>,
    #[serde(default)]
    pub withdrawable: Option<Decimal>,
    #[serde(default)]
    pub time: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    pub position: PositionData,
    #[serde(rename = "type")]
    pub position_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub coin: String,
    /// Signed size: positive long, negative short
    pub szi: Decimal,
    #[serde(default)]
    pub entry_px: Option<Decimal>,
    #[serde(default)]
    pub leverage: Option<LeverageInfo>,
    #[serde(default)]
    pub liquidation_px: Option<Decimal>,
    pub margin_used: Decimal,
    pub position_value: Decimal,
    pub return_on_equity: Decimal,
    pub unrealized_pnl: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeverageInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    pub account_value: Decimal,
    pub total_ntl_pos: Decimal,
    pub total_raw_usd: Decimal,
    pub total_margin_used: Decimal,
}

/// One candle row from `{type: "candleSnapshot"}`
#[derive(Debug, Clone, Deserialize)]
pub struct CandleData {
    /// Open time (millis)
    pub t: u64,
    /// Close time (millis)
    #[serde(rename = "T")]
    pub close_time: u64,
    /// Coin
    pub s: String,
    /// Interval
    pub i: String,
    pub o: Decimal,
    pub c: Decimal,
    pub h: Decimal,
    pub l: Decimal,
    pub v: Decimal,
    /// Trade count
    pub n: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sample_order() -> OrderAction {
        OrderAction {
            asset: 0,
            is_buy: true,
            price: dec("50000"),
            size: dec("0.01"),
            reduce_only: false,
            kind: OrderKind::limit("Gtc"),
        }
    }

    #[test]
    fn test_order_action_bytes_are_frozen() {
        // Known-good vector: map{"type":"order","orders":[{a,b,p,s,r,t}],
        // "grouping":"na"}. Any deviation invalidates signatures downstream.
        let bytes = ExchangeAction::order(vec![sample_order()])
            .action_bytes()
            .unwrap();
        let expected: Vec<u8> = vec![
            0x83, // map, 3 entries
            0xa4, b't', b'y', b'p', b'e', 0xa5, b'o', b'r', b'd', b'e', b'r', // type: order
            0xa6, b'o', b'r', b'd', b'e', b'r', b's', // orders:
            0x91, // array, 1 entry
            0x86, // map, 6 entries
            0xa1, b'a', 0x00, // a: 0
            0xa1, b'b', 0xc3, // b: true
            0xa1, b'p', 0xa5, b'5', b'0', b'0', b'0', b'0', // p: "50000"
            0xa1, b's', 0xa4, b'0', b'.', b'0', b'1', // s: "0.01"
            0xa1, b'r', 0xc2, // r: false
            0xa1, b't', // t:
            0x81, 0xa5, b'l', b'i', b'm', b'i', b't', // map { limit:
            0x81, 0xa3, b't', b'i', b'f', 0xa3, b'G', b't', b'c', // map { tif: "Gtc" } }
            0xa8, b'g', b'r', b'o', b'u', b'p', b'i', b'n', b'g', // grouping:
            0xa2, b'n', b'a', // "na"
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_cancel_action_bytes_are_frozen() {
        let bytes = ExchangeAction::cancel(vec![CancelAction {
            asset: 0,
            oid: 12345,
        }])
        .action_bytes()
        .unwrap();
        let expected: Vec<u8> = vec![
            0x82, // map, 2 entries
            0xa4, b't', b'y', b'p', b'e', 0xa6, b'c', b'a', b'n', b'c', b'e', b'l',
            0xa7, b'c', b'a', b'n', b'c', b'e', b'l', b's', // cancels:
            0x91, // array, 1 entry
            0x82, // map, 2 entries
            0xa1, b'a', 0x00, // a: 0
            0xa1, b'o', 0xcd, 0x30, 0x39, // o: 12345 (uint16)
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_action_bytes_deterministic() {
        let a = ExchangeAction::order(vec![sample_order()]);
        assert_eq!(a.action_bytes().unwrap(), a.action_bytes().unwrap());
    }

    #[test]
    fn test_price_normalization_flows_into_encoding() {
        // "0.0010" and "0.001" are the same value and must encode identically
        let mut order = sample_order();
        order.size = dec("0.0010");
        let a = ExchangeAction::order(vec![order]).action_bytes().unwrap();
        let mut order = sample_order();
        order.size = dec("0.001");
        let b = ExchangeAction::order(vec![order]).action_bytes().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_modify_action_serialization() {
        let action = ExchangeAction::modify(12345, sample_order());
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "modify");
        assert_eq!(json["oid"], 12345);
        assert_eq!(json["order"]["a"], 0);
        assert_eq!(json["order"]["p"], "50000");
        // Deterministic bytes, same as every other signed action
        assert_eq!(
            action.action_bytes().unwrap(),
            action.action_bytes().unwrap()
        );
    }

    #[test]
    fn test_info_request_serialization() {
        let json = serde_json::to_value(InfoRequest::meta()).unwrap();
        assert_eq!(json, serde_json::json!({"type": "meta"}));

        let json = serde_json::to_value(InfoRequest::l2_book("BTC")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "l2Book", "coin": "BTC"}));

        let user = MasterAddress::parse("0x1234567890123456789012345678901234567890").unwrap();
        let json = serde_json::to_value(InfoRequest::open_orders(&user)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "openOrders",
                "user": "0x1234567890123456789012345678901234567890"
            })
        );

        let json = serde_json::to_value(InfoRequest::order_status(&user, 77)).unwrap();
        assert_eq!(json["type"], "orderStatus");
        assert_eq!(json["oid"], 77);
    }

    #[test]
    fn test_parse_resting_response() {
        let raw = r#"{
            "status": "ok",
            "response": {"type": "order", "data": {"statuses": [{"resting": {"oid": 12345}}]}}
        }"#;
        let parsed: ExchangeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.status, "ok");
        match parsed.response {
            ExchangeResponsePayload::Data(ExchangeResponseData::Order { data }) => {
                assert!(matches!(
                    data.statuses[0],
                    OrderResponseStatus::Resting { ref resting } if resting.oid == 12345
                ));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_parse_filled_response() {
        let raw = r#"{
            "status": "ok",
            "response": {"type": "order", "data": {"statuses": [
                {"filled": {"oid": 12346, "totalSz": "0.01", "avgPx": "50100"}}
            ]}}
        }"#;
        let parsed: ExchangeResponse = serde_json::from_str(raw).unwrap();
        match parsed.response {
            ExchangeResponsePayload::Data(ExchangeResponseData::Order { data }) => {
                match &data.statuses[0] {
                    OrderResponseStatus::Filled { filled } => {
                        assert_eq!(filled.oid, 12346);
                        assert_eq!(filled.total_sz, dec("0.01"));
                        assert_eq!(filled.avg_px, dec("50100"));
                    }
                    other => panic!("unexpected status: {other:?}"),
                }
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_parse_per_order_error_and_top_level_error() {
        let raw = r#"{
            "status": "ok",
            "response": {"type": "order", "data": {"statuses": [
                {"error": "Order must have minimum value of $10"}
            ]}}
        }"#;
        let parsed: ExchangeResponse = serde_json::from_str(raw).unwrap();
        match parsed.response {
            ExchangeResponsePayload::Data(ExchangeResponseData::Order { data }) => {
                assert!(matches!(
                    data.statuses[0],
                    OrderResponseStatus::Error { ref error } if error.contains("minimum value")
                ));
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        let raw = r#"{"status": "err", "response": "User or API Wallet does not exist"}"#;
        let parsed: ExchangeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.status, "err");
        assert!(matches!(
            parsed.response,
            ExchangeResponsePayload::Error(ref msg) if msg.contains("does not exist")
        ));
    }

    #[test]
    fn test_parse_meta() {
        let raw = r#"{"universe": [
            {"name": "BTC", "szDecimals": 5, "maxLeverage": 50},
            {"name": "ETH", "szDecimals": 4, "maxLeverage": 50}
        ]}"#;
        let meta: Meta = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.universe.len(), 2);
        assert_eq!(meta.universe[0].name, "BTC");
        assert_eq!(meta.universe[0].sz_decimals, 5);
    }

    #[test]
    fn test_parse_l2_book_snapshot() {
        let raw = r#"{
            "coin": "BTC",
            "time": 1700000000000,
            "levels": [
                [{"px": "50000", "sz": "1.0", "n": 3}],
                [{"px": "50001", "sz": "0.5", "n": 1}]
            ]
        }"#;
        let book: L2BookSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(book.coin, "BTC");
        assert_eq!(book.levels[0][0].px, dec("50000"));
        assert_eq!(book.levels[1][0].n, 1);
    }

    #[test]
    fn test_parse_clearinghouse_state() {
        let raw = r#"{
            "assetPositions": [{
                "position": {
                    "coin": "ETH",
                    "szi": "-2.5",
                    "entryPx": "2000.0",
                    "leverage": {"type": "cross", "value": 10},
                    "liquidationPx": "2400.0",
                    "marginUsed": "500",
                    "positionValue": "5000",
                    "returnOnEquity": "-0.05",
                    "unrealizedPnl": "-25"
                },
                "type": "oneWay"
            }],
            "crossMarginSummary": {
                "accountValue": "10000",
                "totalNtlPos": "5000",
                "totalRawUsd": "9500",
                "totalMarginUsed": "500"
            },
            "withdrawable": "9000",
            "time": 1700000000000
        }"#;
        let state: ClearinghouseState = serde_json::from_str(raw).unwrap();
        let pos = &state.asset_positions[0].position;
        assert_eq!(pos.coin, "ETH");
        assert_eq!(pos.szi, dec("-2.5"));
        assert_eq!(pos.leverage.as_ref().unwrap().value, 10);
        assert_eq!(
            state.cross_margin_summary.unwrap().account_value,
            dec("10000")
        );
        assert_eq!(state.withdrawable.unwrap(), dec("9000"));
    }

    #[test]
    fn test_parse_open_orders_and_fills() {
        let raw = r#"[{
            "coin": "BTC", "side": "B", "limitPx": "50000", "sz": "0.01",
            "oid": 12345, "timestamp": 1700000000000, "origSz": "0.01"
        }]"#;
        let orders: Vec<OpenOrderInfo> = serde_json::from_str(raw).unwrap();
        assert!(orders[0].is_buy());
        assert_eq!(orders[0].oid, 12345);

        let raw = r#"[{
            "coin": "ETH", "px": "2100", "sz": "0.5", "side": "A",
            "time": 1700000001000, "startPosition": "1.0", "dir": "Close Long",
            "closedPnl": "50", "hash": "0xabc", "oid": 99, "crossed": true,
            "fee": "0.35", "tid": 445566, "feeToken": "USDC"
        }]"#;
        let fills: Vec<UserFillInfo> = serde_json::from_str(raw).unwrap();
        assert!(!fills[0].is_buy());
        assert_eq!(fills[0].closed_pnl, dec("50"));
        assert_eq!(fills[0].tid, 445566);
    }
}
