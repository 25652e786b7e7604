//! Configuration consumed by the trading core
//!
//! The TOML/JSON loader lives outside this crate; the core only defines the
//! deserializable shape, defaults, validation, and secret redaction.

use crate::errors::{HyperfillError, Result};
use crate::types::{MasterAddress, SignerAddress};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Mainnet HTTP API base
pub const MAINNET_HTTP_URL: &str = "https://api.hyperliquid.xyz";
/// Testnet HTTP API base
pub const TESTNET_HTTP_URL: &str = "https://api.hyperliquid-testnet.xyz";
/// Mainnet WebSocket endpoint
pub const MAINNET_WS_URL: &str = "wss://api.hyperliquid.xyz/ws";
/// Testnet WebSocket endpoint
pub const TESTNET_WS_URL: &str = "wss://api.hyperliquid-testnet.xyz/ws";

/// Placeholder written wherever a secret would otherwise be serialized
const REDACTED: &str = "***redacted***";

/// An API wallet private key (64 hex chars, no 0x prefix required)
///
/// Key material is zeroized on drop. `Debug`, `Display`, and `Serialize` all
/// emit a fixed placeholder so the key cannot leak through error or log
/// serialization.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let hex_part = key.trim().strip_prefix("0x").unwrap_or(key.trim());
        if hex_part.len() != 64 {
            return Err(HyperfillError::config(
                "secret_key must be 32 bytes (64 hex chars)",
            ));
        }
        if !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HyperfillError::config("secret_key must be valid hex"));
        }
        Ok(Self(hex_part.to_lowercase()))
    }

    /// The raw hex key, for signer construction only
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({REDACTED})")
    }
}

impl fmt::Display for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for PrivateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PrivateKey::new(raw).map_err(serde::de::Error::custom)
    }
}

/// HTTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Shared token-bucket rate, requests per second
    pub rate_limit_rps: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            rate_limit_rps: 20,
        }
    }
}

/// WebSocket transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WsConfig {
    /// Override endpoint; defaults to the network-appropriate venue URL
    pub url: Option<String>,
    pub ping_interval_ms: u64,
    pub reconnect_max_attempts: u32,
    pub reconnect_initial_backoff_ms: u64,
    /// Backoff ceiling
    pub reconnect_max_backoff_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: None,
            ping_interval_ms: 30_000,
            reconnect_max_attempts: 10,
            reconnect_initial_backoff_ms: 1_000,
            reconnect_max_backoff_ms: 30_000,
        }
    }
}

/// Exchange connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Connector selector, e.g. "hyperliquid"
    pub name: String,
    #[serde(default)]
    pub testnet: bool,
    /// Master wallet address (asset owner), 0x-prefixed 40-hex
    pub api_key: String,
    /// API wallet private key; never the master key
    pub secret_key: Option<PrivateKey>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub websocket: WsConfig,
}

impl ExchangeConfig {
    /// Read-only configuration for a public-data connector (no signing)
    pub fn public(name: impl Into<String>, testnet: bool) -> Self {
        Self {
            name: name.into(),
            testnet,
            api_key: String::new(),
            secret_key: None,
            http: HttpConfig::default(),
            websocket: WsConfig::default(),
        }
    }

    pub fn http_url(&self) -> &str {
        if self.testnet {
            TESTNET_HTTP_URL
        } else {
            MAINNET_HTTP_URL
        }
    }

    pub fn ws_url(&self) -> String {
        self.websocket.url.clone().unwrap_or_else(|| {
            if self.testnet {
                TESTNET_WS_URL.to_string()
            } else {
                MAINNET_WS_URL.to_string()
            }
        })
    }

    /// Parse and validate the configured master address
    pub fn master_address(&self) -> Result<MasterAddress> {
        MasterAddress::parse(&self.api_key)
            .map_err(|e| HyperfillError::config(format!("invalid api_key: {e}")))
    }

    /// Structural validation of everything the core will rely on
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(HyperfillError::config("exchange.name must be set"));
        }
        if !self.api_key.is_empty() {
            self.master_address()?;
        }
        if let Some(url) = &self.websocket.url {
            url::Url::parse(url)
                .map_err(|e| HyperfillError::config(format!("invalid websocket.url: {e}")))?;
        }
        if self.http.timeout_ms == 0 {
            return Err(HyperfillError::config("http.timeout_ms must be positive"));
        }
        if self.http.rate_limit_rps == 0 {
            return Err(HyperfillError::config("http.rate_limit_rps must be positive"));
        }
        Ok(())
    }
}

/// Top-level configuration object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub exchange: ExchangeConfig,
}

/// Signing credentials: master account for reads, API wallet for signatures
///
/// Keeping the two addresses in distinct types makes the historical
/// "queried by the signer address" bug a compile error.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub master: MasterAddress,
    pub secret_key: PrivateKey,
}

impl Credentials {
    pub fn from_config(config: &ExchangeConfig) -> Result<Self> {
        let master = config.master_address()?;
        let secret_key = config
            .secret_key
            .clone()
            .ok_or_else(HyperfillError::signer_required)?;
        Ok(Self { master, secret_key })
    }

    /// The address signatures must recover to; derived, never configured
    pub fn signer_address(&self) -> Result<SignerAddress> {
        crate::auth::derive_signer_address(&self.secret_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
    const ADDR: &str = "0x1234567890123456789012345678901234567890";

    fn config() -> ExchangeConfig {
        ExchangeConfig {
            name: "hyperliquid".to_string(),
            testnet: false,
            api_key: ADDR.to_string(),
            secret_key: Some(PrivateKey::new(KEY).unwrap()),
            http: HttpConfig::default(),
            websocket: WsConfig::default(),
        }
    }

    #[test]
    fn test_defaults_match_contract() {
        let http = HttpConfig::default();
        assert_eq!(http.timeout_ms, 5_000);
        assert_eq!(http.rate_limit_rps, 20);

        let ws = WsConfig::default();
        assert_eq!(ws.ping_interval_ms, 30_000);
        assert_eq!(ws.reconnect_max_attempts, 10);
        assert_eq!(ws.reconnect_initial_backoff_ms, 1_000);
        assert_eq!(ws.reconnect_max_backoff_ms, 30_000);
    }

    #[test]
    fn test_url_selection() {
        let mut cfg = config();
        assert_eq!(cfg.http_url(), MAINNET_HTTP_URL);
        assert_eq!(cfg.ws_url(), MAINNET_WS_URL);
        cfg.testnet = true;
        assert_eq!(cfg.http_url(), TESTNET_HTTP_URL);
        assert_eq!(cfg.ws_url(), TESTNET_WS_URL);
        cfg.websocket.url = Some("wss://localhost:9000/ws".to_string());
        assert_eq!(cfg.ws_url(), "wss://localhost:9000/ws");
    }

    #[test]
    fn test_private_key_validation() {
        assert!(PrivateKey::new(KEY).is_ok());
        assert!(PrivateKey::new(format!("0x{KEY}")).is_ok());
        assert!(PrivateKey::new("deadbeef").is_err());
        assert!(PrivateKey::new("z".repeat(64)).is_err());
    }

    #[test]
    fn test_secret_never_leaks() {
        let key = PrivateKey::new(KEY).unwrap();
        assert!(!format!("{key:?}").contains(KEY));
        assert!(!key.to_string().contains(KEY));
        let json = serde_json::to_string(&config()).unwrap();
        assert!(!json.contains(KEY));
        assert!(json.contains("***redacted***"));
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());

        let mut bad_addr = config();
        bad_addr.api_key = "0x123".to_string();
        assert!(bad_addr.validate().is_err());

        let mut zero_timeout = config();
        zero_timeout.http.timeout_ms = 0;
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = format!(
            r#"{{"exchange":{{"name":"hyperliquid","api_key":"{ADDR}","secret_key":"{KEY}"}}}}"#
        );
        let cfg: Config = serde_json::from_str(&json).unwrap();
        assert!(!cfg.exchange.testnet);
        assert_eq!(cfg.exchange.http.timeout_ms, 5_000);
        assert!(cfg.exchange.secret_key.is_some());
    }
}
