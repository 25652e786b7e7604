//! Error types for the Hyperliquid trading engine
//!
//! Every public operation in this crate returns a discriminated error from
//! this module. Errors are grouped by category so callers can match on the
//! class of failure without inspecting message strings.

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, HyperfillError>;

/// Network-level failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// Could not establish a connection
    ConnectionFailed,
    /// The request timed out; the action may still have executed
    RequestTimeout,
    /// An established connection dropped mid-operation
    ConnectionLost,
}

/// Protocol-level failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// Response body did not match any expected shape
    InvalidResponse,
    /// Order response shape mismatch (neither resting, filled, nor error)
    InvalidOrderResponse,
    /// The shared token bucket is exhausted or the venue returned 429
    RateLimited,
    /// The venue rejected the action signature
    SignatureRejected,
}

/// Authentication failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// The action requires signing but no secret key is configured
    SignerRequired,
    /// Master / API-wallet addresses were mixed up
    AddressMismatch,
}

/// Data validation failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataErrorKind {
    /// Malformed numeric or structural input
    InvalidFormat,
    /// Unknown or unparseable trading pair
    InvalidPair,
    /// Price is not aligned to the venue tick size
    InvalidTickSize,
    /// The order book cannot absorb the requested quantity
    InsufficientLiquidity,
}

/// Business rejection kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessErrorKind {
    /// The exchange rejected the order; the message carries its reason
    OrderRejected,
    OrderNotFound,
    /// Cancel requested for an order already in a terminal state
    OrderNotCancellable,
    InsufficientBalance,
    PositionNotFound,
}

/// Arithmetic failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticErrorKind {
    /// i128 overflow in scaled fixed-point arithmetic
    Overflow,
    DivisionByZero,
}

/// System failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemErrorKind {
    OutOfMemory,
    IoError,
    ConfigError,
    /// An internal invariant was violated; indicates an upstream bug
    InvariantViolated,
}

/// Top-level error type for the trading engine
#[derive(Debug, Clone, Error)]
pub enum HyperfillError {
    #[error("network error ({kind:?}): {message}")]
    Network {
        message: String,
        kind: NetworkErrorKind,
    },

    #[error("protocol error ({kind:?}): {message}")]
    Protocol {
        message: String,
        kind: ProtocolErrorKind,
    },

    #[error("authentication error ({kind:?}): {message}")]
    Auth {
        message: String,
        kind: AuthErrorKind,
    },

    #[error("data error ({kind:?}): {message}")]
    Data {
        message: String,
        kind: DataErrorKind,
    },

    #[error("business error ({kind:?}): {message}")]
    Business {
        message: String,
        kind: BusinessErrorKind,
    },

    #[error("arithmetic error: {kind:?}")]
    Arithmetic { kind: ArithmeticErrorKind },

    #[error("system error ({kind:?}): {message}")]
    System {
        message: String,
        kind: SystemErrorKind,
    },
}

impl HyperfillError {
    pub fn network(message: impl Into<String>, kind: NetworkErrorKind) -> Self {
        Self::Network {
            message: message.into(),
            kind,
        }
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::network(message, NetworkErrorKind::ConnectionFailed)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::network(message, NetworkErrorKind::RequestTimeout)
    }

    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::network(message, NetworkErrorKind::ConnectionLost)
    }

    pub fn protocol(message: impl Into<String>, kind: ProtocolErrorKind) -> Self {
        Self::Protocol {
            message: message.into(),
            kind,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::protocol(message, ProtocolErrorKind::InvalidResponse)
    }

    pub fn invalid_order_response(message: impl Into<String>) -> Self {
        Self::protocol(message, ProtocolErrorKind::InvalidOrderResponse)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::protocol(message, ProtocolErrorKind::RateLimited)
    }

    pub fn signature_rejected(message: impl Into<String>) -> Self {
        Self::protocol(message, ProtocolErrorKind::SignatureRejected)
    }

    pub fn signer_required() -> Self {
        Self::Auth {
            message: "action requires signing but no secret key is configured".to_string(),
            kind: AuthErrorKind::SignerRequired,
        }
    }

    pub fn address_mismatch(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            kind: AuthErrorKind::AddressMismatch,
        }
    }

    pub fn data(message: impl Into<String>, kind: DataErrorKind) -> Self {
        Self::Data {
            message: message.into(),
            kind,
        }
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::data(message, DataErrorKind::InvalidFormat)
    }

    pub fn invalid_pair(message: impl Into<String>) -> Self {
        Self::data(message, DataErrorKind::InvalidPair)
    }

    pub fn invalid_tick_size(message: impl Into<String>) -> Self {
        Self::data(message, DataErrorKind::InvalidTickSize)
    }

    pub fn insufficient_liquidity(message: impl Into<String>) -> Self {
        Self::data(message, DataErrorKind::InsufficientLiquidity)
    }

    pub fn business(message: impl Into<String>, kind: BusinessErrorKind) -> Self {
        Self::Business {
            message: message.into(),
            kind,
        }
    }

    pub fn order_rejected(message: impl Into<String>) -> Self {
        Self::business(message, BusinessErrorKind::OrderRejected)
    }

    pub fn order_not_found(message: impl Into<String>) -> Self {
        Self::business(message, BusinessErrorKind::OrderNotFound)
    }

    pub fn order_not_cancellable(message: impl Into<String>) -> Self {
        Self::business(message, BusinessErrorKind::OrderNotCancellable)
    }

    pub fn position_not_found(message: impl Into<String>) -> Self {
        Self::business(message, BusinessErrorKind::PositionNotFound)
    }

    pub fn overflow() -> Self {
        Self::Arithmetic {
            kind: ArithmeticErrorKind::Overflow,
        }
    }

    pub fn division_by_zero() -> Self {
        Self::Arithmetic {
            kind: ArithmeticErrorKind::DivisionByZero,
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
            kind: SystemErrorKind::IoError,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
            kind: SystemErrorKind::ConfigError,
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
            kind: SystemErrorKind::InvariantViolated,
        }
    }

    /// Whether a retry of the failed operation can reasonably succeed.
    ///
    /// Business rejections and validation failures are never retryable; the
    /// caller has to change something first. Network blips and rate limits
    /// are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Protocol { kind, .. } => matches!(kind, ProtocolErrorKind::RateLimited),
            _ => false,
        }
    }

    /// Whether the failed request may nonetheless have executed on the venue.
    ///
    /// Callers seeing `true` must reconcile against the exchange before
    /// resubmitting a non-idempotent action.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Self::Network {
                kind: NetworkErrorKind::RequestTimeout | NetworkErrorKind::ConnectionLost,
                ..
            }
        )
    }
}

impl From<reqwest::Error> for HyperfillError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if err.is_connect() {
            Self::connection_failed(err.to_string())
        } else {
            Self::connection_lost(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HyperfillError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_response(format!("JSON error: {err}"))
    }
}

impl From<std::io::Error> for HyperfillError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

#[cfg(feature = "stream")]
impl From<tokio_tungstenite::tungstenite::Error> for HyperfillError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                Self::connection_lost("WebSocket connection closed")
            }
            other => Self::connection_failed(format!("WebSocket error: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(HyperfillError::timeout("t").is_retryable());
        assert!(HyperfillError::rate_limited("slow down").is_retryable());
        assert!(!HyperfillError::order_rejected("insufficient margin").is_retryable());
        assert!(!HyperfillError::overflow().is_retryable());
        assert!(!HyperfillError::invariant("reduce below zero").is_retryable());
    }

    #[test]
    fn test_ambiguous_classification() {
        assert!(HyperfillError::timeout("t").is_ambiguous());
        assert!(!HyperfillError::connection_failed("refused").is_ambiguous());
        assert!(!HyperfillError::rate_limited("429").is_ambiguous());
    }

    #[test]
    fn test_display_carries_kind_and_message() {
        let err = HyperfillError::order_rejected("Insufficient margin");
        let text = err.to_string();
        assert!(text.contains("OrderRejected"));
        assert!(text.contains("Insufficient margin"));
    }
}
