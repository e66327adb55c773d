//! Fetch error types.

use std::time::Duration;

use portico_core::CoreError;
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for every outbound portal operation.
///
/// The variants form the retry taxonomy: [`FetchError::is_retryable`]
/// decides whether the retry engine spends another attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Bad input. Never retried.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Login or access was denied. Never retried.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The upstream answered with an unexpected status code.
    #[error("Upstream returned HTTP {status} from {context}")]
    UpstreamStatus {
        /// HTTP status code.
        status: u16,
        /// What was being requested.
        context: String,
    },

    /// A request or the overall call ran past its deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The response arrived but could not be used.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The breaker for this operation is suppressing calls.
    #[error("Circuit open for {key}, retry in {retry_in:?}")]
    CircuitOpen {
        /// Operation key of the open breaker.
        key: String,
        /// Time left until the breaker admits a trial call.
        retry_in: Duration,
    },

    /// Every completion endpoint failed.
    #[error("All completion endpoints failed after {attempts} attempts: {last_cause}")]
    AiService {
        /// Number of candidates tried.
        attempts: usize,
        /// Display form of the last candidate's error.
        last_cause: String,
    },
}

impl FetchError {
    /// Builds the error for a non-success status code.
    pub fn from_status(status: u16, context: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(format!("HTTP {status} from {}", context.into())),
            _ => Self::UpstreamStatus {
                status,
                context: context.into(),
            },
        }
    }

    /// Returns true if another attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Validation(_)
            | Self::AuthenticationFailed(_)
            | Self::InvalidResponse(_)
            | Self::CircuitOpen { .. }
            | Self::AiService { .. } => false,
        }
    }

    /// Returns true if this error was raised by an open breaker rather than
    /// by a call that actually went out.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns true for login or access denials.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}

impl From<CoreError> for FetchError {
    fn from(err: CoreError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Timeout(after) => Self::Timeout(after),
            HttpError::Request(e) if e.is_timeout() => Self::Timeout(Duration::ZERO),
            HttpError::Request(e) => Self::Network(e.to_string()),
            HttpError::Transport(msg) => Self::Network(msg),
            HttpError::InvalidUrl(msg) | HttpError::InvalidHeader(msg) => Self::Validation(msg),
            HttpError::DomainNotAllowed(host) => {
                Self::Validation(format!("domain not allowed: {host}"))
            }
        }
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP transport error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Transport failure outside reqwest (scripted transports, proxies).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A header name or value could not be encoded.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(FetchError::from_status(503, "x").is_retryable());
        assert!(FetchError::from_status(429, "x").is_retryable());
        assert!(!FetchError::from_status(404, "x").is_retryable());
        assert!(FetchError::from_status(401, "x").is_authentication());
        assert!(FetchError::from_status(403, "x").is_authentication());
    }

    #[test]
    fn test_terminal_errors_not_retryable() {
        assert!(!FetchError::Validation("x".into()).is_retryable());
        assert!(!FetchError::AuthenticationFailed("x".into()).is_retryable());
        assert!(!FetchError::InvalidResponse("x".into()).is_retryable());
        assert!(
            !FetchError::AiService {
                attempts: 4,
                last_cause: "x".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_circuit_open_is_distinct_from_network() {
        let open = FetchError::CircuitOpen {
            key: "k".into(),
            retry_in: Duration::from_secs(3),
        };
        assert!(open.is_circuit_open());
        assert!(!open.is_retryable());
        assert!(!FetchError::Network("reset".into()).is_circuit_open());
    }

    #[test]
    fn test_http_error_mapping() {
        let err: FetchError = HttpError::Transport("connection refused".into()).into();
        assert!(matches!(err, FetchError::Network(_)));
        assert!(err.is_retryable());

        let err: FetchError = HttpError::Timeout(Duration::from_secs(5)).into();
        assert!(matches!(err, FetchError::Timeout(_)));

        let err: FetchError = HttpError::InvalidUrl("nope".into()).into();
        assert!(matches!(err, FetchError::Validation(_)));
    }
}
