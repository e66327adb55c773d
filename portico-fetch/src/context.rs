//! Fetch context providing access to host APIs.
//!
//! The context is created once per process and shared by every request.
//! It owns the transport, the clock and the retry engine (and with it the
//! breaker table), so tests can swap any of them through the builder.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::BreakerConfig;
use crate::clock::{Clock, SystemClock};
use crate::engine::RetryEngine;
use crate::error::FetchError;
use crate::host::http::{HttpClient, HttpTransport, PortalRequest, PortalResponse};
use crate::retry::RetryConfig;

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for portal operations.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Upper bound on a whole completion call across all candidates.
    pub completion_deadline: Duration,
    /// Retry policy for login, verification and form requests.
    pub retry: RetryConfig,
    /// Breaker thresholds.
    pub breaker: BreakerConfig,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            completion_deadline: Duration::from_secs(180),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl FetchSettings {
    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the completion deadline.
    #[must_use]
    pub fn with_completion_deadline(mut self, deadline: Duration) -> Self {
        self.completion_deadline = deadline;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the breaker thresholds.
    #[must_use]
    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// Shared host APIs for portal operations.
pub struct FetchContext {
    /// Network transport.
    pub http: Arc<dyn HttpTransport>,
    /// Time source for TTLs and cool-downs.
    pub clock: Arc<dyn Clock>,
    /// Retry engine and breaker table.
    pub engine: Arc<RetryEngine>,
    /// Fetch settings.
    pub settings: FetchSettings,
}

impl FetchContext {
    /// Creates a context with the reqwest transport and default settings.
    pub fn new() -> Result<Self, FetchError> {
        Self::builder().build()
    }

    /// Creates a builder for customizing the context.
    pub fn builder() -> FetchContextBuilder {
        FetchContextBuilder::new()
    }

    /// Sends one request through the transport, without retries.
    pub async fn send(&self, request: PortalRequest) -> Result<PortalResponse, FetchError> {
        Ok(self.http.send(request).await?)
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch Context Builder
// ============================================================================

/// Builder for constructing a `FetchContext`.
#[derive(Default)]
pub struct FetchContextBuilder {
    http: Option<Arc<dyn HttpTransport>>,
    clock: Option<Arc<dyn Clock>>,
    allowed_domains: Option<Vec<String>>,
    settings: FetchSettings,
}

impl FetchContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport.
    #[must_use]
    pub fn http(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Restricts the default transport to these domains.
    #[must_use]
    pub fn allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    /// Sets the fetch settings.
    #[must_use]
    pub fn settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.settings.retry = retry;
        self
    }

    /// Sets the breaker thresholds.
    #[must_use]
    pub fn breaker(mut self, breaker: BreakerConfig) -> Self {
        self.settings.breaker = breaker;
        self
    }

    /// Builds the fetch context.
    pub fn build(self) -> Result<FetchContext, FetchError> {
        let http: Arc<dyn HttpTransport> = match self.http {
            Some(http) => http,
            None => {
                let mut client = HttpClient::with_timeout(self.settings.timeout)?;
                if let Some(domains) = self.allowed_domains {
                    client = client.with_allowed_domains(domains);
                }
                Arc::new(client)
            }
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let engine = Arc::new(RetryEngine::new(
            self.settings.breaker.clone(),
            Arc::clone(&clock),
        ));

        Ok(FetchContext {
            http,
            clock,
            engine,
            settings: self.settings,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
