// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Portico Fetch
//!
//! Transport and resilience infrastructure shared by the portal provider.
//!
//! ## Host APIs
//!
//! The [`host`] module abstracts the network:
//!
//! - [`host::http`] - Transport trait, request/response types and the
//!   reqwest-backed client (redirects are never followed)
//! - [`host::cookies`] - `Set-Cookie` parsing and `Cookie` header assembly
//!
//! ## Resilience
//!
//! - [`retry::RetryConfig`] - Attempt count and backoff curve
//! - [`breaker::BreakerRegistry`] - Per-operation circuit breakers
//! - [`engine::RetryEngine`] - Runs an operation under both
//!
//! ## Example
//!
//! ```ignore
//! use portico_fetch::{FetchContext, PortalRequest};
//!
//! let ctx = FetchContext::new()?;
//! let page = ctx
//!     .engine
//!     .execute_with_retry("portal.ping", &ctx.settings.retry, || {
//!         ctx.send(PortalRequest::get("https://portal.example.com/"))
//!     })
//!     .await?;
//! ```

// Core modules
pub mod breaker;
pub mod clock;
pub mod context;
pub mod engine;
pub mod error;
pub mod host;
pub mod retry;
pub mod store;

// Re-export key types at crate root

// Errors
pub use error::{FetchError, HttpError};

// Host APIs
pub use host::{
    cookies::{Cookie, cookies_to_header},
    http::{HttpClient, HttpMethod, HttpTransport, PortalRequest, PortalResponse, RequestBody},
};

#[cfg(any(test, feature = "test-util"))]
pub use host::scripted::ScriptedTransport;

// Resilience
pub use breaker::{Admission, BreakerConfig, BreakerRegistry, CircuitBreakerState, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{FetchContext, FetchContextBuilder, FetchSettings};
pub use engine::RetryEngine;
pub use retry::RetryConfig;
pub use store::KeyedStore;
