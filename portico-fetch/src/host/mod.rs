//! Host APIs for the portal provider.
//!
//! - [`http`] - Transport trait and the reqwest-backed client
//! - [`cookies`] - `Set-Cookie` parsing and `Cookie` header assembly
//! - `scripted` - In-memory transport for tests (`test-util` feature)

pub mod cookies;
pub mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

// Re-export key types
pub use cookies::{Cookie, cookies_to_header};
pub use http::{HttpClient, HttpTransport, PortalRequest, PortalResponse};
