//! Domain models for Portico.
//!
//! ## Submodules
//!
//! - [`credentials`] - Credential identity and the derived session key
//! - [`session`] - Authenticated portal session
//! - [`reply`] - Attachments and completion replies

mod credentials;
mod reply;
mod session;

pub use credentials::{CredentialIdentity, SessionKey};
pub use reply::{ApiReply, Attachment, ChatReply};
pub use session::Session;
