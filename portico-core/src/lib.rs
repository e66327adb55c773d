// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `Portico` Core
//!
//! Core types and models shared by every `Portico` crate.
//!
//! ## Key Types
//!
//! ### Identity & Sessions
//! - [`CredentialIdentity`] - Username, password and portal base URL
//! - [`SessionKey`] - Stable hashed key derived from an identity
//! - [`Session`] - Composite cookie header plus lifetime bookkeeping
//!
//! ### Conversation
//! - [`Attachment`] - A file sent along with a prompt
//! - [`ApiReply`] - Text extracted from a completion endpoint
//! - [`ChatReply`] - What the chat surface displays

pub mod error;
pub mod models;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{ApiReply, Attachment, ChatReply, CredentialIdentity, Session, SessionKey};
