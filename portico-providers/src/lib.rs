// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Portico Providers
//!
//! Session emulation and completion orchestration for the Portal AI
//! backend.
//!
//! The [`portal`] module holds everything specific to the portal: page
//! paths and markers, the browser-style login, the access check, form page
//! scraping, the completion endpoint candidates and the reply extractor.
//! [`portal::PortalChat`] ties them together behind one `send_chat` call.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use portico_core::CredentialIdentity;
//! use portico_fetch::FetchContext;
//! use portico_providers::portal::{PortalChat, PortalProfile};
//!
//! let ctx = Arc::new(FetchContext::new()?);
//! let chat = PortalChat::new(ctx, PortalProfile::default());
//! let identity = CredentialIdentity::new("alice", "secret", "https://ai.example.com")?;
//! let reply = chat.send_chat("Hello", &identity, "42", None).await?;
//! ```

pub mod portal;

// Re-export key types
pub use portal::{MODEL_LABEL, PortalChat, PortalEndpoints, PortalPaths, PortalProfile};
