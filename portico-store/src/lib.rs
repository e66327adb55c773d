// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Portico Store
//!
//! Persistent configuration for Portico.
//!
//! This crate provides:
//!
//! - **Config**: The JSON config file and its conversion into the runtime
//!   settings of the fetch and provider crates
//! - **Persistence**: File I/O helpers for JSON data
//!
//! ## Usage
//!
//! ```ignore
//! use portico_store::Config;
//!
//! let config = Config::load().await?;
//! let settings = config.fetch_settings();
//! let profile = config.portal_profile();
//! ```

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{
    BreakerSection, Config, GeneralConfig, HttpSection, LogLevel, PortalConfig, RetrySection,
};
pub use error::StoreError;
pub use persistence::{
    default_config_dir, default_config_path, load_json, load_json_or_default, save_json,
};
