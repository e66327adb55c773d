//! Configuration management.
//!
//! The config file is JSON with one section per concern. Every field has a
//! default, so a missing file, a missing section or a missing key all fall
//! back to the built-in values. Credentials are never stored here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use portico_fetch::{BreakerConfig, Cookie, FetchSettings, RetryConfig};
use portico_providers::portal::{
    DEFAULT_LOCALE, DEFAULT_SESSION_TTL, DEFAULT_TENANT_COOKIE, PortalPaths, PortalProfile,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;
use crate::persistence::{default_config_path, load_json_or_default, save_json};

// ============================================================================
// Sections
// ============================================================================

/// Portal location and page layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Base URL, e.g. `https://ai.example.com`.
    pub base_url: Option<String>,
    /// Form to run when none is given on the command line.
    pub form_id: Option<String>,
    /// API key for the submit endpoint; discovered from the form page if unset.
    pub api_key: Option<String>,
    /// Login page path.
    pub login_path: String,
    /// Portal landing page path.
    pub portal_path: String,
    /// Form page path.
    pub form_path: String,
    /// Upload candidate path.
    pub upload_path: String,
    /// Submit candidate path.
    pub submit_path: String,
    /// Execute candidate path.
    pub execute_path: String,
    /// Run candidate path template (`{formId}` is substituted).
    pub run_path: String,
    /// Tenant cookie name.
    pub tenant_cookie_name: String,
    /// Tenant cookie value.
    pub tenant_cookie_value: String,
    /// Locale posted at login.
    pub locale: String,
    /// Session idle TTL in seconds.
    pub session_ttl_secs: u64,
    /// Attempts per completion candidate.
    pub candidate_attempts: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        let paths = PortalPaths::default();
        Self {
            base_url: None,
            form_id: None,
            api_key: None,
            login_path: paths.login,
            portal_path: paths.portal,
            form_path: paths.form,
            upload_path: paths.upload,
            submit_path: paths.submit,
            execute_path: paths.execute,
            run_path: paths.run,
            tenant_cookie_name: DEFAULT_TENANT_COOKIE.0.to_string(),
            tenant_cookie_value: DEFAULT_TENANT_COOKIE.1.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL.as_secs(),
            candidate_attempts: PortalProfile::default().candidate_attempts,
        }
    }
}

/// Retry backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Attempts per operation, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Delay cap, in milliseconds.
    pub max_delay_ms: u64,
    /// Upper bound of the random jitter, in milliseconds.
    pub jitter_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetrySection {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: millis(config.base_delay),
            multiplier: config.multiplier,
            max_delay_ms: millis(config.max_delay),
            jitter_ms: millis(config.jitter),
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSection {
    /// Consecutive failures that open a breaker.
    pub failure_threshold: u32,
    /// Cool-down before a trial call, in seconds.
    pub cooldown_secs: u64,
}

impl Default for BreakerSection {
    fn default() -> Self {
        let config = BreakerConfig::default();
        Self {
            failure_threshold: config.failure_threshold,
            cooldown_secs: config.cooldown.as_secs(),
        }
    }
}

/// Network timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
    /// Bound on a whole completion call, in seconds.
    pub completion_deadline_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        let settings = FetchSettings::default();
        Self {
            timeout_secs: settings.timeout.as_secs(),
            completion_deadline_secs: settings.completion_deadline.as_secs(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Error level logging.
    Error,
    /// Warning level logging.
    #[default]
    Warn,
    /// Info level logging.
    Info,
    /// Debug level logging.
    Debug,
    /// Trace level logging.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

/// General settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level used when neither `--verbose` nor `--quiet` is given.
    pub log_level: LogLevel,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Config
// ============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Portal location and layout.
    pub portal: PortalConfig,
    /// Retry backoff.
    pub retry: RetrySection,
    /// Breaker thresholds.
    pub breaker: BreakerSection,
    /// Timeouts.
    pub http: HttpSection,
    /// General settings.
    pub general: GeneralConfig,
}

impl Config {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        default_config_path()
    }

    /// Loads configuration from the default path.
    pub async fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path()).await
    }

    /// Loads and validates configuration from a specific path.
    ///
    /// A missing file yields the defaults.
    pub async fn load_from(path: &Path) -> Result<Self, StoreError> {
        let config: Config = load_json_or_default(path).await?;
        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to the default path.
    pub async fn save(&self) -> Result<(), StoreError> {
        self.save_to(&Self::default_path()).await
    }

    /// Saves configuration to a specific path.
    pub async fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        self.validate()?;
        save_json(path, self).await?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Rejects values the client cannot work with.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.retry.max_attempts == 0 {
            return Err(StoreError::Config("retry.max_attempts must be at least 1".into()));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(StoreError::Config("retry.multiplier must be at least 1.0".into()));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(StoreError::Config(
                "breaker.failure_threshold must be at least 1".into(),
            ));
        }
        if self.portal.candidate_attempts == 0 {
            return Err(StoreError::Config(
                "portal.candidate_attempts must be at least 1".into(),
            ));
        }
        if self.http.timeout_secs == 0 || self.http.completion_deadline_secs == 0 {
            return Err(StoreError::Config("http timeouts must be positive".into()));
        }
        if self.portal.session_ttl_secs == 0 {
            return Err(StoreError::Config("portal.session_ttl_secs must be positive".into()));
        }
        if let Some(url) = &self.portal.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(StoreError::Config(format!("portal.base_url is not http(s): {url}")));
            }
        }
        Ok(())
    }

    /// Retry policy.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.retry.max_attempts)
            .with_base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .with_multiplier(self.retry.multiplier)
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .with_jitter(Duration::from_millis(self.retry.jitter_ms))
    }

    /// Breaker thresholds.
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker.failure_threshold,
            cooldown: Duration::from_secs(self.breaker.cooldown_secs),
        }
    }

    /// Settings for the fetch context.
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings::default()
            .with_timeout(Duration::from_secs(self.http.timeout_secs))
            .with_completion_deadline(Duration::from_secs(self.http.completion_deadline_secs))
            .with_retry(self.retry_config())
            .with_breaker(self.breaker_config())
    }

    /// Portal profile.
    pub fn portal_profile(&self) -> PortalProfile {
        let p = &self.portal;
        PortalProfile {
            paths: PortalPaths {
                login: p.login_path.clone(),
                portal: p.portal_path.clone(),
                form: p.form_path.clone(),
                upload: p.upload_path.clone(),
                submit: p.submit_path.clone(),
                execute: p.execute_path.clone(),
                run: p.run_path.clone(),
            },
            tenant_cookie: Cookie::new(&p.tenant_cookie_name, &p.tenant_cookie_value),
            locale: p.locale.clone(),
            session_ttl: Duration::from_secs(p.session_ttl_secs),
            candidate_attempts: p.candidate_attempts,
            api_key: p.api_key.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
