//! Static description of the portal: paths, cookie names and page markers.
//!
//! Everything here is a default. [`PortalProfile`] carries the values that
//! the configuration file may override, and [`PortalEndpoints`] binds a
//! profile to one base URL.

use std::time::Duration;

use portico_fetch::{Cookie, FetchError};
use url::Url;

// ============================================================================
// Constants
// ============================================================================

/// Login page; credentials are posted to the same URL.
pub const DEFAULT_LOGIN_PATH: &str = "/wise/wiseadm/s/login";

/// Landing page used to confirm portal access.
pub const DEFAULT_PORTAL_PATH: &str = "/wise/wiseadm/s/portal";

/// Form page scraped for CSRF state.
pub const DEFAULT_FORM_PATH: &str = "/wise/wiseadm/s/portal/form";

/// Form-encoded upload candidate.
pub const DEFAULT_UPLOAD_PATH: &str = "/wise/wiseadm/s/portal/form/upload";

/// Form-encoded submit candidate.
pub const DEFAULT_SUBMIT_PATH: &str = "/wise/wiseadm/s/portal/form/submit";

/// JSON execute candidate.
pub const DEFAULT_EXECUTE_PATH: &str = "/wise/wiseadm/s/api/form/execute";

/// JSON run candidate; `{formId}` is substituted.
pub const DEFAULT_RUN_PATH: &str = "/wise/wiseadm/s/api/v1/forms/{formId}/run";

/// Session cookie issued on a successful login.
pub const SESSION_COOKIE_NAME: &str = "JSESSIONID";

/// Pre-auth cookies carried over from the login page.
pub const PRE_AUTH_COOKIE_ALLOWLIST: &[&str] =
    &["AWSALB", "AWSALBCORS", "XSRF-TOKEN", "SERVERID", "route"];

/// Tenant cookie sent with every authenticated request.
pub const DEFAULT_TENANT_COOKIE: (&str, &str) = ("tenantUuid", "default");

/// Locale posted with the credentials.
pub const DEFAULT_LOCALE: &str = "zh_TW";

/// Idle time after which a cached session is discarded.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Text that only appears once logged in.
pub const AUTHENTICATED_MARKERS: &[&str] = &["logout", "登出", "portal-container"];

/// Text that identifies the portal landing page.
pub const PORTAL_MARKERS: &[&str] = &["portal-container", "portal/form?id=", "data-form-id"];

/// Text that identifies the login page.
pub const LOGIN_PAGE_MARKERS: &[&str] = &["intumitPswd", "name=\"loginName\"", "login-form"];

/// Returns true if `body` contains any marker (ASCII case-insensitive).
pub fn contains_marker(body: &str, markers: &[&str]) -> bool {
    let haystack = body.to_lowercase();
    markers
        .iter()
        .any(|marker| haystack.contains(&marker.to_lowercase()))
}

// ============================================================================
// Paths
// ============================================================================

/// Relative paths of every portal page the client touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalPaths {
    /// Login page and credential submit.
    pub login: String,
    /// Access check page.
    pub portal: String,
    /// Form page.
    pub form: String,
    /// Upload candidate.
    pub upload: String,
    /// Submit candidate.
    pub submit: String,
    /// Execute candidate.
    pub execute: String,
    /// Run candidate template.
    pub run: String,
}

impl Default for PortalPaths {
    fn default() -> Self {
        Self {
            login: DEFAULT_LOGIN_PATH.to_string(),
            portal: DEFAULT_PORTAL_PATH.to_string(),
            form: DEFAULT_FORM_PATH.to_string(),
            upload: DEFAULT_UPLOAD_PATH.to_string(),
            submit: DEFAULT_SUBMIT_PATH.to_string(),
            execute: DEFAULT_EXECUTE_PATH.to_string(),
            run: DEFAULT_RUN_PATH.to_string(),
        }
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Deployment-specific portal settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalProfile {
    /// Page paths.
    pub paths: PortalPaths,
    /// Tenant cookie.
    pub tenant_cookie: Cookie,
    /// Locale posted at login.
    pub locale: String,
    /// Session idle TTL.
    pub session_ttl: Duration,
    /// Attempts per completion candidate.
    pub candidate_attempts: u32,
    /// API key to use instead of one discovered on the form page.
    pub api_key: Option<String>,
}

impl Default for PortalProfile {
    fn default() -> Self {
        Self {
            paths: PortalPaths::default(),
            tenant_cookie: Cookie::new(DEFAULT_TENANT_COOKIE.0, DEFAULT_TENANT_COOKIE.1),
            locale: DEFAULT_LOCALE.to_string(),
            session_ttl: DEFAULT_SESSION_TTL,
            candidate_attempts: 2,
            api_key: None,
        }
    }
}

impl PortalProfile {
    /// Binds the profile to a base URL.
    pub fn endpoints(&self, base_url: &str) -> Result<PortalEndpoints, FetchError> {
        PortalEndpoints::new(base_url, self.paths.clone())
    }
}

// ============================================================================
// Endpoints
// ============================================================================

/// Absolute URLs for one portal deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalEndpoints {
    base: Url,
    paths: PortalPaths,
}

impl PortalEndpoints {
    /// Creates endpoints for `base_url`.
    pub fn new(base_url: &str, paths: PortalPaths) -> Result<Self, FetchError> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| FetchError::Validation(format!("invalid base URL {base_url}: {e}")))?;
        if base.host_str().is_none() {
            return Err(FetchError::Validation(format!("base URL has no host: {base_url}")));
        }
        Ok(Self { base, paths })
    }

    /// Host name, used in operation keys.
    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    fn with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<String, FetchError> {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{path}"));
        url.set_query(None);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        if url.cannot_be_a_base() {
            return Err(FetchError::Validation(format!("cannot build URL for {path}")));
        }
        Ok(url.into())
    }

    /// Login page and credential submit URL.
    pub fn login_url(&self) -> Result<String, FetchError> {
        self.with_query(&self.paths.login, &[])
    }

    /// Access check URL.
    pub fn portal_url(&self) -> Result<String, FetchError> {
        self.with_query(&self.paths.portal, &[])
    }

    /// Form page URL.
    pub fn form_url(&self, form_id: &str) -> Result<String, FetchError> {
        self.with_query(&self.paths.form, &[("id", form_id)])
    }

    /// Upload candidate URL.
    pub fn upload_url(&self, form_id: &str) -> Result<String, FetchError> {
        self.with_query(&self.paths.upload, &[("id", form_id)])
    }

    /// Submit candidate URL; the API key rides along as a query parameter.
    pub fn submit_url(&self, form_id: &str, api_key: Option<&str>) -> Result<String, FetchError> {
        match api_key {
            Some(key) => self.with_query(&self.paths.submit, &[("id", form_id), ("apikey", key)]),
            None => self.with_query(&self.paths.submit, &[("id", form_id)]),
        }
    }

    /// Execute candidate URL.
    pub fn execute_url(&self) -> Result<String, FetchError> {
        self.with_query(&self.paths.execute, &[])
    }

    /// Run candidate URL.
    pub fn run_url(&self, form_id: &str) -> Result<String, FetchError> {
        let encoded: String = url::form_urlencoded::byte_serialize(form_id.as_bytes()).collect();
        self.with_query(&self.paths.run.replace("{formId}", &encoded), &[])
    }
}
