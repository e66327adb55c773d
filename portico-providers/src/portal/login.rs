//! Browser-style login.
//!
//! The portal has no token API, so a session is obtained the way a browser
//! gets one:
//!
//! 1. GET the login page and keep the load-balancer cookies it sets.
//! 2. POST the credential form with redirects disabled.
//! 3. Classify the raw response as a [`LoginOutcome`].
//! 4. Rebuild a `Cookie` header from the new session cookie, the
//!    allow-listed pre-auth cookies and the tenant cookie.

use portico_core::{CredentialIdentity, Session};
use portico_fetch::{Cookie, FetchContext, FetchError, PortalRequest, PortalResponse, cookies_to_header};
use tracing::{debug, info, instrument};

use super::descriptor::{
    AUTHENTICATED_MARKERS, PRE_AUTH_COOKIE_ALLOWLIST, PortalEndpoints, PortalProfile,
    SESSION_COOKIE_NAME, contains_marker,
};
use super::session::SessionCache;

// ============================================================================
// Login Outcome
// ============================================================================

/// What the credential POST answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// 3xx pointing somewhere other than the login page.
    RedirectedAway {
        /// Redirect target.
        location: String,
    },
    /// 3xx pointing back at the login page.
    RedirectedToLogin {
        /// Redirect target.
        location: String,
    },
    /// Plain 200; only the body tells success from a re-rendered form.
    AmbiguousOk200 {
        /// Whether the body carries logged-in markers.
        authenticated: bool,
    },
    /// Anything else.
    Other {
        /// Status code.
        status: u16,
    },
}

impl LoginOutcome {
    /// Classifies a credential POST response.
    pub fn classify(response: &PortalResponse) -> Self {
        if response.is_redirect() {
            if let Some(location) = response.location() {
                let location = location.to_string();
                return if location.to_ascii_lowercase().contains("login") {
                    Self::RedirectedToLogin { location }
                } else {
                    Self::RedirectedAway { location }
                };
            }
        }
        if response.status == 200 {
            return Self::AmbiguousOk200 {
                authenticated: contains_marker(&response.body, AUTHENTICATED_MARKERS),
            };
        }
        Self::Other {
            status: response.status,
        }
    }

    /// Decides whether the login succeeded.
    pub fn accept(&self, has_session_cookie: bool) -> Result<(), FetchError> {
        match self {
            Self::RedirectedAway { .. } | Self::AmbiguousOk200 { authenticated: true } => {
                if has_session_cookie {
                    Ok(())
                } else {
                    Err(FetchError::AuthenticationFailed(
                        "login response carried no session cookie".to_string(),
                    ))
                }
            }
            Self::RedirectedToLogin { .. } => Err(FetchError::AuthenticationFailed(
                "portal redirected back to the login page".to_string(),
            )),
            Self::AmbiguousOk200 { authenticated: false } => Err(FetchError::AuthenticationFailed(
                "login page was shown again".to_string(),
            )),
            Self::Other { status } if *status == 429 || *status >= 500 => {
                Err(FetchError::from_status(*status, "login"))
            }
            Self::Other { status } => Err(FetchError::AuthenticationFailed(format!(
                "unexpected login status {status}"
            ))),
        }
    }
}

// ============================================================================
// Cookie Composition
// ============================================================================

/// Builds the authenticated `Cookie` header.
///
/// Order: session cookie, allow-listed cookies from the login page,
/// allow-listed cookies from the login response (overriding the former),
/// tenant cookie.
pub fn compose_cookie_header(
    session_cookie: &Cookie,
    pre_auth: &[Cookie],
    issued: &[Cookie],
    tenant: &Cookie,
) -> String {
    let mut cookies = vec![session_cookie.clone()];
    cookies.extend(
        pre_auth
            .iter()
            .chain(issued)
            .filter(|c| c.name_in(PRE_AUTH_COOKIE_ALLOWLIST))
            .cloned(),
    );
    cookies.push(tenant.clone());
    cookies_to_header(&cookies)
}

fn login_fields(identity: &CredentialIdentity, locale: &str) -> Vec<(String, String)> {
    vec![
        ("loginName".to_string(), identity.username.clone()),
        ("intumitPswd".to_string(), identity.password.clone()),
        ("selectedLocale".to_string(), locale.to_string()),
        ("keepUser".to_string(), "false".to_string()),
    ]
}

// ============================================================================
// Session Emulator
// ============================================================================

/// Logs in and caches sessions per credential identity.
#[derive(Debug)]
pub struct SessionEmulator {
    profile: PortalProfile,
    cache: SessionCache,
}

impl SessionEmulator {
    /// Creates an emulator with an empty cache.
    pub fn new(profile: PortalProfile) -> Self {
        let cache = SessionCache::new(profile.session_ttl);
        Self { profile, cache }
    }

    /// Returns the portal profile.
    pub fn profile(&self) -> &PortalProfile {
        &self.profile
    }

    /// Returns the session cache.
    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Returns a live session for `identity`, logging in if needed.
    ///
    /// Concurrent calls for the same identity share one login.
    #[instrument(skip_all, fields(user = %identity.username))]
    pub async fn login(
        &self,
        ctx: &FetchContext,
        identity: &CredentialIdentity,
    ) -> Result<Session, FetchError> {
        let key = identity.session_key();
        if let Some(session) = self.cache.get(&key, ctx.clock.now()) {
            debug!(key = %key, "Reusing cached session");
            return Ok(session);
        }

        let flight = self.cache.flight(&key);
        let _guard = flight.lock().await;

        // Another caller may have finished the login while we waited.
        if let Some(session) = self.cache.get(&key, ctx.clock.now()) {
            debug!(key = %key, "Reusing session from concurrent login");
            return Ok(session);
        }

        let endpoints = self.profile.endpoints(&identity.base_url)?;
        let operation_key = format!("portal.login:{}", endpoints.host());
        let session = ctx
            .engine
            .execute_with_retry(&operation_key, &ctx.settings.retry, || {
                self.perform_login(ctx, identity, &endpoints)
            })
            .await?;

        info!(key = %key, "Logged in");
        self.cache.insert(&key, session.clone());
        Ok(session)
    }

    async fn perform_login(
        &self,
        ctx: &FetchContext,
        identity: &CredentialIdentity,
        endpoints: &PortalEndpoints,
    ) -> Result<Session, FetchError> {
        let login_url = endpoints.login_url()?;
        let tenant = &self.profile.tenant_cookie;

        let page = ctx.send(PortalRequest::get(&login_url)).await?;
        if page.status == 429 || page.status >= 500 {
            return Err(FetchError::from_status(page.status, "login page"));
        }
        let pre_auth = page.set_cookies();
        debug!(
            status = page.status,
            cookies = ?pre_auth.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Fetched login page"
        );

        let mut carried = pre_auth.clone();
        carried.push(tenant.clone());
        let response = ctx
            .send(
                PortalRequest::post(&login_url)
                    .cookie_header(&cookies_to_header(&carried))
                    .header("Referer", login_url.as_str())
                    .form(login_fields(identity, &self.profile.locale)),
            )
            .await?;

        let outcome = LoginOutcome::classify(&response);
        let issued = response.set_cookies();
        let session_cookie = issued
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(SESSION_COOKIE_NAME));
        debug!(?outcome, has_session_cookie = session_cookie.is_some(), "Login answered");

        outcome.accept(session_cookie.is_some())?;
        let session_cookie = session_cookie.ok_or_else(|| {
            FetchError::AuthenticationFailed("login response carried no session cookie".to_string())
        })?;

        let header = compose_cookie_header(session_cookie, &pre_auth, &issued, tenant);
        Ok(Session::new(header, identity.username.clone(), ctx.clock.now()))
    }

    /// Forgets the cached session for `identity`.
    pub fn clear_session(&self, identity: &CredentialIdentity) -> bool {
        let key = identity.session_key();
        let removed = self.cache.remove(&key);
        if removed {
            debug!(key = %key, "Session cleared");
        }
        removed
    }

    /// Pushes the expiry of the cached session for `identity` out by a TTL.
    pub fn extend_session(&self, ctx: &FetchContext, identity: &CredentialIdentity) -> bool {
        self.cache.touch(&identity.session_key(), ctx.clock.now())
    }

    /// Replaces the cached session for `identity`.
    pub fn store_session(&self, identity: &CredentialIdentity, session: Session) {
        self.cache.insert(&identity.session_key(), session);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect(location: &str) -> PortalResponse {
        PortalResponse::new(302).with_header("location", location)
    }

    #[test]
    fn test_classify_redirects() {
        assert_eq!(
            LoginOutcome::classify(&redirect("/wise/wiseadm/s/portal")),
            LoginOutcome::RedirectedAway {
                location: "/wise/wiseadm/s/portal".into()
            }
        );
        assert_eq!(
            LoginOutcome::classify(&redirect("/wise/wiseadm/s/Login?error=1")),
            LoginOutcome::RedirectedToLogin {
                location: "/wise/wiseadm/s/Login?error=1".into()
            }
        );
    }

    #[test]
    fn test_classify_200() {
        let ok = PortalResponse::new(200).with_body("<a href='/logout'>Logout</a>");
        let form = PortalResponse::new(200).with_body("<input name=\"intumitPswd\">");
        assert_eq!(
            LoginOutcome::classify(&ok),
            LoginOutcome::AmbiguousOk200 { authenticated: true }
        );
        assert_eq!(
            LoginOutcome::classify(&form),
            LoginOutcome::AmbiguousOk200 { authenticated: false }
        );
    }

    #[test]
    fn test_redirect_without_location_is_other() {
        assert_eq!(
            LoginOutcome::classify(&PortalResponse::new(302)),
            LoginOutcome::Other { status: 302 }
        );
    }

    #[test]
    fn test_accept() {
        let away = LoginOutcome::RedirectedAway {
            location: "/portal".into(),
        };
        assert!(away.accept(true).is_ok());
        assert!(away.accept(false).unwrap_err().is_authentication());

        let back = LoginOutcome::RedirectedToLogin {
            location: "/login".into(),
        };
        assert!(back.accept(true).unwrap_err().is_authentication());

        assert!(LoginOutcome::Other { status: 503 }.accept(true).unwrap_err().is_retryable());
        assert!(LoginOutcome::Other { status: 429 }.accept(true).unwrap_err().is_retryable());
        assert!(LoginOutcome::Other { status: 400 }.accept(true).unwrap_err().is_authentication());
    }

    #[test]
    fn test_compose_cookie_header() {
        let header = compose_cookie_header(
            &Cookie::new("JSESSIONID", "s1"),
            &[Cookie::new("AWSALB", "old"), Cookie::new("tracking", "x")],
            &[Cookie::new("JSESSIONID", "s1"), Cookie::new("AWSALB", "new")],
            &Cookie::new("tenantUuid", "t"),
        );
        assert_eq!(header, "JSESSIONID=s1; AWSALB=new; tenantUuid=t");
    }
}
