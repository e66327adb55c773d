//! Portal provider.
//!
//! The portal is a server-rendered admin UI with an AI form runner behind
//! it. It has no documented API, so this module drives it like a browser:
//!
//! ## Flow
//!
//! 1. **Login** ([`SessionEmulator`]): GET the login page, POST the
//!    credential form, rebuild the `Cookie` header. Sessions are cached per
//!    identity and expire after an idle TTL.
//! 2. **Verify** ([`verify_access`]): load the landing page and check for
//!    portal markers. A failed check triggers one fresh login.
//! 3. **Harvest** ([`harvest_form_state`]): scrape the CSRF token and API
//!    key off the form page.
//! 4. **Complete** ([`complete`]): try the four completion endpoints in
//!    priority order until one returns reply text.
//!
//! Every network step runs through the retry engine under its own
//! operation key, so a dead endpoint trips only its own breaker.
//!
//! ## Usage
//!
//! ```ignore
//! use portico_providers::portal::{PortalChat, PortalProfile};
//!
//! let chat = PortalChat::new(Arc::new(FetchContext::new()?), PortalProfile::default());
//! let reply = chat.send_chat("Summarize this", &identity, "42", None).await?;
//! println!("{}: {}", reply.model_label, reply.reply);
//! ```

// Modules
mod candidates;
mod descriptor;
mod form_state;
mod login;
mod orchestrator;
mod reply;
mod service;
mod session;
mod verify;

// Re-exports
pub use candidates::{
    API_KEY_HEADER, CSRF_HEADER, CandidateEndpoint, CompletionRequest, PayloadEncoding,
    build_candidates,
};
pub use descriptor::{
    AUTHENTICATED_MARKERS, DEFAULT_LOCALE, DEFAULT_SESSION_TTL, DEFAULT_TENANT_COOKIE,
    LOGIN_PAGE_MARKERS, PORTAL_MARKERS, PRE_AUTH_COOKIE_ALLOWLIST, PortalEndpoints, PortalPaths,
    PortalProfile, SESSION_COOKIE_NAME, contains_marker,
};
pub use form_state::{FormState, extract_api_key, extract_token, harvest_form_state};
pub use login::{LoginOutcome, SessionEmulator, compose_cookie_header};
pub use orchestrator::{complete, read_reply};
pub use reply::{REPLY_FIELDS, extract_reply};
pub use service::{MODEL_LABEL, PortalChat};
pub use session::SessionCache;
pub use verify::{grants_access, verify_access};
