//! Form page scraping.
//!
//! The form page embeds the CSRF token the completion endpoints check and,
//! on some deployments, the API key the submit endpoint wants. Both are
//! pulled out with ordered regex lists; the first matching pattern wins.

use std::sync::LazyLock;

use portico_core::Session;
use portico_fetch::{Cookie, FetchContext, FetchError, PortalRequest};
use regex::Regex;
use tracing::{debug, instrument};

// ============================================================================
// Patterns
// ============================================================================

const TOKEN_FIELDS: &[&str] = &["_token", "csrf_token", "authenticity_token"];

/// `name` before `value` and the reverse, for each hidden field.
fn hidden_field_patterns(field: &str) -> [String; 2] {
    let name = regex::escape(field);
    [
        format!(r#"(?is)<input[^>]*\bname\s*=\s*["']{name}["'][^>]*\bvalue\s*=\s*["']([^"']+)["']"#),
        format!(r#"(?is)<input[^>]*\bvalue\s*=\s*["']([^"']+)["'][^>]*\bname\s*=\s*["']{name}["']"#),
    ]
}

static TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let mut sources: Vec<String> = TOKEN_FIELDS
        .iter()
        .flat_map(|field| hidden_field_patterns(field))
        .collect();
    sources.push(
        r#"(?is)<meta[^>]*\bname\s*=\s*["']csrf-token["'][^>]*\bcontent\s*=\s*["']([^"']+)["']"#
            .to_string(),
    );
    sources.push(
        r#"(?is)<meta[^>]*\bcontent\s*=\s*["']([^"']+)["'][^>]*\bname\s*=\s*["']csrf-token["']"#
            .to_string(),
    );
    sources.push(r#"(?i)\bcsrfToken\s*[=:]\s*["']([^"']+)["']"#.to_string());

    sources
        .iter()
        .map(|s| Regex::new(s).expect("Invalid regex"))
        .collect()
});

static API_KEY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let mut sources = vec![r#"(?i)\bdata-api-key\s*=\s*["']([^"']+)["']"#.to_string()];
    sources.extend(hidden_field_patterns("apikey"));
    sources.push(r#"(?i)\bapi_?key["']?\s*[=:]\s*["']([A-Za-z0-9._\-]+)["']"#.to_string());

    sources
        .iter()
        .map(|s| Regex::new(s).expect("Invalid regex"))
        .collect()
});

fn first_capture(patterns: &[Regex], html: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Finds the CSRF token in a form page.
pub fn extract_token(html: &str) -> Option<String> {
    first_capture(&TOKEN_PATTERNS, html)
}

/// Finds an API key embedded in a form page.
pub fn extract_api_key(html: &str) -> Option<String> {
    first_capture(&API_KEY_PATTERNS, html)
}

// ============================================================================
// Form State
// ============================================================================

/// What the form page handed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    /// CSRF token, if the page carries one.
    pub csrf_token: Option<String>,
    /// API key, if the page carries one.
    pub api_key: Option<String>,
    /// Cookies set by the form page.
    pub extra_cookies: Vec<Cookie>,
}

impl FormState {
    /// Parses a form page body.
    pub fn from_page(html: &str, extra_cookies: Vec<Cookie>) -> Self {
        Self {
            csrf_token: extract_token(html),
            api_key: extract_api_key(html),
            extra_cookies,
        }
    }

    /// Appends the newly issued cookies to `session`.
    pub fn apply_cookies(&self, session: &mut Session) -> bool {
        if self.extra_cookies.is_empty() {
            return false;
        }
        session.merge_cookies(
            self.extra_cookies
                .iter()
                .map(|c| (c.name.as_str(), c.value.as_str())),
        );
        true
    }
}

/// Loads the form page with `session` and scrapes it.
#[instrument(skip(ctx, session))]
pub async fn harvest_form_state(
    ctx: &FetchContext,
    session: &Session,
    form_url: &str,
    operation_key: &str,
) -> Result<FormState, FetchError> {
    let response = ctx
        .engine
        .execute_with_retry(operation_key, &ctx.settings.retry, || async {
            let response = ctx
                .send(PortalRequest::get(form_url).cookie_header(&session.cookie_header))
                .await?;
            if response.is_success() {
                Ok(response)
            } else {
                Err(FetchError::from_status(response.status, "form page"))
            }
        })
        .await?;

    let state = FormState::from_page(&response.body, response.set_cookies());
    debug!(
        has_token = state.csrf_token.is_some(),
        has_api_key = state.api_key.is_some(),
        new_cookies = state.extra_cookies.len(),
        "Harvested form state"
    );
    Ok(state)
}

// ============================================================================
// Tests
// ============================================================================
