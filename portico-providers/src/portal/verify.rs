//! Portal access check.

use portico_core::Session;
use portico_fetch::{FetchContext, FetchError, PortalRequest, PortalResponse};
use tracing::{debug, warn};

use super::descriptor::{LOGIN_PAGE_MARKERS, PORTAL_MARKERS, PortalEndpoints, contains_marker};

/// Returns true if a portal page proves the session is usable.
pub fn grants_access(response: &PortalResponse) -> bool {
    response.status == 200
        && contains_marker(&response.body, PORTAL_MARKERS)
        && !contains_marker(&response.body, LOGIN_PAGE_MARKERS)
}

/// Loads the portal landing page with `session` and inspects it.
///
/// `Ok(false)` means the portal answered but did not grant access. Network
/// failures, retryable statuses and open breakers come back as errors so
/// that callers can tell an outage from a dead session.
pub(crate) async fn check_access(
    ctx: &FetchContext,
    endpoints: &PortalEndpoints,
    session: &Session,
) -> Result<bool, FetchError> {
    let url = endpoints.portal_url()?;
    let operation_key = format!("portal.verify:{}", endpoints.host());

    let response = ctx
        .engine
        .execute_with_retry(&operation_key, &ctx.settings.retry, || async {
            let response = ctx
                .send(PortalRequest::get(url.as_str()).cookie_header(&session.cookie_header))
                .await?;
            if response.status == 429 || response.status >= 500 {
                return Err(FetchError::from_status(response.status, "portal page"));
            }
            Ok(response)
        })
        .await?;

    let granted = grants_access(&response);
    debug!(status = response.status, granted, "Verified portal access");
    Ok(granted)
}

/// Loads the portal landing page with `session` and inspects it.
///
/// Never fails: transport errors, open breakers and unexpected pages all
/// count as "no access".
pub async fn verify_access(ctx: &FetchContext, endpoints: &PortalEndpoints, session: &Session) -> bool {
    check_access(ctx, endpoints, session)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Portal access check failed");
            false
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grants_access() {
        let portal = PortalResponse::new(200).with_body("<div class=\"portal-container\"></div>");
        let login = PortalResponse::new(200)
            .with_body("<div class=\"portal-container\"><input name=\"intumitPswd\"></div>");
        let redirect = PortalResponse::new(302).with_body("portal-container");

        assert!(grants_access(&portal));
        assert!(!grants_access(&login));
        assert!(!grants_access(&redirect));
        assert!(!grants_access(&PortalResponse::new(200).with_body("hello")));
    }
}
