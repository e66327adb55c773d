//! Endpoint fallback.
//!
//! Candidates run strictly one after another, each under its own breaker
//! and retry budget. The first usable reply wins; if none answers, the
//! caller gets a single [`FetchError::AiService`] and the per-candidate
//! detail stays in the logs.

use std::time::Instant;

use portico_core::ApiReply;
use portico_fetch::{FetchContext, FetchError, PortalResponse};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::candidates::{CandidateEndpoint, CompletionRequest, build_candidates};
use super::descriptor::PortalEndpoints;
use super::reply::extract_reply;

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Judges one candidate response.
///
/// Usable means 2xx, a JSON content type, a parseable body and a
/// non-blank reply field.
pub fn read_reply(candidate: &CandidateEndpoint, response: &PortalResponse) -> Result<String, FetchError> {
    if response.is_redirect()
        && response
            .location()
            .is_some_and(|l| l.to_ascii_lowercase().contains("login"))
    {
        return Err(FetchError::AuthenticationFailed(format!(
            "{} redirected to the login page",
            candidate.description
        )));
    }
    if !response.is_success() {
        return Err(FetchError::from_status(response.status, candidate.description));
    }
    if !response.is_json() {
        return Err(FetchError::InvalidResponse(format!(
            "{} answered with {}",
            candidate.description,
            response.content_type().unwrap_or("no content type")
        )));
    }
    let value: Value = serde_json::from_str(&response.body).map_err(|e| {
        FetchError::InvalidResponse(format!("{} sent malformed JSON: {e}", candidate.description))
    })?;
    extract_reply(&value).ok_or_else(|| {
        FetchError::InvalidResponse(format!("{} sent no reply text", candidate.description))
    })
}

async fn try_candidate(
    ctx: &FetchContext,
    candidate: &CandidateEndpoint,
    request: &CompletionRequest<'_>,
) -> Result<String, FetchError> {
    let response = ctx.send(candidate.to_request(request)).await?;
    debug!(
        endpoint = candidate.description,
        status = response.status,
        content_type = response.content_type().unwrap_or_default(),
        "Candidate answered"
    );
    read_reply(candidate, &response)
}

async fn run_candidates(
    ctx: &FetchContext,
    candidates: &[CandidateEndpoint],
    request: &CompletionRequest<'_>,
    start: Instant,
) -> Result<ApiReply, FetchError> {
    let mut attempts = 0;
    let mut last_cause: Option<FetchError> = None;

    for candidate in candidates {
        attempts += 1;
        let candidate_start = Instant::now();
        let retry = ctx
            .settings
            .retry
            .clone()
            .with_max_attempts(candidate.retry_attempts);

        let result = ctx
            .engine
            .execute_with_retry(&candidate.operation_key, &retry, || {
                try_candidate(ctx, candidate, request)
            })
            .await;

        match result {
            Ok(text) => {
                info!(
                    endpoint = candidate.description,
                    attempts,
                    elapsed_ms = elapsed_ms(start),
                    "Completion succeeded"
                );
                return Ok(ApiReply {
                    text,
                    source_endpoint_description: candidate.description.to_string(),
                    latency_ms: elapsed_ms(start),
                });
            }
            Err(error) => {
                warn!(
                    endpoint = candidate.description,
                    key = %candidate.operation_key,
                    error = %error,
                    elapsed_ms = elapsed_ms(candidate_start),
                    "Candidate failed"
                );
                last_cause = Some(error);
            }
        }
    }

    Err(FetchError::AiService {
        attempts,
        last_cause: last_cause.map_or_else(|| "no candidates".to_string(), |e| e.to_string()),
    })
}

/// Sends a prompt through the candidates until one answers.
///
/// The whole call is bounded by the completion deadline from the fetch
/// settings; running past it yields [`FetchError::Timeout`].
#[instrument(skip_all, fields(form_id = %request.form_id))]
pub async fn complete(
    ctx: &FetchContext,
    endpoints: &PortalEndpoints,
    request: &CompletionRequest<'_>,
    candidate_attempts: u32,
) -> Result<ApiReply, FetchError> {
    request.validate()?;
    let candidates = build_candidates(endpoints, request, candidate_attempts)?;
    let deadline = ctx.settings.completion_deadline;
    let start = Instant::now();

    match tokio::time::timeout(deadline, run_candidates(ctx, &candidates, request, start)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(deadline = ?deadline, "Completion deadline exceeded");
            Err(FetchError::Timeout(deadline))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
