//! Chat entry point.

use std::sync::Arc;

use portico_core::{Attachment, ChatReply, CredentialIdentity, Session};
use portico_fetch::{FetchContext, FetchError};
use tracing::{info, instrument, warn};

use super::candidates::CompletionRequest;
use super::descriptor::{PortalEndpoints, PortalProfile};
use super::form_state::{FormState, harvest_form_state};
use super::login::SessionEmulator;
use super::orchestrator::complete;
use super::verify::check_access;

/// Label attached to every reply.
pub const MODEL_LABEL: &str = "Portal";

/// Logs in, prepares form state and runs completions against the portal.
#[derive(Debug)]
pub struct PortalChat {
    ctx: Arc<FetchContext>,
    sessions: SessionEmulator,
}

impl PortalChat {
    /// Creates a chat service.
    pub fn new(ctx: Arc<FetchContext>, profile: PortalProfile) -> Self {
        Self {
            ctx,
            sessions: SessionEmulator::new(profile),
        }
    }

    /// Returns the fetch context.
    pub fn context(&self) -> &FetchContext {
        &self.ctx
    }

    /// Returns the session emulator.
    pub fn sessions(&self) -> &SessionEmulator {
        &self.sessions
    }

    /// Returns a session whose portal access has been confirmed.
    ///
    /// A cached session that no longer grants access is dropped and one
    /// fresh login is attempted. An unreachable portal page is reported as
    /// such and leaves the session alone.
    #[instrument(skip_all, fields(user = %identity.username))]
    pub async fn authenticate(
        &self,
        identity: &CredentialIdentity,
    ) -> Result<(Session, PortalEndpoints), FetchError> {
        let ctx = self.ctx.as_ref();
        let endpoints = self.sessions.profile().endpoints(&identity.base_url)?;

        let session = self.sessions.login(ctx, identity).await?;
        if check_access(ctx, &endpoints, &session).await? {
            return Ok((session, endpoints));
        }

        warn!("Session does not grant portal access, logging in again");
        self.sessions.clear_session(identity);
        let session = self.sessions.login(ctx, identity).await?;
        if check_access(ctx, &endpoints, &session).await? {
            return Ok((session, endpoints));
        }

        self.sessions.clear_session(identity);
        Err(FetchError::AuthenticationFailed(
            "session does not grant portal access".to_string(),
        ))
    }

    async fn form_state(
        &self,
        endpoints: &PortalEndpoints,
        session: &Session,
        form_id: &str,
    ) -> Result<FormState, FetchError> {
        let form_url = endpoints.form_url(form_id)?;
        let operation_key = format!("portal.form:{}", endpoints.host());

        match harvest_form_state(self.ctx.as_ref(), session, &form_url, &operation_key).await {
            Ok(state) => Ok(state),
            Err(e) if e.is_authentication() => Err(e),
            Err(e) => {
                warn!(error = %e, "Form page unavailable, continuing without form state");
                Ok(FormState::default())
            }
        }
    }

    /// Sends one chat message.
    #[instrument(skip(self, message, identity, file), fields(user = %identity.username))]
    pub async fn send_chat(
        &self,
        message: &str,
        identity: &CredentialIdentity,
        form_id: &str,
        file: Option<&Attachment>,
    ) -> Result<ChatReply, FetchError> {
        if message.trim().is_empty() {
            return Err(FetchError::Validation("message is empty".to_string()));
        }
        if form_id.trim().is_empty() {
            return Err(FetchError::Validation("form id is empty".to_string()));
        }

        let (mut session, endpoints) = self.authenticate(identity).await?;
        let state = self.form_state(&endpoints, &session, form_id).await?;
        if state.apply_cookies(&mut session) {
            self.sessions.store_session(identity, session.clone());
        }

        let profile = self.sessions.profile();
        let api_key = profile.api_key.as_deref().or(state.api_key.as_deref());
        let request = CompletionRequest {
            message,
            file,
            session: &session,
            csrf_token: state.csrf_token.as_deref(),
            api_key,
            form_id,
        };

        let reply = complete(
            self.ctx.as_ref(),
            &endpoints,
            &request,
            profile.candidate_attempts,
        )
        .await?;
        self.sessions.extend_session(self.ctx.as_ref(), identity);

        info!(
            endpoint = %reply.source_endpoint_description,
            latency_ms = reply.latency_ms,
            "Chat reply received"
        );
        Ok(ChatReply {
            reply: reply.text,
            model_label: MODEL_LABEL.to_string(),
        })
    }
}
