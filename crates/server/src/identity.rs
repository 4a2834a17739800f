//! Caller identity as forwarded by the upstream gateway.
//!
//! The gateway authenticates the user and passes the numeric id in
//! `x-user-id`. When a gateway token is configured every request must also
//! carry it in `x-gateway-token`; otherwise the id header is trusted as-is.
//! The role always comes from the users table, never from the request.

use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use quoteworks_core::audit::AuditContext;
use quoteworks_core::domain::quotation::QuotationId;
use quoteworks_core::domain::user::{Actor, UserId};
use quoteworks_core::errors::ApplicationError;
use secrecy::ExposeSecret;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const GATEWAY_TOKEN_HEADER: &str = "x-gateway-token";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Authenticated caller plus the correlation id for this request.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub actor: Actor,
    pub correlation_id: String,
}

impl RequestContext {
    pub fn audit(&self, quotation_id: Option<QuotationId>) -> AuditContext {
        AuditContext::new(quotation_id, self.correlation_id.clone(), self.actor.user_id.to_string())
    }

    pub fn fail(&self, error: ApplicationError) -> ApiError {
        ApiError::new(error, &self.correlation_id)
    }
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let correlation_id = correlation_id(&parts.headers);
        let actor = resolve_actor(&parts.headers, state)
            .await
            .map_err(|error| ApiError::new(error, &correlation_id))?;

        debug!(
            event_name = "api.identity.resolved",
            correlation_id = %correlation_id,
            actor_id = %actor.user_id,
            role = actor.role.as_str(),
            "caller identity resolved"
        );
        Ok(Self { actor, correlation_id })
    }
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(ToString::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn resolve_actor(headers: &HeaderMap, state: &AppState) -> Result<Actor, ApplicationError> {
    if let Some(expected) = &state.gateway_token {
        let presented = header_str(headers, GATEWAY_TOKEN_HEADER).unwrap_or_default();
        if !tokens_match(presented.as_bytes(), expected.expose_secret().as_bytes()) {
            return Err(ApplicationError::Unauthenticated("gateway token mismatch".to_string()));
        }
    }

    let raw = header_str(headers, USER_ID_HEADER).ok_or_else(|| {
        ApplicationError::Unauthenticated(format!("missing {USER_ID_HEADER} header"))
    })?;
    let user_id = raw.trim().parse::<i64>().map(UserId).map_err(|_| {
        ApplicationError::Unauthenticated(format!("{USER_ID_HEADER} must be a numeric id"))
    })?;

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApplicationError::Unauthenticated(format!("unknown user {user_id}")))?;
    Ok(Actor::from(&user))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Length-independent comparison of the presented and configured token.
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    let mut diff = presented.len() ^ expected.len();
    for (index, byte) in expected.iter().enumerate() {
        let other = presented.get(index).copied().unwrap_or(0);
        diff |= usize::from(byte ^ other);
    }
    diff == 0
}
