use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quoteworks_core::errors::{ApplicationError, InterfaceError};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Error returned by every API handler. Wraps the interface error so the
/// correlation id travels with it into the response body.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub correlation_id: String,
}

impl ApiError {
    pub fn new(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self.0 {
            InterfaceError::BadRequest { .. } => "bad_request",
            InterfaceError::Unauthorized { .. } => "unauthorized",
            InterfaceError::Forbidden { .. } => "forbidden",
            InterfaceError::NotFound { .. } => "not_found",
            InterfaceError::Conflict { .. } => "conflict",
            InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
            InterfaceError::Internal { .. } => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let correlation_id = self.0.correlation_id().to_string();

        // Server-side failures keep their detail in the logs only.
        let detail = if status.is_server_error() {
            error!(
                event_name = "api.request.failed",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error = %self.0,
                "request failed"
            );
            None
        } else {
            warn!(
                event_name = "api.request.rejected",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error = %self.0,
                "request rejected"
            );
            Some(self.0.message().to_string())
        };

        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.0.user_message().to_string(),
            detail,
            correlation_id,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use quoteworks_core::errors::{ApplicationError, DomainError};

    use super::ApiError;

    #[test]
    fn domain_failures_map_to_client_statuses() {
        let cases = [
            (ApplicationError::validation("title is required"), StatusCode::BAD_REQUEST),
            (
                ApplicationError::Unauthenticated("missing x-user-id".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (ApplicationError::Forbidden("admin only".into()), StatusCode::FORBIDDEN),
            (ApplicationError::not_found("quotation", 7), StatusCode::NOT_FOUND),
            (ApplicationError::Conflict("number taken".into()), StatusCode::CONFLICT),
            (
                ApplicationError::Persistence("database is locked".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApplicationError::Configuration("template missing".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::new(error, "req-1").status(), expected);
        }
    }

    #[test]
    fn locked_quotation_is_a_conflict() {
        let error = ApplicationError::from(DomainError::NotPermittedInState {
            status: quoteworks_core::QuotationStatus::Issued,
            action: quoteworks_core::QuotationAction::ReplaceItems,
        });
        let api = ApiError::new(error, "req-2");

        assert_eq!(api.status(), StatusCode::CONFLICT);
        assert_eq!(api.0.correlation_id(), "req-2");
    }
}
