use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use atelier_core::errors::{ApplicationError, InterfaceError};
use atelier_core::sources::SourceError;
use atelier_db::repositories::RepositoryError;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

pub type ApiFailure = (StatusCode, Json<ApiError>);

pub fn correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn failure(status: StatusCode, message: impl Into<String>) -> ApiFailure {
    (status, Json(ApiError { error: message.into(), correlation_id: correlation_id() }))
}

pub fn bad_request(message: impl Into<String>) -> ApiFailure {
    failure(StatusCode::BAD_REQUEST, message)
}

pub fn not_found(message: impl Into<String>) -> ApiFailure {
    failure(StatusCode::NOT_FOUND, message)
}

pub fn conflict(message: impl Into<String>) -> ApiFailure {
    failure(StatusCode::CONFLICT, message)
}

/// Maps the layered application error onto an HTTP response. Only bad
/// requests echo the underlying message; everything else returns the
/// generic user message and logs the detail under the correlation id.
pub fn application_failure(error: ApplicationError) -> ApiFailure {
    let interface = error.into_interface(correlation_id());
    let user_message = interface.user_message();

    match interface {
        InterfaceError::BadRequest { message, correlation_id } => {
            (StatusCode::BAD_REQUEST, Json(ApiError { error: message, correlation_id }))
        }
        InterfaceError::ServiceUnavailable { message, correlation_id } => {
            error!(
                event_name = "api.request.unavailable",
                correlation_id = %correlation_id,
                error = %message,
                "backend unavailable while serving request"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiError { error: user_message.to_string(), correlation_id }),
            )
        }
        InterfaceError::Internal { message, correlation_id } => {
            error!(
                event_name = "api.request.internal_error",
                correlation_id = %correlation_id,
                error = %message,
                "request failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError { error: user_message.to_string(), correlation_id }),
            )
        }
    }
}

pub fn repository_failure(error: RepositoryError) -> ApiFailure {
    application_failure(ApplicationError::Persistence(error.to_string()))
}

pub fn source_failure(error: SourceError) -> ApiFailure {
    match error {
        SourceError::NotFound(what) => not_found(format!("{what} was not found")),
        other => application_failure(ApplicationError::Persistence(other.to_string())),
    }
}
