use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::intake::repository::{RepositoryError, StorageError};
use crate::workflows::intake::session::SessionError;
use crate::workflows::intake::IntakeError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use tracing::error;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Intake(IntakeError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Intake(intake) => intake_status(intake),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn intake_status(error: &IntakeError) -> StatusCode {
    match error {
        IntakeError::Validation(_) | IntakeError::MissingState(_) | IntakeError::Document(_) => {
            StatusCode::BAD_REQUEST
        }
        IntakeError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        IntakeError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        IntakeError::Repository(RepositoryError::Unavailable(_))
        | IntakeError::Session(SessionError::Unavailable(_))
        | IntakeError::Storage(StorageError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        IntakeError::Storage(StorageError::Missing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {err}"),
            AppError::Telemetry(err) => write!(f, "telemetry error: {err}"),
            AppError::Io(err) => write!(f, "io error: {err}"),
            AppError::Server(err) => write!(f, "server error: {err}"),
            AppError::Intake(err) => write!(f, "intake error: {err}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Intake(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        }

        let body = match &self {
            AppError::Intake(IntakeError::Validation(errors)) => {
                json!({ "error": self.to_string(), "errors": errors.0 })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<IntakeError> for AppError {
    fn from(value: IntakeError) -> Self {
        Self::Intake(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::intake::documents::DocumentError;
    use crate::workflows::intake::forms::{ValidationError, ValidationErrors};

    #[test]
    fn intake_failures_map_to_client_and_backend_statuses() {
        let cases = [
            (
                IntakeError::Document(DocumentError::UnsupportedType),
                StatusCode::BAD_REQUEST,
            ),
            (
                IntakeError::Repository(RepositoryError::NotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                IntakeError::Repository(RepositoryError::Unavailable("offline".to_string())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                IntakeError::Session(SessionError::Unavailable("offline".to_string())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(AppError::from(error).status(), expected);
        }
    }

    #[tokio::test]
    async fn validation_response_lists_field_errors() {
        let errors = ValidationErrors(vec![ValidationError::new(
            "household_size",
            "Select your household size.",
        )]);

        let response = AppError::from(IntakeError::Validation(errors)).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
            .await
            .expect("read body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
        assert_eq!(payload["errors"][0]["field"], "household_size");
    }
}
