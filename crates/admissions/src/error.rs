use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::applications::{
    NotifyError, ReconciliationError, ReferenceStoreError, ReviewError, StorageError,
    SubmissionError, WizardError,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Process-level failures of the service binary and CLI.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Storage(StorageError),
    Notify(NotifyError),
    ReferenceStore(ReferenceStoreError),
    Wizard(WizardError),
    Review(ReviewError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Storage(err) => write!(f, "storage error: {}", err),
            AppError::Notify(err) => write!(f, "notifier error: {}", err),
            AppError::ReferenceStore(err) => write!(f, "reference store error: {}", err),
            AppError::Wizard(err) => write!(f, "application error: {}", err),
            AppError::Review(err) => write!(f, "review error: {}", err),
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
            AppError::Storage(err) => Some(err),
            AppError::Notify(err) => Some(err),
            AppError::ReferenceStore(err) => Some(err),
            AppError::Wizard(err) => Some(err),
            AppError::Review(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Storage(StorageError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            AppError::Wizard(WizardError::Submission(err)) if err.is_validation() => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Wizard(WizardError::Reconciliation(err)) if err.is_session_end() => {
                StatusCode::GONE
            }
            AppError::Wizard(WizardError::InvalidTransition { .. })
            | AppError::Review(ReviewError::ConfirmationRequired)
            | AppError::Review(ReviewError::MissingPaymentReference(_)) => StatusCode::CONFLICT,
            AppError::Review(ReviewError::ApplicationNotFound(_))
            | AppError::Review(ReviewError::DocumentNotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
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

impl From<StorageError> for AppError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<NotifyError> for AppError {
    fn from(value: NotifyError) -> Self {
        Self::Notify(value)
    }
}

impl From<ReferenceStoreError> for AppError {
    fn from(value: ReferenceStoreError) -> Self {
        Self::ReferenceStore(value)
    }
}

impl From<WizardError> for AppError {
    fn from(value: WizardError) -> Self {
        Self::Wizard(value)
    }
}

impl From<ReviewError> for AppError {
    fn from(value: ReviewError) -> Self {
        Self::Review(value)
    }
}

impl From<SubmissionError> for AppError {
    fn from(value: SubmissionError) -> Self {
        Self::Wizard(WizardError::Submission(value))
    }
}

impl From<ReconciliationError> for AppError {
    fn from(value: ReconciliationError) -> Self {
        Self::Wizard(WizardError::Reconciliation(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::applications::{ApplyStep, FormError};

    #[test]
    fn missing_objects_map_to_not_found() {
        let response = AppError::from(StorageError::NotFound("payment-slips/x.png".to_string()))
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn wizard_errors_keep_their_meaning() {
        let validation = AppError::from(SubmissionError::Validation(FormError::DeclarationNotSigned));
        assert_eq!(
            validation.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let expired = AppError::from(ReconciliationError::NoSession);
        assert_eq!(expired.into_response().status(), StatusCode::GONE);

        let transition = AppError::from(WizardError::InvalidTransition {
            from: ApplyStep::Success,
            action: "go back",
        });
        assert_eq!(transition.into_response().status(), StatusCode::CONFLICT);

        let unconfirmed = AppError::from(ReviewError::ConfirmationRequired);
        assert_eq!(unconfirmed.into_response().status(), StatusCode::CONFLICT);
    }
}
