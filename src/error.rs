use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use thiserror::Error;
use tracing::{Span, error, warn};

use crate::validation::{FieldErrors, describe_field_errors};

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials. Please try again.";
pub const INCOMPLETE_STEP_MESSAGE: &str = "Please complete the highlighted fields.";
pub const GENERIC_FAILURE_MESSAGE: &str = "Action failed, try again.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No authenticated session")]
    Unauthenticated,

    #[error("Incomplete step: {}", describe_field_errors(.0))]
    IncompleteStep(FieldErrors),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Concurrent progression update for identity {0}")]
    ProgressionConflict(i64),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        AppError::PersistenceFailure(err.to_string())
    }

    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
                "database_error"
            }
            AppError::InvalidCredentials => {
                warn!(context = %ctx, "Invalid credentials");
                "invalid_credentials"
            }
            AppError::Unauthenticated => {
                warn!(context = %ctx, "No authenticated session");
                "unauthenticated"
            }
            AppError::IncompleteStep(fields) => {
                warn!(
                    fields = ?fields.keys().collect::<Vec<_>>(),
                    context = %ctx,
                    "Incomplete onboarding step"
                );
                "incomplete_step"
            }
            AppError::InvalidTransition(msg) => {
                warn!(message = %msg, context = %ctx, "Invalid transition");
                "invalid_transition"
            }
            AppError::ProgressionConflict(identity_id) => {
                warn!(identity_id = %identity_id, context = %ctx, "Progression conflict");
                "progression_conflict"
            }
            AppError::PersistenceFailure(msg) => {
                error!(message = %msg, context = %ctx, "Persistence failure");
                "persistence_failure"
            }
            AppError::NotFound(msg) => {
                warn!(message = %msg, context = %ctx, "Not found error");
                "not_found_error"
            }
            AppError::Validation(msg) => {
                warn!(message = %msg, context = %ctx, "Validation error");
                "validation_error"
            }
            AppError::Configuration(msg) => {
                error!(message = %msg, context = %ctx, "Configuration error");
                "configuration_error"
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal error");
                "internal_error"
            }
        };

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            match self {
                AppError::Database(_)
                | AppError::PersistenceFailure(_)
                | AppError::Configuration(_)
                | AppError::Internal(_) => {
                    current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
                }
                _ => {}
            }
        }
    }

    /// Only credential and onboarding-step failures are shown to the end user
    /// as they are; everything else collapses to a generic retry signal.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, AppError::InvalidCredentials | AppError::IncompleteStep(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => INVALID_CREDENTIALS_MESSAGE,
            AppError::IncompleteStep(_) => INCOMPLETE_STEP_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            AppError::IncompleteStep(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Cryptography error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("Serialization error: {}", error))
    }
}

impl From<dotenvy::Error> for AppError {
    fn from(error: dotenvy::Error) -> Self {
        AppError::Configuration(format!("Environment file error: {}", error))
    }
}
