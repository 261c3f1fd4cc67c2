//! Error handling for the HTML handlers.
//!
//! Denials and missing products both become a plain redirect to the actor's
//! home view, so a response never tells a farmer whether someone else's
//! product exists. Server faults are logged and rendered as a bare 500.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use std::collections::BTreeMap;

use crate::auth::AuthError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid username or password")]
    AuthenticationFailed,

    #[error("not permitted")]
    Denied { home: &'static str },

    #[error("not found")]
    NotFound { home: &'static str },

    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("malformed form data: {0}")]
    Multipart(#[from] MultipartError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::AuthenticationFailed,
            AuthError::Database(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::AuthenticationFailed => Redirect::to("/login").into_response(),
            AppError::Denied { home } | AppError::NotFound { home } => {
                Redirect::to(home).into_response()
            }
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, errors.to_string()).into_response()
            }
            AppError::Multipart(e) => {
                tracing::warn!("Rejected malformed form: {}", e);
                (StatusCode::BAD_REQUEST, "Malformed form data").into_response()
            }
            other => {
                tracing::error!("Request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Per-field validation messages, collected before a form is re-rendered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation error for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Fold another set of messages into this one
    pub fn merge(&mut self, other: FieldErrors) -> &mut Self {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// All messages for `field`, joined for display
    pub fn message(&self, field: &str) -> String {
        self.errors
            .get(field)
            .map(|m| m.join(" "))
            .unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(|k| k.as_str())
    }

    /// Return Ok(()) if no errors, or the collected errors
    pub fn finish(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    #[test]
    fn test_field_errors_collect_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("price", "Price is required");
        errors.add("name", "Name is required");
        errors.add("price", "Price must be a number");

        assert!(!errors.is_empty());
        assert!(errors.has("price"));
        assert!(!errors.has("quantity"));
        assert_eq!(
            errors.message("price"),
            "Price is required Price must be a number"
        );
        assert_eq!(errors.message("quantity"), "");
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["name", "price"]);
    }

    #[test]
    fn test_merge_keeps_both_sides() {
        let mut errors = FieldErrors::new();
        errors.add("image", "The uploaded file is too large");

        let mut other = FieldErrors::new();
        other.add("image", "Unsupported image type");
        other.add("price", "Price is required");
        errors.merge(other);

        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["image", "price"]);
        assert_eq!(
            errors.message("image"),
            "The uploaded file is too large Unsupported image type"
        );
    }

    #[test]
    fn test_finish() {
        assert!(FieldErrors::new().finish().is_ok());

        let mut errors = FieldErrors::new();
        errors.add("name", "Name is required");
        match errors.finish() {
            Err(AppError::Validation(e)) => assert_eq!(e.to_string(), "name: Name is required"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_denied_and_not_found_respond_identically() {
        let denied = AppError::Denied { home: "/dashboard" }.into_response();
        let missing = AppError::NotFound { home: "/dashboard" }.into_response();

        assert_eq!(denied.status(), StatusCode::SEE_OTHER);
        assert_eq!(denied.status(), missing.status());
        assert_eq!(denied.headers().get(LOCATION), missing.headers().get(LOCATION));
        assert_eq!(denied.headers().get(LOCATION).unwrap(), "/dashboard");
    }

    #[test]
    fn test_auth_error_conversion() {
        let err: AppError = AuthError::InvalidCredentials.into();
        assert!(matches!(err, AppError::AuthenticationFailed));
    }

    #[test]
    fn test_server_faults_are_500() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
