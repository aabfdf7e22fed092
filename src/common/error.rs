use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::EntityKind;

// Every failure the API can report. The `kind()` string is what clients branch on.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    InvalidAssignees {
        message: String,
        ids: Vec<String>,
    },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: EntityKind, id: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("Some users are not under your control")]
    ForeignPersonnel { ids: Vec<String> },

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid id or password")]
    InvalidCredentials,

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Internal server error")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Bcrypt error: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),
}

impl AppError {
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        AppError::NotFound { entity, id: id.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_)
            | AppError::Validation(_)
            | AppError::InvalidAssignees { .. } => "validation",
            AppError::NotFound { .. } => "not-found",
            AppError::Unauthorized(_) | AppError::ForeignPersonnel { .. } => "unauthorized",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidCredentials => "invalid-credentials",
            _ => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::Validation(_)
            | AppError::InvalidAssignees { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) | AppError::ForeignPersonnel { .. } => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                Some(json!(details))
            }
            AppError::InvalidAssignees { ids, .. } | AppError::ForeignPersonnel { ids } => {
                Some(json!({ "ids": ids }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal failures are logged in full and reported generically.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("🔥 Internal server error: {:?}", self);
            "An unexpected error occurred.".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "kind": self.kind(),
            "error": message,
        });
        if let Some(details) = self.details() {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_personnel_reports_offending_ids() {
        let err = AppError::ForeignPersonnel { ids: vec!["U9".into()] };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.kind(), "unauthorized");
        assert_eq!(err.details(), Some(json!({ "ids": ["U9"] })));
    }

    #[test]
    fn database_errors_are_internal() {
        let err = AppError::DatabaseError(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), "internal");
    }
}
