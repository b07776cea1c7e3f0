//! Error types for the group server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::sync::ErrorBody;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad id")]
    BadId,

    #[error("Missing pass")]
    MissingPass,

    #[error("Missing baseVersion")]
    MissingBaseVersion,

    #[error("Bad payload")]
    BadPayload,

    #[error("GroupExists")]
    GroupExists,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("VersionConflict")]
    VersionConflict { current_version: u64 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadId
            | AppError::MissingPass
            | AppError::MissingBaseVersion
            | AppError::BadPayload => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::GroupExists | AppError::VersionConflict { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) | AppError::Database(_) | AppError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::VersionConflict { current_version } => ErrorBody {
                error: self.to_string(),
                current_version: Some(*current_version),
            },
            AppError::Internal(_) | AppError::Database(_) | AppError::Json(_) => {
                tracing::error!("{}", self);
                ErrorBody {
                    error: "Internal error".to_string(),
                    current_version: None,
                }
            }
            _ => ErrorBody {
                error: self.to_string(),
                current_version: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::BadId.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::GroupExists.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::VersionConflict { current_version: 2 }.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_match_wire_errors() {
        assert_eq!(AppError::BadId.to_string(), "Bad id");
        assert_eq!(AppError::MissingPass.to_string(), "Missing pass");
        assert_eq!(AppError::BadPayload.to_string(), "Bad payload");
        assert_eq!(AppError::NotFound.to_string(), "Not found");
        assert_eq!(
            AppError::VersionConflict { current_version: 9 }.to_string(),
            "VersionConflict"
        );
    }
}
