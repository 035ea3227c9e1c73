use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// API error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    DatabaseError(emberwatch_db::DbError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::DatabaseError(db_err) => {
                // Log the detailed error server-side
                tracing::error!(?db_err, "Database error occurred");

                // Return user-friendly error to client
                let (status, message) = match db_err {
                    emberwatch_db::DbError::StatusNotFound => {
                        (StatusCode::NOT_FOUND, "Status not found")
                    }
                    emberwatch_db::DbError::Sqlite(_)
                    | emberwatch_db::DbError::Connection(_)
                    | emberwatch_db::DbError::PlayerList(_) => {
                        // Don't expose internal database errors
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "An internal error occurred. Please try again later.",
                        )
                    }
                };

                let error_response = ErrorResponse::new(message);
                (status, Json(error_response)).into_response()
            }
        }
    }
}

impl From<emberwatch_db::DbError> for AppError {
    fn from(err: emberwatch_db::DbError) -> Self {
        AppError::DatabaseError(err)
    }
}
