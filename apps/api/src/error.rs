//! HTTP error translation.
//!
//! Every failure renders as `{"message": ..., "error": <short code>}`.
//! Domain rejections out of the coordinator map to 400/404; anything
//! infrastructural is a 500 whose sqlx detail stays in the log, not the
//! response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use tienda_core::CoreError;
use tienda_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Se requiere autenticación")]
    Unauthorized,

    #[error("El rol actual no permite esta operación")]
    Forbidden,

    #[error("Error interno")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Internal detail is logged, never returned.
            ApiError::Internal(detail) => {
                error!(detail = %detail, "Internal error");
                "Error interno; la operación fue revertida".to_string()
            }
            other => other.to_string(),
        };
        let body = json!({ "message": message, "error": self.code() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::VariantNotFound(_)
            | CoreError::SaleNotFound(_)
            | CoreError::LayawayNotFound(_)
            | CoreError::CodeNotFound(_)
            | CoreError::StoreNotFound(_) => ApiError::NotFound(err.to_string()),
            // Stock, state, validation and discount rejections are all
            // well-formed requests the engine refused.
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{entity} no encontrado: {id}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
