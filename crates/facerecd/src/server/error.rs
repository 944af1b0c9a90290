use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Request failures, each carrying the short message shown to the caller.
///
/// Detailed causes are logged where the error is raised, never returned.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad JSON, missing fields, wrong types.
    #[error("{0}")]
    MalformedInput(&'static str),
    /// The photo could not be downloaded or decoded.
    #[error("{0}")]
    LoadFailed(&'static str),
    #[error("{0}")]
    NoFaceDetected(&'static str),
    #[error("Nenhum match encontrado com confiança suficiente.")]
    NoMatchFound,
    #[error("Serviço indisponível (modelos não carregados)")]
    ServiceUnavailable,
    #[error("{0}")]
    InternalFault(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedInput(_) | ApiError::LoadFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::NoFaceDetected(_) | ApiError::NoMatchFound => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
