use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use facerec_core::{load_image, Descriptor, EuclideanMatcher, Extraction, KnownDescriptor, Matcher, PixelArray};
use serde_json::Value;
use tokio::task::spawn_blocking;

use super::error::{ApiError, Result};
use super::state::AppState;
use super::types::*;

/// Liveness plus model readiness.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    if state.readiness.is_ready() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Model Loading Failed")
    }
}

/// Compute the descriptor of the face in the photo at `photoUrl`.
pub async fn index_face_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<IndexResponse>> {
    let engine = state.engine()?;

    let request: IndexRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "index-face: unparsable body");
        IndexRequest::default()
    });
    let (Some(user_id), Some(photo_url)) = (
        request.user_id.filter(|s| !s.is_empty()),
        request.photo_url.filter(|s| !s.is_empty()),
    ) else {
        return Err(ApiError::MalformedInput("userId e photoUrl são obrigatórios."));
    };

    const LOAD_FAILED: &str = "Não foi possível carregar a imagem da URL.";
    let url = state.fetcher.resolve(&photo_url);
    let bytes = state.fetcher.fetch(&url).await.map_err(|e| {
        tracing::warn!(error = %e, "index-face: photo download failed");
        ApiError::LoadFailed(LOAD_FAILED)
    })?;
    let pixels = decode(bytes, state.max_dimension, LOAD_FAILED).await?;

    let extraction = engine.extract(pixels).await.map_err(|e| {
        tracing::error!(error = %e, "index-face: engine unavailable");
        ApiError::InternalFault("Erro interno no processamento facial.")
    })?;

    match extraction {
        Extraction::Descriptor(descriptor) => {
            tracing::info!(%user_id, len = descriptor.len(), "face indexed");
            Ok(Json(IndexResponse { user_id, descriptor }))
        }
        Extraction::NoFace => Err(ApiError::NoFaceDetected("Nenhuma face detectada ou erro no processamento.")),
        Extraction::Fault(reason) => {
            tracing::error!(%user_id, %reason, "index-face: extraction fault");
            Err(ApiError::InternalFault("Erro interno no processamento facial."))
        }
    }
}

/// Match the uploaded photo against the caller's known descriptors.
pub async fn search_face_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
    body: Bytes,
) -> Result<Json<SearchResponse>> {
    const INTERNAL: &str = "Erro interno no processamento da busca facial.";

    let engine = state.engine()?;

    let known: Value = serde_json::from_str(params.known_descriptors.as_deref().unwrap_or("[]")).map_err(|e| {
        tracing::debug!(error = %e, "search-face: knownDescriptors is not JSON");
        ApiError::MalformedInput("Formato inválido para knownDescriptors na query string.")
    })?;
    if body.is_empty() {
        return Err(ApiError::MalformedInput("Imagem para busca é obrigatória."));
    }
    let Value::Array(items) = known else {
        return Err(ApiError::MalformedInput("knownDescriptors deve ser um array JSON."));
    };
    let candidates = KnownDescriptor::parse_list(&items);

    let pixels = decode(body, state.max_dimension, "Não foi possível carregar a imagem enviada.").await?;

    let extraction = engine.extract(pixels).await.map_err(|e| {
        tracing::error!(error = %e, "search-face: engine unavailable");
        ApiError::InternalFault(INTERNAL)
    })?;
    let query: Descriptor = match extraction {
        Extraction::Descriptor(descriptor) => descriptor,
        Extraction::NoFace => return Err(ApiError::NoFaceDetected("Nenhuma face detectada na imagem enviada.")),
        Extraction::Fault(reason) => {
            tracing::error!(%reason, "search-face: extraction fault");
            return Err(ApiError::InternalFault(INTERNAL));
        }
    };

    let best = EuclideanMatcher.best_match(Some(&query), &candidates, state.tolerance);
    match best {
        Some(m) => {
            tracing::info!(user_id = %m.user_id, distance = m.distance, candidates = candidates.len(), "best match");
            Ok(Json(SearchResponse {
                matched_user_id: m.user_id,
                distance: m.distance,
            }))
        }
        None => {
            tracing::info!(candidates = candidates.len(), tolerance = state.tolerance, "no match within tolerance");
            Err(ApiError::NoMatchFound)
        }
    }
}

/// Decode and normalize an image off the async runtime.
async fn decode(bytes: Bytes, max_dimension: u32, message: &'static str) -> Result<PixelArray> {
    let decoded = spawn_blocking(move || load_image(&bytes, max_dimension))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "image decode task failed");
            ApiError::InternalFault("Erro interno no processamento facial.")
        })?;

    decoded.map_err(|e| {
        tracing::warn!(error = %e, "image could not be loaded");
        ApiError::LoadFailed(message)
    })
}
