use facerec_core::Descriptor;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/index-face`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRequest {
    pub user_id: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub user_id: String,
    pub descriptor: Descriptor,
}

/// Query string of `POST /api/search-face`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// JSON-encoded array of `{userId, descriptor}`; absent means `[]`.
    pub known_descriptors: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub matched_user_id: String,
    pub distance: f32,
}
