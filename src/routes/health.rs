use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::{AppState, utils::success_to_api_response};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache: String,
    pub cache_endpoint: String,
}

/// 服务存活检查；缓存断开时服务仍然可用，只在响应中体现
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let manager = state.blacklist.manager();
    (
        StatusCode::OK,
        success_to_api_response(HealthResponse {
            status: "ok".to_string(),
            cache: manager.state().to_string(),
            cache_endpoint: manager.endpoint(),
        }),
    )
}
