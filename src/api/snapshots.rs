use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::ax_state::AppState;
use crate::models::response::Row;

/// 看板数据的当前快照，直接从共享的那一代序列化
pub async fn dashboard<S>(State(state): State<Arc<AppState<S>>>) -> Json<Arc<Vec<Row>>> {
    Json(state.cache.dashboard.snapshot().await)
}

/// 某个键下缓存的特征，键不存在时返回空列表
pub async fn features<S>(
    State(state): State<Arc<AppState<S>>>,
    Path((kind, key)): Path<(String, String)>,
) -> Response {
    let cache = match kind.as_str() {
        "input" => &state.cache.input_features,
        "output" => &state.cache.output_features,
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("unknown feature kind '{}'", other) })),
            )
                .into_response()
        }
    };
    let snapshot = cache.snapshot().await;
    let list = snapshot.get(&key).cloned().unwrap_or_default();
    Json(list).into_response()
}

pub async fn movements<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(key): Path<String>,
) -> Response {
    match state.cache.movements.snapshot().await.get(&key) {
        Some(mileage) => Json(json!({ "key": key, "mileage": mileage })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no movements cached for '{}'", key) })),
        )
            .into_response(),
    }
}
