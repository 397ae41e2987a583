use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::ax_state::AppState;
use crate::core::error::QueryError;
use crate::core::source::RowSource;
use crate::models::request::GetRowsRequest;
use crate::models::response::GetRowsResponse;

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = if self.is_caller_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };
        if status == StatusCode::BAD_GATEWAY {
            warn!("取数失败: {:#}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// 表格服务端行模型的取数入口
pub async fn get_rows<S: RowSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(table): Path<String>,
    Json(request): Json<GetRowsRequest>,
) -> Result<Json<GetRowsResponse>, QueryError> {
    info!(
        "接收到取数请求: table={}, rows={}..{}, groups={}/{}",
        table,
        request.start_row,
        request.end_row,
        request.group_keys.len(),
        request.row_group_cols.len()
    );
    let response = state
        .rows
        .get_data(state.db.as_ref(), &table, &request)
        .await?;
    Ok(Json(response))
}
