pub mod rows;
pub mod snapshots;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ax_state::AppState;
use crate::core::source::RowSource;

pub fn router<S: RowSource + 'static>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/rows/{table}", post(rows::get_rows::<S>))
        .route("/api/dashboard", get(snapshots::dashboard::<S>))
        .route("/api/features/{kind}/{key}", get(snapshots::features::<S>))
        .route("/api/movements/{key}", get(snapshots::movements::<S>))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
