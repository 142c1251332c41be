use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::extractors::api_key::require_api_key;
use crate::handlers::upload;
use crate::rate_limit;
use crate::state::AppState;

/// Upload API routes.
///
/// Upload routes authenticate first and only then count against their own
/// quota. The global quota is layered over the whole router in
/// [`crate::build_router`].
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(upload::health))
        .route("/api/upload", get(upload::health))
        .route("/api/upload/", get(upload::health))
        .merge(single_routes(state))
        .merge(bulk_routes(state))
}

fn single_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/upload/single", post(upload::upload_single))
        .layer(upload::upload_body_limit(
            state.config.storage.max_file_size,
            1,
        ))
        .layer(middleware::from_fn_with_state(
            state.limiters.upload.clone(),
            rate_limit::enforce,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
}

fn bulk_routes(state: &AppState) -> Router<AppState> {
    let storage = &state.config.storage;
    Router::new()
        .route("/api/upload/bulk", post(upload::upload_bulk))
        .layer(upload::upload_body_limit(
            storage.max_file_size,
            storage.max_bulk_files,
        ))
        .layer(middleware::from_fn_with_state(
            state.limiters.bulk.clone(),
            rate_limit::enforce,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
}
