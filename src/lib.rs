// Library crate for caseflow
// Exports modules for use by the server binary and tests

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod middlewares;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    copy_api, create_api, create_case, create_project, delete_api, delete_apis, get_api, get_case,
    get_project, list_apis, set_api_tag, sync_api, update_api,
};
use crate::middlewares::auth_middleware;
use crate::state::AppState;

/// Build the application router with the given state
pub fn build_router(state: AppState) -> Router {
    // Protected routes (require authentication)
    let protected_routes = Router::new()
        // Project routes
        .route("/api/projects", post(create_project))
        .route("/api/projects/{id}", get(get_project))
        // API definition routes
        .route("/api/apis", get(list_apis))
        .route("/api/apis", post(create_api))
        .route("/api/apis", delete(delete_apis))
        .route("/api/apis/{id}", get(get_api))
        .route("/api/apis/{id}", put(update_api))
        .route("/api/apis/{id}", delete(delete_api))
        .route("/api/apis/{id}/tag", patch(set_api_tag))
        .route("/api/apis/{id}/copy", post(copy_api))
        .route("/api/apis/{id}/sync", patch(sync_api))
        // Test case routes
        .route("/api/projects/{project_id}/cases", post(create_case))
        .route("/api/cases/{id}", get(get_case))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(|| async { "Hello, caseflow!" }))
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
