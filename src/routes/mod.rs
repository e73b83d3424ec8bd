use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

pub mod admin;
pub mod documents;
pub mod health;

/// Plain acknowledgement body for mutations that return no resource.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins = state.config.allowed_origins();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let headers: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(origin = %origin, error = %err, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(headers)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(&state);
    let body_limit = state.config.max_upload_bytes;

    let documents_routes = Router::new()
        .route("/", get(documents::list_documents))
        .route("/upload", post(documents::upload_document))
        .route(
            "/category/:category",
            get(documents::list_documents_by_category),
        )
        .route("/download/:id", get(documents::download_document))
        .route("/view/:id", get(documents::view_document))
        .route("/share", post(documents::create_share))
        .route("/share/:token", get(documents::open_share))
        .route(
            "/:id",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/:id/category", patch(documents::update_category));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route(
            "/users/:id",
            get(admin::get_user).delete(admin::delete_user),
        );

    Router::new()
        .nest("/api/documents", documents_routes)
        .nest("/api/admin", admin_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
}
