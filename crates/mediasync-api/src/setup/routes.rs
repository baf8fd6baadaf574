//! Route configuration and setup

use crate::constants::{API_PREFIX, HTTP_CONCURRENCY_LIMIT, MAX_REQUEST_BODY_BYTES};
use crate::handlers::{health, media, static_file};
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, http::Method, routing::get, Router};
use mediasync_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let collection_routes = Router::new()
        .route(
            "/{collection}",
            get(media::list_documents).post(media::create_document),
        )
        .route("/{collection}/fields", get(media::collection_fields))
        .route(
            "/{collection}/file/{filename}",
            get(static_file::serve_file),
        )
        .route(
            "/{collection}/{id}",
            get(media::get_document)
                .patch(media::update_document)
                .delete(media::delete_document),
        );

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .nest(API_PREFIX, collection_routes)
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(setup_cors(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> CorsLayer {
    if config.is_production() {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
    }
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}
