pub mod auth;
pub mod config;
pub mod docs;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod uploads;

use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    docs::ApiDoc,
    handlers::stream,
    middleware::logging,
    routes::{chat_history, completion, health, threads, upload},
    state::AppState,
};

/// Slack on top of the completion timeout before the server gives up
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 30;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Threads
        .route(
            "/threads",
            get(threads::list_threads)
                .post(threads::create_thread)
                .patch(threads::rename_thread)
                .delete(threads::delete_thread)
                .fallback(threads::method_not_allowed),
        )
        // Chat history
        .route(
            "/chat-history",
            get(chat_history::list_history)
                .post(chat_history::post_history)
                .patch(chat_history::edit_turn)
                .put(chat_history::switch_version)
                .fallback(chat_history::method_not_allowed),
        )
        .route(
            "/chat-history/regenerate",
            post(chat_history::regenerate_turn).fallback(chat_history::regenerate_method_not_allowed),
        )
        // Completion
        .route(
            "/openai",
            post(completion::complete).fallback(completion::method_not_allowed),
        )
        .route(
            "/openai/stream",
            post(stream::complete_stream).fallback(stream::method_not_allowed),
        )
        // Upload
        .route("/upload", post(upload::upload).fallback(upload::method_not_allowed));

    let timeout = state.config.request_timeout()
        + std::time::Duration::from_secs(REQUEST_TIMEOUT_MARGIN_SECS);

    Router::new()
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes)
        .layer(axum_middleware::from_fn(logging::log_request))
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if !config.cors.enabled {
        return CorsLayer::new();
    }

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    if config.cors.origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .cors
            .origins
            .iter()
            .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
            .collect();

        cors.allow_origin(origins)
    }
}
