// src/routes.rs

use axum::{
    Json, Router,
    http::{HeaderValue, Method, StatusCode, Uri},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, comment, realtime},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Public reads, protected writes (auth middleware on the merged routers).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, fanout hub).
pub fn create_router(state: AppState) -> Router {
    let origin: HeaderValue = state
        .config
        .client_url
        .parse()
        .expect("CLIENT_URL must be a valid origin");

    let cors = CorsLayer::new()
        .allow_origin([origin])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        // Protected profile route
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let comment_routes = Router::new()
        .route("/", get(comment::list_comments))
        .route("/{id}", get(comment::get_comment))
        .route("/{id}/replies", get(comment::list_replies))
        // Protected comment routes
        .merge(
            Router::new()
                .route("/", post(comment::create_comment))
                .route(
                    "/{id}",
                    put(comment::update_comment).delete(comment::delete_comment),
                )
                .route("/{id}/like", post(comment::toggle_like))
                .route("/{id}/dislike", post(comment::toggle_dislike))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    Router::new()
        .route("/", get(index))
        .nest("/api/auth", auth_routes)
        .nest("/api/comments", comment_routes)
        .route("/api/health", get(health))
        .route("/ws", get(realtime::comments_ws))
        .fallback(not_found)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "Comment Board API",
        "version": "1.0.0",
        "endpoints": {
            "health": "/api/health",
            "auth": "/api/auth",
            "comments": "/api/comments",
        },
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "success",
        "message": "API is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": "fail",
            "message": format!("Cannot find {} on this server", uri),
        })),
    )
}
