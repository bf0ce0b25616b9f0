//! HTTP routing.

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::auth::{self, AppState};

/// Builds the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(admin::health))
        .route("/setup", get(admin::setup_status).post(admin::setup))
        // Auth routes
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/token", post(auth::token))
        .route("/auth/logout", get(auth::logout))
        .route("/auth/me", get(auth::me))
        // Admin routes
        .route(
            "/admin/allow-list",
            get(admin::list_admins).post(admin::add_admin),
        )
        .route("/admin/allow-list/{id}", delete(admin::remove_admin))
        .route(
            "/admin/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
