// Marketplace UI - Askama templates rendered server-side, plain HTML forms

mod auth;
mod context;
pub mod error;
mod products;
mod templates;
pub mod validation;


use askama::Template;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::AppState;

pub use context::{RequestContext, DASHBOARD_PATH, LOGIN_PATH, SESSION_COOKIE};
pub use error::{AppError, FieldErrors};
pub use templates::*;

/// Headroom for the text fields sent alongside an image upload
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

// Helper to render templates with a status code
fn render_template<T: Template>(template: &T, status: StatusCode) -> Result<Response, AppError> {
    let html = template.render()?;
    Ok((status, Html(html)).into_response())
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.storage.max_upload_bytes + FORM_OVERHEAD_BYTES;
    let uploads = ServeDir::new(&state.config.storage.upload_dir);

    Router::new()
        // Public routes
        .route("/", get(products::catalog))
        .route("/login", get(auth::login_page).post(auth::login_submit))
        .route("/logout", get(auth::logout).post(auth::logout))
        // Role-resolved routes
        .route(
            "/dashboard",
            get(products::dashboard).post(products::create_product),
        )
        .route(
            "/edit_product/:id",
            get(products::edit_product_form).post(products::update_product),
        )
        .route("/delete_product/:id", post(products::delete_product))
        .route("/health", get(health_check))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
