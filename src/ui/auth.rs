use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::context::{removal_cookie, session_cookie, RequestContext, DASHBOARD_PATH};
use super::error::AppError;
use super::templates::{LoginTemplate, Nav};
use super::render_template;
use crate::auth;
use crate::AppState;

#[derive(Deserialize)]
pub(super) struct LoginForm {
    username: String,
    password: String,
}

// Login page
pub(super) async fn login_page(ctx: RequestContext) -> Result<Response, AppError> {
    if ctx.actor.is_some() {
        return Ok(Redirect::to(DASHBOARD_PATH).into_response());
    }

    let template = LoginTemplate {
        nav: Nav::new(None),
        error: None,
        username: String::new(),
    };
    render_template(&template, StatusCode::OK)
}

// Login submit
pub(super) async fn login_submit(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let user = match auth::authenticate(&state.db, &form.username, &form.password).await {
        Ok(user) => user,
        Err(auth::AuthError::InvalidCredentials) => {
            warn!(username = %form.username, "Failed login attempt");
            let template = LoginTemplate {
                nav: Nav::new(None),
                error: Some("Invalid username or password".to_string()),
                username: form.username,
            };
            return render_template(&template, StatusCode::UNAUTHORIZED);
        }
        Err(e) => return Err(e.into()),
    };

    // a fresh login replaces whatever session the browser had
    if let Some(old) = ctx.token() {
        auth::end_session(&state.db, old).await?;
    }

    let token = auth::start_session(&state.db, &user, state.config.auth.session_ttl()).await?;
    info!(user_id = user.id, role = %user.role, "User logged in");

    let jar = jar.add(session_cookie(token, state.config.auth.secure_cookie));
    Ok((jar, Redirect::to(DASHBOARD_PATH)).into_response())
}

// Logout
pub(super) async fn logout(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if let Some(token) = ctx.token() {
        auth::end_session(&state.db, token).await?;
    }
    if let Some(actor) = &ctx.actor {
        info!(user_id = actor.user_id, "User logged out");
    }

    let jar = jar.remove(removal_cookie());
    Ok((jar, Redirect::to("/")).into_response())
}
