//! Request-scoped identity.
//!
//! Every handler that cares about the caller takes a [`RequestContext`],
//! resolved from the session cookie once per request.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use super::error::AppError;
use crate::auth::{self, Actor};
use crate::AppState;

/// Session token cookie name
pub const SESSION_COOKIE: &str = "farmstand_session";

/// Home view of signed-in actors; the dashboard picks admin or farmer by role
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub actor: Option<Actor>,
    token: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Where this actor lands after a denial or a finished action
    pub fn home(&self) -> &'static str {
        if self.actor.is_some() {
            DASHBOARD_PATH
        } else {
            LOGIN_PATH
        }
    }

    pub fn require_actor(&self) -> Result<&Actor, AppError> {
        self.actor.as_ref().ok_or(AppError::Denied { home: LOGIN_PATH })
    }

    pub fn denied(&self) -> AppError {
        AppError::Denied { home: self.home() }
    }

    pub fn not_found(&self) -> AppError {
        AppError::NotFound { home: self.home() }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            return Ok(Self::anonymous());
        };

        let actor = auth::current_actor(&state.db, &token).await?;
        Ok(Self {
            actor,
            token: Some(token),
        })
    }
}

/// Cookie carrying a freshly issued session token
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie that clears the session token on the client
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}
