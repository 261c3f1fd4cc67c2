//! Identity layer: password hashing, credential checks and login sessions.
//!
//! A session is a row in `sessions` keyed by the SHA-256 hash of a random
//! token. The token itself only ever lives in the client's cookie.

pub mod policy;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::{timestamp, Role, Session, User};

pub use policy::{can_act, Action};

lazy_static! {
    /// Verified against when the username is unknown, so a miss costs as much as a bad password
    static ref DUMMY_HASH: String = hash_password("farmstand-dummy-password").unwrap_or_default();
}

/// Credential check failures
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown username or wrong password; deliberately not distinguished
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The authenticated user a request acts on behalf of
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random session token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a username/password pair against the credential store
pub async fn authenticate(db: &SqlitePool, username: &str, password: &str) -> Result<User, AuthError> {
    let user = User::find_by_username(db, username).await?;

    match user {
        Some(user) if verify_password(password, &user.password_hash) => Ok(user),
        Some(_) => Err(AuthError::InvalidCredentials),
        None => {
            verify_password(password, &DUMMY_HASH);
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Open a session for `user`, returning the token to hand to the client
pub async fn start_session(
    db: &SqlitePool,
    user: &User,
    ttl: chrono::Duration,
) -> Result<String, sqlx::Error> {
    let purged = Session::purge_expired(db).await?;
    if purged > 0 {
        debug!(purged, "Removed expired sessions");
    }

    let token = generate_token();
    let expires_at = timestamp(chrono::Utc::now() + ttl);
    Session::insert(db, user.id, user.role, &hash_token(&token), &expires_at).await?;

    info!(user_id = user.id, username = %user.username, role = %user.role, "Session started");
    Ok(token)
}

/// Resolve the actor bound to `token`, if the session exists and has not expired
pub async fn current_actor(db: &SqlitePool, token: &str) -> Result<Option<Actor>, sqlx::Error> {
    let session = Session::find_active(db, &hash_token(token)).await?;

    Ok(session.map(|s| Actor {
        user_id: s.user_id,
        username: s.username,
        role: s.role,
    }))
}

/// Drop the session bound to `token`; a no-op when there is none
pub async fn end_session(db: &SqlitePool, token: &str) -> Result<(), sqlx::Error> {
    let removed = Session::delete_by_token_hash(db, &hash_token(token)).await?;
    if removed > 0 {
        info!("Session ended");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, seed_roster, SeedAccount};

    async fn seeded() -> SqlitePool {
        let pool = connect_in_memory().await.unwrap();
        seed_roster(
            &pool,
            &[
                SeedAccount::new("admin", "admin123", Role::Admin),
                SeedAccount::new("farmer1", "farmer123", Role::Farmer),
            ],
        )
        .await
        .unwrap();
        pool
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_token());
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[tokio::test]
    async fn test_authenticate_accepts_correct_password() {
        let pool = seeded().await;
        let user = authenticate(&pool, "farmer1", "farmer123").await.unwrap();
        assert_eq!(user.username, "farmer1");
        assert_eq!(user.role, Role::Farmer);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let pool = seeded().await;

        let wrong = authenticate(&pool, "admin", "wrongpass").await.unwrap_err();
        let unknown = authenticate(&pool, "nobody", "admin123").await.unwrap_err();

        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(Session::count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let pool = seeded().await;
        let user = authenticate(&pool, "admin", "admin123").await.unwrap();

        let token = start_session(&pool, &user, chrono::Duration::hours(1))
            .await
            .unwrap();
        let actor = current_actor(&pool, &token).await.unwrap().unwrap();
        assert_eq!(actor, Actor::from(&user));
        assert!(actor.is_admin());

        end_session(&pool, &token).await.unwrap();
        assert!(current_actor(&pool, &token).await.unwrap().is_none());

        // ending twice is fine
        end_session(&pool, &token).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_ignored_and_purged() {
        let pool = seeded().await;
        let user = authenticate(&pool, "farmer1", "farmer123").await.unwrap();

        let stale = start_session(&pool, &user, chrono::Duration::seconds(-10))
            .await
            .unwrap();
        assert!(current_actor(&pool, &stale).await.unwrap().is_none());

        start_session(&pool, &user, chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(Session::count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_token_has_no_actor() {
        let pool = seeded().await;
        assert!(current_actor(&pool, "deadbeef").await.unwrap().is_none());
    }
}
