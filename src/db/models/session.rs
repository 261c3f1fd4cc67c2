//! Server-side login sessions.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::Role;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    /// Role of the user when the session was opened
    pub role: Role,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

/// A live session joined with the username of its user
#[derive(Debug, Clone, FromRow)]
pub struct ActiveSession {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Session {
    pub async fn insert(
        db: &SqlitePool,
        user_id: i64,
        role: Role,
        token_hash: &str,
        expires_at: &str,
    ) -> Result<Session, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp(chrono::Utc::now());

        sqlx::query_as(
            r#"
            INSERT INTO sessions (id, user_id, role, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(role)
        .bind(token_hash)
        .bind(expires_at)
        .bind(&now)
        .fetch_one(db)
        .await
    }

    /// Resolve an unexpired session by token hash
    pub async fn find_active(
        db: &SqlitePool,
        token_hash: &str,
    ) -> Result<Option<ActiveSession>, sqlx::Error> {
        let now = timestamp(chrono::Utc::now());

        sqlx::query_as(
            r#"
            SELECT s.user_id, u.username, s.role
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = ? AND s.expires_at > ?
            "#,
        )
        .bind(token_hash)
        .bind(&now)
        .fetch_optional(db)
        .await
    }

    pub async fn delete_by_token_hash(db: &SqlitePool, token_hash: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn purge_expired(db: &SqlitePool) -> Result<u64, sqlx::Error> {
        let now = timestamp(chrono::Utc::now());
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(&now)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(db: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(db)
            .await
    }
}

/// Fixed-width UTC timestamp so stored values compare correctly as text
pub fn timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
