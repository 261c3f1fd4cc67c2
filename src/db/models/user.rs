//! User accounts and roles.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, SqlitePool};

use super::timestamp;

/// The two kinds of account the marketplace knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    /// Moderates every product
    Admin,
    /// Lists and manages their own products
    Farmer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Farmer => "farmer",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "farmer" => Ok(Role::Farmer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: String,
}

impl User {
    pub async fn find_by_username(
        db: &SqlitePool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// All users in id order
    pub async fn list_all(db: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users ORDER BY id ASC")
            .fetch_all(db)
            .await
    }

    pub async fn count(db: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await
    }

    /// Insert a user with an already hashed password. Only the seeder creates users.
    pub(crate) async fn insert<'e, E>(
        executor: E,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let now = timestamp(chrono::Utc::now());
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .bind(&now)
        .execute(executor)
        .await?;

        Ok(result.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Farmer".parse::<Role>().unwrap(), Role::Farmer);
        assert_eq!(Role::Farmer.to_string(), "farmer");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!("viewer".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_is_admin() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::Farmer.is_admin());
    }

    #[tokio::test]
    async fn test_find_by_id_and_username() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        let id = User::insert(&pool, "farmer1", "not-a-real-hash", Role::Farmer)
            .await
            .unwrap();

        let by_id = User::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "farmer1");
        assert_eq!(by_id.role, Role::Farmer);
        assert!(by_id.created_at.ends_with('Z'));

        let by_name = User::find_by_username(&pool, "farmer1").await.unwrap().unwrap();
        assert_eq!(by_name.id, id);

        assert!(User::find_by_id(&pool, id + 1).await.unwrap().is_none());
        assert!(User::find_by_username(&pool, "farmer9").await.unwrap().is_none());
        assert_eq!(User::count(&pool).await.unwrap(), 1);
    }
}
