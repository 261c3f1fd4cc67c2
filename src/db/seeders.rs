//! Database seeders for the fixed account roster.
//!
//! Accounts are never created through the web interface; the roster is
//! inserted here during deployment initialization. Every account is guarded
//! by an existence check on its username, so running the seeder against an
//! already seeded database inserts nothing.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::{Role, User};
use crate::auth::hash_password;

/// One account of the seed roster, with its cleartext password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAccount {
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl SeedAccount {
    pub fn new(username: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role,
        }
    }
}

/// Insert every roster account that does not exist yet.
///
/// Returns the number of accounts inserted.
pub async fn seed_roster(pool: &SqlitePool, roster: &[SeedAccount]) -> Result<usize> {
    info!("Seeding account roster ({} accounts)...", roster.len());

    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for account in roster {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
            .bind(&account.username)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_some() {
            debug!(username = %account.username, "Account already present, skipping");
            continue;
        }

        let password_hash = hash_password(&account.password)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
        User::insert(&mut *tx, &account.username, &password_hash, account.role)
            .await
            .with_context(|| format!("Failed to insert account {}", account.username))?;

        info!(username = %account.username, role = %account.role, "Seeded account");
        inserted += 1;
    }

    tx.commit().await?;

    info!("Seeding complete: {} new accounts", inserted);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    fn roster() -> Vec<SeedAccount> {
        let mut accounts = vec![SeedAccount::new("admin", "admin123", Role::Admin)];
        for i in 1..=5 {
            accounts.push(SeedAccount::new(format!("farmer{}", i), "farmer123", Role::Farmer));
        }
        accounts
    }

    #[tokio::test]
    async fn test_seeding_twice_does_not_duplicate() {
        let pool = connect_in_memory().await.unwrap();

        assert_eq!(seed_roster(&pool, &roster()).await.unwrap(), 6);
        assert_eq!(seed_roster(&pool, &roster()).await.unwrap(), 0);

        let users = User::list_all(&pool).await.unwrap();
        assert_eq!(users.len(), 6);
        assert_eq!(users.iter().filter(|u| u.role == Role::Admin).count(), 1);
        assert_eq!(users.iter().filter(|u| u.role == Role::Farmer).count(), 5);
    }

    #[tokio::test]
    async fn test_seeding_fills_in_missing_accounts() {
        let pool = connect_in_memory().await.unwrap();
        let accounts = roster();

        seed_roster(&pool, &accounts[..2]).await.unwrap();
        assert_eq!(seed_roster(&pool, &accounts).await.unwrap(), 4);
        assert_eq!(User::count(&pool).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_seeded_passwords_are_hashed() {
        let pool = connect_in_memory().await.unwrap();
        seed_roster(&pool, &roster()).await.unwrap();

        let admin = User::find_by_username(&pool, "admin").await.unwrap().unwrap();
        assert_ne!(admin.password_hash, "admin123");
        assert!(admin.password_hash.starts_with("$argon2"));
        assert!(crate::auth::verify_password("admin123", &admin.password_hash));
    }
}
