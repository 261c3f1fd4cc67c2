//! Product listings and the catalog queries over them.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Price in cents, never negative
    pub price_cents: i64,
    /// Free-text quantity or weight, e.g. "1kg" or "bundle"
    pub quantity: String,
    /// Stored image file name, empty when the product has no image
    pub image: String,
    pub in_stock: bool,
    /// Owning farmer; `None` for products an admin created directly
    pub owner_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Product {
    /// Price formatted with two decimals, e.g. `3.50`
    pub fn price_display(&self) -> String {
        format_price(self.price_cents)
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn has_image(&self) -> bool {
        !self.image.is_empty()
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.owner_id == Some(user_id)
    }
}

pub fn format_price(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Fields for a new product. New products are always in stock.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub quantity: String,
    pub image: String,
    pub owner_id: Option<i64>,
}

/// Replacement values for the editable fields of a product.
/// `image` is only changed when a new upload was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductUpdate {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub quantity: String,
    pub in_stock: bool,
    pub image: Option<String>,
}

/// Catalog filter; unset fields match everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub in_stock: Option<bool>,
    pub owner_id: Option<i64>,
}

impl ProductFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_stock() -> Self {
        Self {
            in_stock: Some(true),
            owner_id: None,
        }
    }

    pub fn owned_by(owner_id: i64) -> Self {
        Self {
            in_stock: None,
            owner_id: Some(owner_id),
        }
    }
}

impl Product {
    /// List products matching `filter` in insertion order
    pub async fn list(db: &SqlitePool, filter: &ProductFilter) -> Result<Vec<Product>, sqlx::Error> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM products WHERE 1 = 1");
        if let Some(in_stock) = filter.in_stock {
            query.push(" AND in_stock = ").push_bind(in_stock);
        }
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ").push_bind(owner_id);
        }
        query.push(" ORDER BY id ASC");

        query.build_query_as::<Product>().fetch_all(db).await
    }

    pub async fn get<'e, E>(executor: E, id: i64) -> Result<Option<Product>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn create<'e, E>(executor: E, fields: &NewProduct) -> Result<Product, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let now = timestamp(chrono::Utc::now());

        sqlx::query_as(
            r#"
            INSERT INTO products (name, description, price_cents, quantity, image, in_stock, owner_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price_cents)
        .bind(&fields.quantity)
        .bind(&fields.image)
        .bind(fields.owner_id)
        .bind(&now)
        .bind(&now)
        .fetch_one(executor)
        .await
    }

    /// Apply `fields` to product `id`; `None` when no such product exists
    pub async fn update<'e, E>(
        executor: E,
        id: i64,
        fields: &ProductUpdate,
    ) -> Result<Option<Product>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let now = timestamp(chrono::Utc::now());

        sqlx::query_as(
            r#"
            UPDATE products SET
                name = ?,
                description = ?,
                price_cents = ?,
                quantity = ?,
                in_stock = ?,
                image = COALESCE(?, image),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price_cents)
        .bind(&fields.quantity)
        .bind(fields.in_stock)
        .bind(&fields.image)
        .bind(&now)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Delete product `id`, returning whether a row was removed
    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, Role, User};

    fn tomatoes(owner_id: Option<i64>) -> NewProduct {
        NewProduct {
            name: "Tomatoes".to_string(),
            description: Some("Vine ripened".to_string()),
            price_cents: 350,
            quantity: "1kg".to_string(),
            image: "abc_tomatoes.png".to_string(),
            owner_id,
        }
    }

    async fn farmer(pool: &SqlitePool, username: &str) -> i64 {
        User::insert(pool, username, "not-a-real-hash", Role::Farmer)
            .await
            .unwrap()
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(350), "3.50");
        assert_eq!(format_price(5), "0.05");
        assert_eq!(format_price(1200), "12.00");
        assert_eq!(format_price(0), "0.00");
    }

    #[tokio::test]
    async fn test_create_then_get_returns_same_fields() {
        let pool = db::connect_in_memory().await.unwrap();
        let owner = farmer(&pool, "farmer1").await;

        let fields = tomatoes(Some(owner));
        let created = Product::create(&pool, &fields).await.unwrap();
        let fetched = Product::get(&pool, created.id).await.unwrap().unwrap();

        assert_eq!(created, fetched);
        assert_eq!(fetched.name, fields.name);
        assert_eq!(fetched.description, fields.description);
        assert_eq!(fetched.price_cents, fields.price_cents);
        assert_eq!(fetched.quantity, fields.quantity);
        assert_eq!(fetched.image, fields.image);
        assert_eq!(fetched.owner_id, Some(owner));
        assert!(fetched.in_stock);
        // second-precision UTC, same shape as session expiry
        assert_eq!(fetched.created_at.len(), "2026-01-01T00:00:00Z".len());
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[tokio::test]
    async fn test_list_filters_by_stock_and_owner() {
        let pool = db::connect_in_memory().await.unwrap();
        let f1 = farmer(&pool, "farmer1").await;
        let f2 = farmer(&pool, "farmer2").await;

        let a = Product::create(&pool, &tomatoes(Some(f1))).await.unwrap();
        let b = Product::create(&pool, &tomatoes(Some(f2))).await.unwrap();
        let c = Product::create(&pool, &tomatoes(None)).await.unwrap();

        let update = ProductUpdate {
            name: b.name.clone(),
            description: b.description.clone(),
            price_cents: b.price_cents,
            quantity: b.quantity.clone(),
            in_stock: false,
            image: None,
        };
        Product::update(&pool, b.id, &update).await.unwrap().unwrap();

        let all: Vec<i64> = Product::list(&pool, &ProductFilter::all())
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(all, vec![a.id, b.id, c.id]);

        let stocked: Vec<i64> = Product::list(&pool, &ProductFilter::in_stock())
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(stocked, vec![a.id, c.id]);

        let owned: Vec<i64> = Product::list(&pool, &ProductFilter::owned_by(f1))
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(owned, vec![a.id]);
    }

    #[tokio::test]
    async fn test_update_keeps_image_unless_replaced() {
        let pool = db::connect_in_memory().await.unwrap();
        let created = Product::create(&pool, &tomatoes(None)).await.unwrap();

        let mut update = ProductUpdate {
            name: "Cherry tomatoes".to_string(),
            description: None,
            price_cents: 420,
            quantity: "500g".to_string(),
            in_stock: true,
            image: None,
        };
        let updated = Product::update(&pool, created.id, &update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Cherry tomatoes");
        assert_eq!(updated.description, None);
        assert_eq!(updated.price_cents, 420);
        assert_eq!(updated.image, "abc_tomatoes.png");

        update.image = Some("def_cherry.png".to_string());
        let updated = Product::update(&pool, created.id, &update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.image, "def_cherry.png");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_product() {
        let pool = db::connect_in_memory().await.unwrap();
        let update = ProductUpdate {
            name: "Ghost".to_string(),
            description: None,
            price_cents: 1,
            quantity: "1".to_string(),
            in_stock: true,
            image: None,
        };

        assert!(Product::update(&pool, 999, &update).await.unwrap().is_none());
        assert!(!Product::delete(&pool, 999).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let pool = db::connect_in_memory().await.unwrap();
        let created = Product::create(&pool, &tomatoes(None)).await.unwrap();

        assert!(Product::delete(&pool, created.id).await.unwrap());
        assert!(Product::get(&pool, created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_price_rejected_by_schema() {
        let pool = db::connect_in_memory().await.unwrap();
        let mut fields = tomatoes(None);
        fields.price_cents = -1;

        assert!(Product::create(&pool, &fields).await.is_err());
    }
}
