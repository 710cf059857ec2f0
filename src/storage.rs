use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::debug;

use crate::models::{PriceRecord, TrackedProduct};
use crate::utils::error::AppError;

/// The persistence boundary the check cycle depends on. The chat-bot
/// command surface that fills the tables lives elsewhere; the cycle only
/// ever lists and updates.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list_tracked_products(&self) -> Result<Vec<TrackedProduct>, AppError>;
    async fn update_price(
        &self,
        product_id: i64,
        price: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

/// SQLite-backed store: products, per-subscriber tracking links, and an
/// append-only price history.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                name TEXT,
                current_price REAL,
                last_checked TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                product_id INTEGER NOT NULL REFERENCES products(id),
                chat_id TEXT NOT NULL,
                PRIMARY KEY (product_id, chat_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL REFERENCES products(id),
                price REAL NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Database schema ready");
        Ok(())
    }

    /// Insert a product if it is new; returns its id either way.
    pub async fn add_product(&self, url: &str, name: Option<&str>) -> Result<i64, AppError> {
        if url::Url::parse(url).is_err() {
            return Err(AppError::Validation(format!("Invalid URL: {}", url)));
        }

        sqlx::query("INSERT INTO products (url, name) VALUES (?, ?) ON CONFLICT(url) DO NOTHING")
            .bind(url)
            .bind(name)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT id FROM products WHERE url = ?")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("id")?)
    }

    pub async fn subscribe(&self, product_id: i64, chat_id: &str) -> Result<(), AppError> {
        sqlx::query("INSERT OR IGNORE INTO subscriptions (product_id, chat_id) VALUES (?, ?)")
            .bind(product_id)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn unsubscribe(&self, product_id: i64, chat_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM subscriptions WHERE product_id = ? AND chat_id = ?")
            .bind(product_id)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn price_history(&self, product_id: i64) -> Result<Vec<PriceRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT product_id, price, recorded_at FROM price_history
             WHERE product_id = ? ORDER BY id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PriceRecord {
                    product_id: row.try_get("product_id")?,
                    price: row.try_get("price")?,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProductStore for SqliteStore {
    /// Only products with at least one subscriber are worth checking.
    /// Ordered by id so a cycle always visits products deterministically.
    async fn list_tracked_products(&self) -> Result<Vec<TrackedProduct>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.url, p.name, p.current_price, p.last_checked, s.chat_id
            FROM products p
            JOIN subscriptions s ON s.product_id = p.id
            ORDER BY p.id, s.chat_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut products: Vec<TrackedProduct> = Vec::new();
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let chat_id: String = row.try_get("chat_id")?;

            match products.last_mut() {
                Some(last) if last.id == id => last.subscribers.push(chat_id),
                _ => products.push(TrackedProduct {
                    id,
                    url: row.try_get("url")?,
                    name: row.try_get("name")?,
                    current_price: row.try_get("current_price")?,
                    last_checked: row.try_get("last_checked")?,
                    subscribers: vec![chat_id],
                }),
            }
        }
        Ok(products)
    }

    async fn update_price(
        &self,
        product_id: i64,
        price: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE products SET current_price = ?, last_checked = ? WHERE id = ?")
            .bind(price)
            .bind(captured_at)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO price_history (product_id, price, recorded_at) VALUES (?, ?, ?)")
            .bind(product_id)
            .bind(price)
            .bind(captured_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> SqliteStore {
        // A single connection keeps every query on the same in-memory db
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_unsubscribed_products_are_not_listed() {
        let store = test_store().await;
        store
            .add_product("https://www.costco.ca/a.product.100000001.html", None)
            .await
            .unwrap();

        assert!(store.list_tracked_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_product_rejects_invalid_url() {
        let store = test_store().await;
        let err = store.add_product("not-a-url", None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_add_product_is_idempotent() {
        let store = test_store().await;
        let url = "https://www.costco.ca/a.product.100000001.html";

        let first = store.add_product(url, Some("Olive Oil")).await.unwrap();
        let second = store.add_product(url, None).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_subscribers_are_aggregated() {
        let store = test_store().await;
        let id = store
            .add_product("https://www.costco.ca/a.product.100000001.html", None)
            .await
            .unwrap();
        store.subscribe(id, "111").await.unwrap();
        store.subscribe(id, "222").await.unwrap();
        store.subscribe(id, "222").await.unwrap(); // duplicate is ignored

        let products = store.list_tracked_products().await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].subscribers, vec!["111", "222"]);
    }

    #[tokio::test]
    async fn test_update_price_and_history() {
        let store = test_store().await;
        let id = store
            .add_product("https://www.costco.ca/a.product.100000001.html", None)
            .await
            .unwrap();
        store.subscribe(id, "111").await.unwrap();

        store.update_price(id, 24.99, Utc::now()).await.unwrap();
        store.update_price(id, 19.99, Utc::now()).await.unwrap();

        let products = store.list_tracked_products().await.unwrap();
        assert_eq!(products[0].current_price, Some(19.99));
        assert!(products[0].last_checked.is_some());

        let history = store.price_history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].price, 24.99);
        assert_eq!(history[1].price, 19.99);
    }

    #[tokio::test]
    async fn test_products_listed_in_stable_order() {
        let store = test_store().await;
        let a = store
            .add_product("https://www.costco.ca/a.product.100000001.html", None)
            .await
            .unwrap();
        let b = store
            .add_product("https://www.costco.ca/b.product.100000002.html", None)
            .await
            .unwrap();
        store.subscribe(b, "111").await.unwrap();
        store.subscribe(a, "111").await.unwrap();

        let products = store.list_tracked_products().await.unwrap();
        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_tracking() {
        let store = test_store().await;
        let id = store
            .add_product("https://www.costco.ca/a.product.100000001.html", None)
            .await
            .unwrap();
        store.subscribe(id, "111").await.unwrap();
        store.unsubscribe(id, "111").await.unwrap();

        assert!(store.list_tracked_products().await.unwrap().is_empty());
    }
}
