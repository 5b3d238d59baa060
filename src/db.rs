use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::models::{
    Availability, FailureKind, FetchOutcome, FetchResult, NewProduct, Product, Store,
    amount_to_cents, cents_to_amount,
};

/// Handle to the SQLite-backed product registry and price history store.
///
/// History is append-only: outcomes are inserted under the
/// `(product_id, attempt_ts)` idempotency key and never updated. WAL mode
/// keeps the file readable by a separate reporting process while the
/// scheduler writes.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    url: String,
    store: Store,
    created_at: i64,
}

#[derive(Debug, FromRow)]
struct OutcomeRow {
    product_id: String,
    attempt_ts: i64,
    price_cents: Option<i64>,
    currency: Option<String>,
    in_stock: Option<i64>,
    failure_kind: Option<FailureKind>,
    detail: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            url: row.url,
            store: row.store,
            created_at: DateTime::from_timestamp(row.created_at, 0).unwrap_or_default(),
        }
    }
}

impl From<OutcomeRow> for FetchOutcome {
    fn from(row: OutcomeRow) -> Self {
        let result = match (row.failure_kind, row.price_cents) {
            (Some(kind), _) => FetchResult::Failure {
                kind,
                detail: row.detail.unwrap_or_default(),
            },
            (None, Some(cents)) => FetchResult::Price {
                amount: cents_to_amount(cents),
                currency: row.currency,
                availability: Availability::from_db(row.in_stock),
            },
            // A row carries either a price or a failure kind; anything else
            // is a corrupt write and surfaces as a parse failure.
            (None, None) => FetchResult::Failure {
                kind: FailureKind::Parse,
                detail: "stored row has neither price nor failure".to_string(),
            },
        };

        FetchOutcome {
            product_id: row.product_id,
            ts: DateTime::from_timestamp(row.attempt_ts, 0).unwrap_or_default(),
            result,
        }
    }
}

impl Database {
    /// Open (creating if missing) the database file and run migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("database ready: {}", config.path);

        Ok(Self { pool })
    }

    /// In-memory database for tests. A single connection keeps every query
    /// on the same memory instance.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(sqlx::Error::from)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // --- Registry (thin single-row operations) ---

    /// Register a product. The URL is unique; re-adding an existing URL is a
    /// validation error, not a duplicate row.
    pub async fn add_product(&self, new_product: NewProduct) -> Result<Product> {
        let product = Product::new(new_product);

        let result = sqlx::query(
            "INSERT INTO products (id, name, url, store, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.url)
        .bind(product.store)
        .bind(product.created_at.timestamp())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(product),
            Err(e) if is_unique_violation(&e) => Err(AppError::Validation(format!(
                "already tracked: {}",
                product.url
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT id, name, url, store, created_at FROM products WHERE id = ?",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// All registered products, in registration order.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            "SELECT id, name, url, store, created_at FROM products ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    pub async fn rename_product(&self, product_id: &str, name: &str) -> Result<()> {
        sqlx::query("UPDATE products SET name = ? WHERE id = ?")
            .bind(name)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove a product. History rows cascade-delete with it.
    pub async fn remove_product(&self, product_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                resource: format!("product {product_id}"),
            });
        }
        Ok(())
    }

    // --- History store ---

    /// Persist one fetch outcome. Idempotent: recording the same logical
    /// attempt (same product and attempt timestamp) again is a no-op.
    pub async fn record(&self, outcome: &FetchOutcome) -> Result<()> {
        let (price_cents, currency, in_stock, failure_kind, detail) = match &outcome.result {
            FetchResult::Price {
                amount,
                currency,
                availability,
            } => (
                amount_to_cents(*amount),
                currency.clone(),
                availability.to_db(),
                None,
                None,
            ),
            FetchResult::Failure { kind, detail } => {
                (None, None, None, Some(*kind), Some(detail.clone()))
            }
        };

        sqlx::query(
            "INSERT INTO fetch_outcomes \
               (product_id, attempt_ts, price_cents, currency, in_stock, failure_kind, detail) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (product_id, attempt_ts) DO NOTHING",
        )
        .bind(&outcome.product_id)
        .bind(outcome.attempt_ts())
        .bind(price_cents)
        .bind(currency)
        .bind(in_stock)
        .bind(failure_kind)
        .bind(detail)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Full history for one product, timestamp ascending.
    pub async fn series_for(&self, product_id: &str) -> Result<Vec<FetchOutcome>> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(
            "SELECT product_id, attempt_ts, price_cents, currency, in_stock, failure_kind, detail \
             FROM fetch_outcomes WHERE product_id = ? ORDER BY attempt_ts ASC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FetchOutcome::from).collect())
    }

    /// History for one product within `[from, to]`, timestamp ascending.
    /// Served by the `(product_id, attempt_ts)` index; this is the chart
    /// query.
    pub async fn series_between(
        &self,
        product_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FetchOutcome>> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(
            "SELECT product_id, attempt_ts, price_cents, currency, in_stock, failure_kind, detail \
             FROM fetch_outcomes \
             WHERE product_id = ? AND attempt_ts >= ? AND attempt_ts <= ? \
             ORDER BY attempt_ts ASC",
        )
        .bind(product_id)
        .bind(from.timestamp())
        .bind(to.timestamp())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FetchOutcome::from).collect())
    }

    pub async fn latest_for(&self, product_id: &str) -> Result<Option<FetchOutcome>> {
        let row: Option<OutcomeRow> = sqlx::query_as(
            "SELECT product_id, attempt_ts, price_cents, currency, in_stock, failure_kind, detail \
             FROM fetch_outcomes WHERE product_id = ? ORDER BY attempt_ts DESC LIMIT 1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FetchOutcome::from))
    }

    /// Latest outcome per product in one query, for list views.
    pub async fn latest_all(&self) -> Result<HashMap<String, FetchOutcome>> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(
            "SELECT o.product_id, o.attempt_ts, o.price_cents, o.currency, o.in_stock, \
                    o.failure_kind, o.detail \
             FROM fetch_outcomes o \
             JOIN (SELECT product_id, MAX(attempt_ts) AS max_ts \
                   FROM fetch_outcomes GROUP BY product_id) last \
               ON last.product_id = o.product_id AND last.max_ts = o.attempt_ts",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.product_id.clone(), FetchOutcome::from(row)))
            .collect())
    }

    /// Every stored outcome, ordered by product and timestamp; used by the
    /// CSV export command.
    pub async fn all_outcomes(&self) -> Result<Vec<FetchOutcome>> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(
            "SELECT product_id, attempt_ts, price_cents, currency, in_stock, failure_kind, detail \
             FROM fetch_outcomes ORDER BY product_id, attempt_ts ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FetchOutcome::from).collect())
    }

    /// Delete every product and every outcome.
    pub async fn clear_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM fetch_outcomes")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM products").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}
