use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::domain::product::Product;
use crate::outbox::OutboxMessage;
use super::errors::StoreError;
use super::repository::{
    OrderRepository, OutboxRepository, ProductRepository, UnitOfWork, UnitOfWorkFactory,
};

const SCHEMA: &str = include_str!("schema.sql");

/// How long a unit of work waits for another writer to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PRODUCT_COLUMNS: &str = "id, name, price, quantity, version, created_at, updated_at";

// ============================================================================
// SQLite Store - sqlx-backed repositories
// ============================================================================
//
// Each unit of work owns one sqlx transaction. sqlx rolls a transaction back
// when it is dropped uncommitted, which gives the commit-or-rollback
// guarantee for free. Writes use a `version` column for optimistic
// concurrency: an UPDATE that matches no row at the expected version is a
// conflict.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url` and apply the schema.
    ///
    /// `sqlite::memory:` gets a single long-lived connection, since every
    /// connection to an in-memory database sees its own empty database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;

        tracing::info!(url = %url, "Connected to SQLite store");
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl UnitOfWorkFactory for SqliteStore {
    type Uow = SqliteUnitOfWork;

    async fn begin(&self) -> Result<SqliteUnitOfWork, StoreError> {
        // Take the write lock up front. A deferred transaction that reads and
        // then writes fails with SQLITE_BUSY without waiting when another
        // writer got there first; IMMEDIATE waits on the busy timeout instead.
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(SqliteUnitOfWork { tx })
    }

    async fn outbox(&self, limit: i64) -> Result<Vec<OutboxMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, aggregate_type, aggregate_id, event_id, event_type, correlation_id, payload, created_at
             FROM outbox_messages
             ORDER BY seq ASC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(outbox_from_row).collect()
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        tracing::debug!("SQLite unit of work committed");
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        tracing::debug!("SQLite unit of work rolled back");
        Ok(())
    }
}

impl SqliteUnitOfWork {
    /// Tell a missing row apart from a stale version after an UPDATE hit nothing.
    async fn conflict_or_missing(
        &mut self,
        entity: &'static str,
        id: i64,
        expected: i64,
    ) -> StoreError {
        let table = match entity {
            "product" => "products",
            _ => "orders",
        };
        let exists = sqlx::query(&format!("SELECT 1 FROM {} WHERE id = ?", table))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await;

        match exists {
            Ok(Some(_)) => StoreError::VersionConflict { entity, id, expected },
            Ok(None) => StoreError::NotFound { entity, id },
            Err(e) => StoreError::Database(e),
        }
    }

    async fn load_items(&mut self, order_id: i64) -> Result<Vec<OrderItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id, product_name, price, quantity
             FROM order_items
             WHERE order_id = ?
             ORDER BY position ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| -> Result<OrderItem, StoreError> {
                Ok(OrderItem::new(
                    row.try_get("product_id")?,
                    row.try_get::<String, _>("product_name")?,
                    row.try_get("price")?,
                    row.try_get("quantity")?,
                ))
            })
            .collect()
    }

    async fn order_from_row(&mut self, row: &SqliteRow) -> Result<Order, StoreError> {
        let id: i64 = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let status = OrderStatus::from_str(&status).map_err(|e| StoreError::Corrupt {
            entity: "order",
            reason: e.to_string(),
        })?;
        let items = self.load_items(id).await?;

        Ok(Order::rehydrate(
            id,
            row.try_get("user_id")?,
            status,
            items,
            row.try_get("created_at")?,
            row.try_get("version")?,
        ))
    }
}

#[async_trait]
impl ProductRepository for SqliteUnitOfWork {
    async fn add_product(&mut self, mut product: Product) -> Result<Product, StoreError> {
        let result = sqlx::query(
            "INSERT INTO products (name, price, quantity, version, created_at, updated_at)
             VALUES (?, ?, ?, 1, ?, ?)",
        )
        .bind(product.name())
        .bind(product.price())
        .bind(product.quantity())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;

        product.id = Some(result.last_insert_rowid());
        product.version = 1;

        tracing::debug!(product_id = ?product.id, name = %product.name(), "Inserted product");
        Ok(product)
    }

    async fn get_product(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn list_products(&mut self, skip: i64, limit: i64) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM products ORDER BY id ASC LIMIT ? OFFSET ?",
            PRODUCT_COLUMNS
        ))
        .bind(limit.max(0))
        .bind(skip.max(0))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(product_from_row).collect()
    }

    async fn update_product(&mut self, product: &mut Product) -> Result<(), StoreError> {
        let id = product.id.ok_or(StoreError::Unsaved("product"))?;

        let result = sqlx::query(
            "UPDATE products
             SET name = ?, price = ?, quantity = ?, updated_at = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(product.name())
        .bind(product.price())
        .bind(product.quantity())
        .bind(product.updated_at)
        .bind(id)
        .bind(product.version)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_missing("product", id, product.version).await);
        }

        product.version += 1;
        Ok(())
    }

    async fn delete_product(&mut self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_products_by_name(&mut self, name: &str) -> Result<Vec<Product>, StoreError> {
        let escaped = name
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");

        let rows = sqlx::query(&format!(
            "SELECT {} FROM products WHERE name LIKE '%' || ? || '%' ESCAPE '\\' ORDER BY id ASC",
            PRODUCT_COLUMNS
        ))
        .bind(escaped)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(product_from_row).collect()
    }

    async fn filter_products_by_price(&mut self, min: f64, max: f64) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM products WHERE price >= ? AND price <= ? ORDER BY price ASC, id ASC",
            PRODUCT_COLUMNS
        ))
        .bind(min)
        .bind(max)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(product_from_row).collect()
    }
}

#[async_trait]
impl OrderRepository for SqliteUnitOfWork {
    async fn add_order(&mut self, mut order: Order) -> Result<Order, StoreError> {
        let result = sqlx::query(
            "INSERT INTO orders (user_id, status, version, created_at) VALUES (?, ?, 1, ?)",
        )
        .bind(order.user_id)
        .bind(order.status().as_str())
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await?;

        let id = result.last_insert_rowid();
        order.id = Some(id);
        order.version = 1;

        insert_items(&mut self.tx, id, order.items()).await?;

        tracing::debug!(order_id = id, user_id = order.user_id, "Inserted order");
        Ok(order)
    }

    async fn get_order(&mut self, id: i64) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, status, version, created_at FROM orders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(Some(self.order_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_orders_by_user(&mut self, user_id: i64) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, status, version, created_at
             FROM orders
             WHERE user_id = ?
             ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(self.order_from_row(row).await?);
        }
        Ok(orders)
    }

    async fn update_order(&mut self, order: &mut Order) -> Result<(), StoreError> {
        let id = order.id.ok_or(StoreError::Unsaved("order"))?;

        let result = sqlx::query(
            "UPDATE orders SET status = ?, version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(order.status().as_str())
        .bind(id)
        .bind(order.version)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_missing("order", id, order.version).await);
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        insert_items(&mut self.tx, id, order.items()).await?;

        order.version += 1;
        Ok(())
    }

}

#[async_trait]
impl OutboxRepository for SqliteUnitOfWork {
    async fn append_outbox(&mut self, message: OutboxMessage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO outbox_messages (
                id, aggregate_type, aggregate_id, event_id, event_type,
                correlation_id, payload, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id)
        .bind(&message.aggregate_type)
        .bind(message.aggregate_id)
        .bind(message.event_id)
        .bind(&message.event_type)
        .bind(message.correlation_id)
        .bind(&message.payload)
        .bind(message.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }
}

async fn insert_items(
    tx: &mut Transaction<'static, Sqlite>,
    order_id: i64,
    items: &[OrderItem],
) -> Result<(), StoreError> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_items (order_id, position, product_id, product_name, price, quantity)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(position as i64)
        .bind(item.product_id())
        .bind(item.product_name())
        .bind(item.price())
        .bind(item.quantity())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn product_from_row(row: &SqliteRow) -> Result<Product, StoreError> {
    Ok(Product::rehydrate(
        row.try_get("id")?,
        row.try_get("name")?,
        row.try_get("price")?,
        row.try_get("quantity")?,
        row.try_get::<DateTime<Utc>, _>("created_at")?,
        row.try_get::<DateTime<Utc>, _>("updated_at")?,
        row.try_get("version")?,
    ))
}

fn outbox_from_row(row: &SqliteRow) -> Result<OutboxMessage, StoreError> {
    Ok(OutboxMessage {
        id: row.try_get::<Uuid, _>("id")?,
        aggregate_type: row.try_get("aggregate_type")?,
        aggregate_id: row.try_get("aggregate_id")?,
        event_id: row.try_get::<Uuid, _>("event_id")?,
        event_type: row.try_get("event_type")?,
        correlation_id: row.try_get::<Uuid, _>("correlation_id")?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// Unit Tests
// ============================================================================
