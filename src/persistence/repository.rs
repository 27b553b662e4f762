use async_trait::async_trait;

use crate::domain::order::Order;
use crate::domain::product::Product;
use crate::outbox::OutboxMessage;
use super::errors::StoreError;

// ============================================================================
// Repository Interfaces
// ============================================================================
//
// Narrow, storage-agnostic views over the tables a unit of work can touch.
// Updates take `&mut` so the repository can bump the entity's version after a
// successful optimistic write.
//
// ============================================================================

#[async_trait]
pub trait ProductRepository: Send {
    /// Insert a new product and return it with its assigned id.
    async fn add_product(&mut self, product: Product) -> Result<Product, StoreError>;

    async fn get_product(&mut self, id: i64) -> Result<Option<Product>, StoreError>;

    /// Products ordered by id.
    async fn list_products(&mut self, skip: i64, limit: i64) -> Result<Vec<Product>, StoreError>;

    /// Write back a loaded product. Fails with `VersionConflict` when someone
    /// else saved it since it was loaded.
    async fn update_product(&mut self, product: &mut Product) -> Result<(), StoreError>;

    async fn delete_product(&mut self, id: i64) -> Result<bool, StoreError>;

    /// Case-insensitive substring match on the name.
    async fn find_products_by_name(&mut self, name: &str) -> Result<Vec<Product>, StoreError>;

    /// Inclusive price range, cheapest first.
    async fn filter_products_by_price(&mut self, min: f64, max: f64) -> Result<Vec<Product>, StoreError>;
}

#[async_trait]
pub trait OrderRepository: Send {
    async fn add_order(&mut self, order: Order) -> Result<Order, StoreError>;

    async fn get_order(&mut self, id: i64) -> Result<Option<Order>, StoreError>;

    async fn list_orders_by_user(&mut self, user_id: i64) -> Result<Vec<Order>, StoreError>;

    /// Write back status and the full item list.
    async fn update_order(&mut self, order: &mut Order) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OutboxRepository: Send {
    async fn append_outbox(&mut self, message: OutboxMessage) -> Result<(), StoreError>;
}

// ============================================================================
// Unit of Work
// ============================================================================

/// A single transaction over every repository.
///
/// Changes become visible only through `commit`. Dropping the unit of work
/// without committing, on any path including `?` and panics, discards them.
#[async_trait]
pub trait UnitOfWork: ProductRepository + OrderRepository + OutboxRepository + Sized {
    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Hands out units of work over a shared store.
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    type Uow: UnitOfWork;

    async fn begin(&self) -> Result<Self::Uow, StoreError>;

    /// Committed outbox entries in write order, at most `limit`.
    async fn outbox(&self, limit: i64) -> Result<Vec<OutboxMessage>, StoreError>;
}
