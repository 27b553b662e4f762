use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::order::Order;
use crate::domain::product::Product;
use crate::outbox::OutboxMessage;
use super::errors::StoreError;
use super::repository::{
    OrderRepository, OutboxRepository, ProductRepository, UnitOfWork, UnitOfWorkFactory,
};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Keyed maps behind an async mutex. A unit of work takes the lock for its
// whole lifetime, so units of work are serialised. Reads go straight to the
// committed tables; the first write copies them and later writes edit the
// copy. New outbox rows are staged separately and appended on commit, so
// the outbox history is never copied. Dropping the unit discards both.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Tables {
    products: BTreeMap<i64, Product>,
    orders: BTreeMap<i64, Order>,
    last_product_id: i64,
    last_order_id: i64,
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    outbox: Vec<OutboxMessage>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<State>,
    working: Option<Tables>,
    staged: Vec<OutboxMessage>,
}

impl InMemoryUnitOfWork {
    fn tables(&self) -> &Tables {
        self.working.as_ref().unwrap_or(&self.guard.tables)
    }

    fn tables_mut(&mut self) -> &mut Tables {
        self.working.get_or_insert_with(|| self.guard.tables.clone())
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryStore {
    type Uow = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(InMemoryUnitOfWork {
            guard,
            working: None,
            staged: Vec::new(),
        })
    }

    async fn outbox(&self, limit: i64) -> Result<Vec<OutboxMessage>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.outbox.iter().take(clamp(limit)).cloned().collect())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        let InMemoryUnitOfWork { mut guard, working, staged } = self;
        if let Some(tables) = working {
            guard.tables = tables;
        }
        guard.outbox.extend(staged);
        tracing::debug!("In-memory unit of work committed");
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        tracing::debug!("In-memory unit of work rolled back");
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for InMemoryUnitOfWork {
    async fn add_product(&mut self, mut product: Product) -> Result<Product, StoreError> {
        let tables = self.tables_mut();
        tables.last_product_id += 1;
        let id = tables.last_product_id;

        product.id = Some(id);
        product.version = 1;
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    async fn get_product(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        Ok(self.tables().products.get(&id).cloned())
    }

    async fn list_products(&mut self, skip: i64, limit: i64) -> Result<Vec<Product>, StoreError> {
        Ok(self
            .tables()
            .products
            .values()
            .skip(clamp(skip))
            .take(clamp(limit))
            .cloned()
            .collect())
    }

    async fn update_product(&mut self, product: &mut Product) -> Result<(), StoreError> {
        let id = product.id.ok_or(StoreError::Unsaved("product"))?;
        let stored = self
            .tables_mut()
            .products
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "product", id })?;

        if stored.version != product.version {
            return Err(StoreError::VersionConflict {
                entity: "product",
                id,
                expected: product.version,
            });
        }

        product.version += 1;
        *stored = product.clone();
        Ok(())
    }

    async fn delete_product(&mut self, id: i64) -> Result<bool, StoreError> {
        if !self.tables().products.contains_key(&id) {
            return Ok(false);
        }
        Ok(self.tables_mut().products.remove(&id).is_some())
    }

    async fn find_products_by_name(&mut self, name: &str) -> Result<Vec<Product>, StoreError> {
        let needle = name.to_lowercase();
        Ok(self
            .tables()
            .products
            .values()
            .filter(|p| p.name().to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn filter_products_by_price(&mut self, min: f64, max: f64) -> Result<Vec<Product>, StoreError> {
        let mut found: Vec<Product> = self
            .tables()
            .products
            .values()
            .filter(|p| p.price() >= min && p.price() <= max)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.price().total_cmp(&b.price()));
        Ok(found)
    }
}

#[async_trait]
impl OrderRepository for InMemoryUnitOfWork {
    async fn add_order(&mut self, mut order: Order) -> Result<Order, StoreError> {
        let tables = self.tables_mut();
        tables.last_order_id += 1;
        let id = tables.last_order_id;

        order.id = Some(id);
        order.version = 1;
        tables.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get_order(&mut self, id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self.tables().orders.get(&id).cloned())
    }

    async fn list_orders_by_user(&mut self, user_id: i64) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .tables()
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_order(&mut self, order: &mut Order) -> Result<(), StoreError> {
        let id = order.id.ok_or(StoreError::Unsaved("order"))?;
        let stored = self
            .tables_mut()
            .orders
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "order", id })?;

        if stored.version != order.version {
            return Err(StoreError::VersionConflict {
                entity: "order",
                id,
                expected: order.version,
            });
        }

        order.version += 1;
        *stored = order.clone();
        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for InMemoryUnitOfWork {
    async fn append_outbox(&mut self, message: OutboxMessage) -> Result<(), StoreError> {
        self.staged.push(message);
        Ok(())
    }
}

fn clamp(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

// ============================================================================
// Unit Tests
// ============================================================================
