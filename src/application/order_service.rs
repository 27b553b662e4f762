use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::order::{
    Order, OrderCancelled, OrderConfirmed, OrderCreated, OrderDelivered, OrderEvent, OrderItem,
    OrderItemAdded, OrderItemRemoved, OrderStatus,
};
use crate::domain::product::{ProductEvent, ProductStockChanged};
use crate::metrics::Metrics;
use crate::persistence::{
    OrderRepository, ProductRepository, StoreError, UnitOfWork, UnitOfWorkFactory,
};
use crate::utils::RetryConfig;

use super::{execute, publish, AddItem, OrderView, ServiceError};

// ============================================================================
// Order Service - coordinates orders with product stock
// ============================================================================
//
// Every method that moves stock does it in the same unit of work that saves
// the order:
// - add_item     reserves stock on the product
// - remove_item  returns the removed line's stock
// - cancel_order returns the stock of every line
//
// ============================================================================

pub struct OrderService<F: UnitOfWorkFactory> {
    store: Arc<F>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl<F: UnitOfWorkFactory> OrderService<F> {
    pub fn new(store: Arc<F>, metrics: Arc<Metrics>, retry: RetryConfig) -> Self {
        Self { store, metrics, retry }
    }

    /// Open an empty pending order for `user_id`.
    pub async fn create_order(&self, user_id: i64) -> Result<OrderView, ServiceError> {
        execute(&self.metrics, &self.retry, "create_order", move |_| self.try_create(user_id)).await
    }

    pub async fn get_order(&self, order_id: i64) -> Result<OrderView, ServiceError> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(order_id))?;
        Ok(OrderView::from(&order))
    }

    pub async fn list_user_orders(&self, user_id: i64) -> Result<Vec<OrderView>, ServiceError> {
        let mut uow = self.store.begin().await?;
        let orders = uow.list_orders_by_user(user_id).await?;
        Ok(orders.iter().map(OrderView::from).collect())
    }

    /// Add a line to the order and reserve its stock.
    ///
    /// Either both the order and the product are saved, or neither is.
    pub async fn add_item(&self, order_id: i64, item: AddItem) -> Result<OrderView, ServiceError> {
        execute(&self.metrics, &self.retry, "add_item", move |_| self.try_add_item(order_id, item)).await
    }

    /// Drop the line for `product_id` and return its stock. A product the
    /// order does not contain is a no-op.
    pub async fn remove_item(&self, order_id: i64, product_id: i64) -> Result<OrderView, ServiceError> {
        execute(&self.metrics, &self.retry, "remove_item", move |_| {
            self.try_remove_item(order_id, product_id)
        })
        .await
    }

    pub async fn confirm_order(&self, order_id: i64) -> Result<OrderView, ServiceError> {
        execute(&self.metrics, &self.retry, "confirm_order", move |_| self.try_confirm(order_id)).await
    }

    /// Cancel the order and restore the stock of every line.
    pub async fn cancel_order(&self, order_id: i64) -> Result<OrderView, ServiceError> {
        execute(&self.metrics, &self.retry, "cancel_order", move |_| self.try_cancel(order_id)).await
    }

    pub async fn deliver_order(&self, order_id: i64) -> Result<OrderView, ServiceError> {
        execute(&self.metrics, &self.retry, "deliver_order", move |_| self.try_deliver(order_id)).await
    }

    // ========================================================================
    // Units of work
    // ========================================================================

    async fn load_order(uow: &mut F::Uow, order_id: i64) -> Result<Order, ServiceError> {
        uow.get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(order_id))
    }

    async fn try_create(&self, user_id: i64) -> Result<OrderView, ServiceError> {
        let mut uow = self.store.begin().await?;
        let order = uow.add_order(Order::new(user_id)).await?;
        let order_id = order.id.ok_or(StoreError::Unsaved("Order"))?;

        publish(&mut uow, order_id, OrderEvent::Created(OrderCreated { user_id }), Uuid::new_v4()).await?;
        uow.commit().await?;

        self.metrics.record_order_transition(OrderStatus::Pending.as_str());
        tracing::info!(order_id, user_id, "Order created");
        Ok(OrderView::from(&order))
    }

    async fn try_add_item(&self, order_id: i64, item: AddItem) -> Result<OrderView, ServiceError> {
        let mut uow = self.store.begin().await?;
        let mut order = Self::load_order(&mut uow, order_id).await?;
        let mut product = uow
            .get_product(item.product_id)
            .await?
            .ok_or_else(|| ServiceError::product_not_found(item.product_id))?;

        order.add_item(&product, item.quantity)?;
        product.remove_stock(item.quantity)?;

        uow.update_order(&mut order).await?;
        uow.update_product(&mut product).await?;

        let correlation_id = Uuid::new_v4();
        publish(
            &mut uow,
            order_id,
            OrderEvent::ItemAdded(OrderItemAdded {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: product.price(),
            }),
            correlation_id,
        )
        .await?;
        publish(
            &mut uow,
            item.product_id,
            ProductEvent::StockReserved(ProductStockChanged {
                order_id,
                amount: item.quantity,
                remaining: product.quantity(),
            }),
            correlation_id,
        )
        .await?;
        uow.commit().await?;

        self.metrics.record_item_added(item.quantity);
        tracing::info!(
            order_id,
            product_id = item.product_id,
            quantity = item.quantity,
            remaining_stock = product.quantity(),
            "Item added to order"
        );
        Ok(OrderView::from(&order))
    }

    async fn try_remove_item(&self, order_id: i64, product_id: i64) -> Result<OrderView, ServiceError> {
        let mut uow = self.store.begin().await?;
        let mut order = Self::load_order(&mut uow, order_id).await?;

        let Some(removed) = order.remove_item(product_id)? else {
            tracing::debug!(order_id, product_id, "Product not in order, nothing to remove");
            uow.rollback().await?;
            return Ok(OrderView::from(&order));
        };

        let correlation_id = Uuid::new_v4();
        let restored = restore_stock(&mut uow, order_id, &removed, correlation_id).await?;

        uow.update_order(&mut order).await?;
        publish(
            &mut uow,
            order_id,
            OrderEvent::ItemRemoved(OrderItemRemoved { item: removed }),
            correlation_id,
        )
        .await?;
        uow.commit().await?;

        self.metrics.record_stock_movement("restored", restored);
        tracing::info!(order_id, product_id, restored, "Item removed from order");
        Ok(OrderView::from(&order))
    }

    async fn try_confirm(&self, order_id: i64) -> Result<OrderView, ServiceError> {
        let mut uow = self.store.begin().await?;
        let mut order = Self::load_order(&mut uow, order_id).await?;

        order.confirm()?;
        uow.update_order(&mut order).await?;

        let confirmed = OrderConfirmed {
            total_amount: order.total_amount(),
            confirmed_at: Utc::now(),
        };
        publish(&mut uow, order_id, OrderEvent::Confirmed(confirmed), Uuid::new_v4()).await?;
        uow.commit().await?;

        self.metrics.record_order_transition(order.status().as_str());
        tracing::info!(order_id, total_amount = order.total_amount(), "Order confirmed");
        Ok(OrderView::from(&order))
    }

    async fn try_cancel(&self, order_id: i64) -> Result<OrderView, ServiceError> {
        let mut uow = self.store.begin().await?;
        let mut order = Self::load_order(&mut uow, order_id).await?;

        order.cancel()?;

        let correlation_id = Uuid::new_v4();
        let mut restored_units = 0;
        for item in order.items() {
            restored_units += restore_stock(&mut uow, order_id, item, correlation_id).await?;
        }

        uow.update_order(&mut order).await?;
        publish(
            &mut uow,
            order_id,
            OrderEvent::Cancelled(OrderCancelled { restored_units }),
            correlation_id,
        )
        .await?;
        uow.commit().await?;

        self.metrics.record_order_transition(order.status().as_str());
        self.metrics.record_stock_movement("restored", restored_units);
        tracing::info!(order_id, restored_units, "Order cancelled");
        Ok(OrderView::from(&order))
    }

    async fn try_deliver(&self, order_id: i64) -> Result<OrderView, ServiceError> {
        let mut uow = self.store.begin().await?;
        let mut order = Self::load_order(&mut uow, order_id).await?;

        order.deliver()?;
        uow.update_order(&mut order).await?;

        let delivered = OrderDelivered { delivered_at: Utc::now() };
        publish(&mut uow, order_id, OrderEvent::Delivered(delivered), Uuid::new_v4()).await?;
        uow.commit().await?;

        self.metrics.record_order_transition(order.status().as_str());
        tracing::info!(order_id, "Order delivered");
        Ok(OrderView::from(&order))
    }
}

/// Put `item`'s quantity back on its product. A product deleted since the
/// order was placed is skipped. Returns the number of units restored.
async fn restore_stock<U: UnitOfWork>(
    uow: &mut U,
    order_id: i64,
    item: &OrderItem,
    correlation_id: Uuid,
) -> Result<i64, ServiceError> {
    let Some(mut product) = uow.get_product(item.product_id()).await? else {
        tracing::warn!(
            order_id,
            product_id = item.product_id(),
            "Product no longer exists, stock not restored"
        );
        return Ok(0);
    };

    product.add_stock(item.quantity())?;
    uow.update_product(&mut product).await?;
    publish(
        uow,
        item.product_id(),
        ProductEvent::StockRestored(ProductStockChanged {
            order_id,
            amount: item.quantity(),
            remaining: product.quantity(),
        }),
        correlation_id,
    )
    .await?;

    Ok(item.quantity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{ProductCreate, ProductService};
    use crate::domain::order::OrderError;
    use crate::domain::RuleViolation;
    use crate::persistence::{InMemoryStore, SqliteStore};

    struct Fixture<S: UnitOfWorkFactory> {
        store: Arc<S>,
        products: ProductService<S>,
        orders: OrderService<S>,
        metrics: Arc<Metrics>,
    }

    fn fixture<S: UnitOfWorkFactory>(store: S) -> Fixture<S> {
        let store = Arc::new(store);
        let metrics = Arc::new(Metrics::new().unwrap());
        Fixture {
            products: ProductService::new(store.clone(), metrics.clone(), RetryConfig::default()),
            orders: OrderService::new(store.clone(), metrics.clone(), RetryConfig::default()),
            store,
            metrics,
        }
    }

    async fn product<S: UnitOfWorkFactory>(fx: &Fixture<S>, name: &str, price: f64, quantity: i64) -> i64 {
        let input = ProductCreate {
            name: name.to_string(),
            price,
            quantity,
        };
        fx.products.create_product(&input).await.unwrap().id.unwrap()
    }

    async fn stock<S: UnitOfWorkFactory>(fx: &Fixture<S>, product_id: i64) -> i64 {
        fx.products.get_product(product_id).await.unwrap().quantity
    }

    async fn event_types<S: UnitOfWorkFactory>(fx: &Fixture<S>) -> Vec<String> {
        fx.store
            .outbox(100)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.event_type)
            .collect()
    }

    #[tokio::test]
    async fn test_add_item_reserves_stock_and_merges_lines() {
        let fx = fixture(InMemoryStore::new());
        let widget = product(&fx, "Widget", 10.0, 10).await;
        let order_id = fx.orders.create_order(42).await.unwrap().id.unwrap();

        fx.orders.add_item(order_id, AddItem { product_id: widget, quantity: 2 }).await.unwrap();
        let view = fx.orders.add_item(order_id, AddItem { product_id: widget, quantity: 3 }).await.unwrap();

        assert_eq!(view.items_count, 1);
        assert_eq!(view.items[0].quantity, 5);
        assert_eq!(view.total_amount, 50.0);
        assert_eq!(stock(&fx, widget).await, 5);
        assert_eq!(fx.metrics.order_items_added.get(), 2);
    }

    #[tokio::test]
    async fn test_failed_add_item_changes_nothing() {
        let fx = fixture(InMemoryStore::new());
        let widget = product(&fx, "Widget", 10.0, 5).await;
        let order_id = fx.orders.create_order(42).await.unwrap().id.unwrap();
        let outbox_before = event_types(&fx).await.len();

        let err = fx
            .orders
            .add_item(order_id, AddItem { product_id: widget, quantity: 6 })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::InvalidOperation(RuleViolation::Order(OrderError::InsufficientStock { .. }))
        ));
        assert_eq!(stock(&fx, widget).await, 5);
        assert_eq!(fx.orders.get_order(order_id).await.unwrap().items_count, 0);
        assert_eq!(event_types(&fx).await.len(), outbox_before);
    }

    #[tokio::test]
    async fn test_add_item_with_unknown_ids() {
        let fx = fixture(InMemoryStore::new());
        let widget = product(&fx, "Widget", 10.0, 5).await;
        let order_id = fx.orders.create_order(1).await.unwrap().id.unwrap();

        let missing_order = fx.orders.add_item(77, AddItem { product_id: widget, quantity: 1 }).await;
        assert!(matches!(missing_order, Err(ServiceError::NotFound { entity: "Order", id: 77 })));

        let missing_product = fx.orders.add_item(order_id, AddItem { product_id: 88, quantity: 1 }).await;
        assert!(matches!(missing_product, Err(ServiceError::NotFound { entity: "Product", id: 88 })));
    }

    #[tokio::test]
    async fn test_confirm_lifecycle() {
        let fx = fixture(InMemoryStore::new());
        let widget = product(&fx, "Widget", 10.0, 5).await;
        let order_id = fx.orders.create_order(42).await.unwrap().id.unwrap();

        let empty = fx.orders.confirm_order(order_id).await;
        assert!(matches!(
            empty,
            Err(ServiceError::InvalidOperation(RuleViolation::Order(OrderError::EmptyOrder)))
        ));

        fx.orders.add_item(order_id, AddItem { product_id: widget, quantity: 2 }).await.unwrap();
        let confirmed = fx.orders.confirm_order(order_id).await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);

        let again = fx.orders.confirm_order(order_id).await;
        assert!(matches!(
            again,
            Err(ServiceError::InvalidOperation(RuleViolation::Order(OrderError::NotPending(
                OrderStatus::Confirmed
            ))))
        ));
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_once() {
        let fx = fixture(InMemoryStore::new());
        let widget = product(&fx, "Widget", 10.0, 10).await;
        let gadget = product(&fx, "Gadget", 4.0, 3).await;
        let order_id = fx.orders.create_order(42).await.unwrap().id.unwrap();

        fx.orders.add_item(order_id, AddItem { product_id: widget, quantity: 4 }).await.unwrap();
        fx.orders.add_item(order_id, AddItem { product_id: gadget, quantity: 3 }).await.unwrap();
        fx.orders.confirm_order(order_id).await.unwrap();
        assert_eq!(stock(&fx, widget).await, 6);
        assert_eq!(stock(&fx, gadget).await, 0);

        let cancelled = fx.orders.cancel_order(order_id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock(&fx, widget).await, 10);
        assert_eq!(stock(&fx, gadget).await, 3);

        let again = fx.orders.cancel_order(order_id).await;
        assert!(matches!(
            again,
            Err(ServiceError::InvalidOperation(RuleViolation::Order(OrderError::CannotCancel(_))))
        ));
        assert_eq!(stock(&fx, widget).await, 10);
    }

    #[tokio::test]
    async fn test_cancel_skips_deleted_products() {
        let fx = fixture(InMemoryStore::new());
        let widget = product(&fx, "Widget", 10.0, 10).await;
        let gadget = product(&fx, "Gadget", 4.0, 3).await;
        let order_id = fx.orders.create_order(42).await.unwrap().id.unwrap();

        fx.orders.add_item(order_id, AddItem { product_id: widget, quantity: 4 }).await.unwrap();
        fx.orders.add_item(order_id, AddItem { product_id: gadget, quantity: 1 }).await.unwrap();
        fx.products.delete_product(gadget).await.unwrap();

        fx.orders.cancel_order(order_id).await.unwrap();
        assert_eq!(stock(&fx, widget).await, 10);

        let types = event_types(&fx).await;
        assert_eq!(types.last().map(String::as_str), Some("OrderCancelled"));
    }

    #[tokio::test]
    async fn test_remove_item_restores_stock() {
        let fx = fixture(InMemoryStore::new());
        let widget = product(&fx, "Widget", 10.0, 10).await;
        let order_id = fx.orders.create_order(42).await.unwrap().id.unwrap();
        fx.orders.add_item(order_id, AddItem { product_id: widget, quantity: 4 }).await.unwrap();

        let view = fx.orders.remove_item(order_id, widget).await.unwrap();
        assert_eq!(view.items_count, 0);
        assert_eq!(stock(&fx, widget).await, 10);

        // absent line is a no-op
        let outbox_before = event_types(&fx).await.len();
        fx.orders.remove_item(order_id, widget).await.unwrap();
        assert_eq!(event_types(&fx).await.len(), outbox_before);
    }

    #[tokio::test]
    async fn test_deliver_requires_confirmation() {
        let fx = fixture(InMemoryStore::new());
        let widget = product(&fx, "Widget", 10.0, 10).await;
        let order_id = fx.orders.create_order(42).await.unwrap().id.unwrap();
        fx.orders.add_item(order_id, AddItem { product_id: widget, quantity: 1 }).await.unwrap();

        assert!(matches!(
            fx.orders.deliver_order(order_id).await,
            Err(ServiceError::InvalidOperation(RuleViolation::Order(OrderError::NotConfirmed(_))))
        ));

        fx.orders.confirm_order(order_id).await.unwrap();
        let delivered = fx.orders.deliver_order(order_id).await.unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);

        assert!(fx.orders.cancel_order(order_id).await.is_err());
        assert_eq!(stock(&fx, widget).await, 9);
    }

    #[tokio::test]
    async fn test_list_user_orders() {
        let fx = fixture(InMemoryStore::new());
        fx.orders.create_order(1).await.unwrap();
        fx.orders.create_order(2).await.unwrap();
        fx.orders.create_order(1).await.unwrap();

        let orders = fx.orders.list_user_orders(1).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.user_id == 1 && o.status == OrderStatus::Pending));
    }

    #[tokio::test]
    async fn test_outbox_records_correlated_events() {
        let fx = fixture(InMemoryStore::new());
        let widget = product(&fx, "Widget", 10.0, 10).await;
        let order_id = fx.orders.create_order(42).await.unwrap().id.unwrap();
        fx.orders.add_item(order_id, AddItem { product_id: widget, quantity: 2 }).await.unwrap();

        let outbox = fx.store.outbox(100).await.unwrap();
        let types: Vec<_> = outbox.iter().map(|m| m.event_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["ProductCreated", "OrderCreated", "OrderItemAdded", "ProductStockReserved"]
        );
        assert_eq!(outbox[2].correlation_id, outbox[3].correlation_id);
        assert_eq!(outbox[3].aggregate_type, "Product");
    }

    #[tokio::test]
    async fn test_order_flow_against_sqlite() {
        let fx = fixture(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let widget = product(&fx, "Widget", 10.0, 5).await;
        let order_id = fx.orders.create_order(7).await.unwrap().id.unwrap();

        fx.orders.add_item(order_id, AddItem { product_id: widget, quantity: 2 }).await.unwrap();
        assert!(fx
            .orders
            .add_item(order_id, AddItem { product_id: widget, quantity: 4 })
            .await
            .is_err());
        assert_eq!(stock(&fx, widget).await, 3);

        let loaded = fx.orders.get_order(order_id).await.unwrap();
        assert_eq!(loaded.items[0].quantity, 2);
        assert_eq!(loaded.items[0].product_name, "Widget");

        fx.orders.confirm_order(order_id).await.unwrap();
        fx.orders.cancel_order(order_id).await.unwrap();
        assert_eq!(stock(&fx, widget).await, 5);
        assert_eq!(fx.orders.get_order(order_id).await.unwrap().status, OrderStatus::Cancelled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_items_against_sqlite_file() {
        let path = std::env::temp_dir().join(format!("order_inventory_{}.db", Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());

        let fx = fixture(SqliteStore::connect(&url).await.unwrap());
        let widget = product(&fx, "Widget", 10.0, 1000).await;
        let mut order_ids = Vec::new();
        for user_id in 0..16 {
            order_ids.push(fx.orders.create_order(user_id).await.unwrap().id.unwrap());
        }

        let orders = Arc::new(fx.orders);
        let mut handles = Vec::new();
        for order_id in order_ids.iter().copied() {
            let orders = orders.clone();
            handles.push(tokio::spawn(async move {
                orders.add_item(order_id, AddItem { product_id: widget, quantity: 1 }).await
            }));
        }

        let mut failures = Vec::new();
        for handle in handles {
            if let Err(e) = handle.await.unwrap() {
                failures.push(e.to_string());
            }
        }
        assert!(failures.is_empty(), "concurrent adds failed: {failures:?}");
        assert_eq!(fx.products.get_product(widget).await.unwrap().quantity, 984);
        for order_id in order_ids {
            assert_eq!(orders.get_order(order_id).await.unwrap().items_count, 1);
        }

        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
