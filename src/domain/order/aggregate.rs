use serde::Serialize;
use chrono::{DateTime, Utc};

use crate::domain::product::Product;
use super::value_objects::{OrderItem, OrderStatus};
use super::errors::OrderError;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// The order owns its items outright. It checks stock availability when an
// item is added but never touches Product stock itself: reserving and
// restoring stock is the orchestrating service's job, done in the same unit
// of work that saves the order.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    // Identity
    pub id: Option<i64>,
    pub user_id: i64,

    // Current State
    status: OrderStatus,
    items: Vec<OrderItem>,

    pub created_at: DateTime<Utc>,
    pub(crate) version: i64,
}

impl Order {
    /// New, empty, pending order.
    pub fn new(user_id: i64) -> Self {
        Self {
            id: None,
            user_id,
            status: OrderStatus::Pending,
            items: Vec::new(),
            created_at: Utc::now(),
            version: 0,
        }
    }

    pub(crate) fn rehydrate(
        id: i64,
        user_id: i64,
        status: OrderStatus,
        items: Vec<OrderItem>,
        created_at: DateTime<Utc>,
        version: i64,
    ) -> Self {
        Self {
            id: Some(id),
            user_id,
            status,
            items,
            created_at,
            version,
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item(&self, product_id: i64) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.product_id() == product_id)
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn total_amount(&self) -> f64 {
        self.items.iter().map(OrderItem::subtotal).sum()
    }

    /// Number of distinct lines, not units.
    pub fn items_count(&self) -> usize {
        self.items.len()
    }

    /// Add `quantity` units of `product`.
    ///
    /// Only pending orders accept items; any other status fails with
    /// `NotModifiable` before the quantity and stock checks run.
    ///
    /// A second add of the same product grows the existing line instead of
    /// appending a new one. New lines snapshot the product's current name and
    /// price; later price changes do not reach existing orders.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> Result<(), OrderError> {
        self.ensure_modifiable()?;

        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }

        let product_id = product
            .id
            .ok_or_else(|| OrderError::UnsavedProduct(product.name().to_string()))?;

        if !product.is_in_stock() {
            return Err(OrderError::OutOfStock(product.name().to_string()));
        }

        if quantity > product.quantity() {
            return Err(OrderError::InsufficientStock {
                product: product.name().to_string(),
                requested: quantity,
                available: product.quantity(),
            });
        }

        match self.items.iter_mut().find(|item| item.product_id() == product_id) {
            Some(existing) => {
                let merged = existing.merged(quantity).ok_or_else(|| OrderError::QuantityOverflow {
                    product: product.name().to_string(),
                    current: existing.quantity(),
                    requested: quantity,
                })?;
                *existing = merged;
            }
            None => self.items.push(OrderItem::new(
                product_id,
                product.name(),
                product.price(),
                quantity,
            )),
        }

        Ok(())
    }

    /// Drop the line for `product_id`, handing it back so the caller can
    /// return its stock.
    ///
    /// Returns `Ok(None)` and changes nothing when the order has no such
    /// line. Like `add_item`, fails with `NotModifiable` unless the order is
    /// still pending, so a cancelled order can never hand stock back twice.
    pub fn remove_item(&mut self, product_id: i64) -> Result<Option<OrderItem>, OrderError> {
        self.ensure_modifiable()?;

        let position = self.items.iter().position(|item| item.product_id() == product_id);
        Ok(position.map(|index| self.items.remove(index)))
    }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        if self.status != OrderStatus::Pending {
            return Err(OrderError::NotPending(self.status));
        }

        self.status = OrderStatus::Confirmed;
        Ok(())
    }

    /// Cancel from pending or confirmed. Stock restoration is up to the caller.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Delivered | OrderStatus::Cancelled => {
                Err(OrderError::CannotCancel(self.status))
            }
            OrderStatus::Pending | OrderStatus::Confirmed => {
                self.status = OrderStatus::Cancelled;
                Ok(())
            }
        }
    }

    pub fn deliver(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Confirmed {
            return Err(OrderError::NotConfirmed(self.status));
        }

        self.status = OrderStatus::Delivered;
        Ok(())
    }

    fn ensure_modifiable(&self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Pending => Ok(()),
            other => Err(OrderError::NotModifiable(other)),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn saved_product(id: i64, name: &str, price: f64, quantity: i64) -> Product {
        let mut product = Product::new(name, price, quantity).unwrap();
        product.id = Some(id);
        product
    }

    #[test]
    fn test_new_order_is_empty_and_pending() {
        let order = Order::new(9);
        assert_eq!(order.user_id, 9);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.items_count(), 0);
        assert_eq!(order.total_amount(), 0.0);
    }

    #[test]
    fn test_add_item_snapshots_name_and_price() {
        let mut order = Order::new(1);
        let mut widget = saved_product(1, "Widget", 10.0, 5);

        order.add_item(&widget, 2).unwrap();
        widget.update_price(12.0).unwrap();

        let item = order.item(1).unwrap();
        assert_eq!(item.product_name(), "Widget");
        assert_eq!(item.price(), 10.0);
        assert_eq!(order.total_amount(), 20.0);
    }

    #[test]
    fn test_add_same_product_twice_merges() {
        let mut order = Order::new(1);
        let widget = saved_product(1, "Widget", 10.0, 5);

        order.add_item(&widget, 2).unwrap();
        order.add_item(&widget, 3).unwrap();

        assert_eq!(order.items_count(), 1);
        assert_eq!(order.item(1).unwrap().quantity(), 5);
        assert_eq!(order.total_amount(), 50.0);
    }

    #[test]
    fn test_merge_overflow_leaves_line_unchanged() {
        let mut order = Order::new(1);
        let bulk = saved_product(1, "Bulk", 1.0, i64::MAX);

        order.add_item(&bulk, 1).unwrap();
        assert_eq!(
            order.add_item(&bulk, i64::MAX).unwrap_err(),
            OrderError::QuantityOverflow {
                product: "Bulk".to_string(),
                current: 1,
                requested: i64::MAX,
            }
        );
        assert_eq!(order.item(1).unwrap().quantity(), 1);
    }

    #[test]
    fn test_add_item_rejections() {
        let mut order = Order::new(1);
        let widget = saved_product(1, "Widget", 10.0, 5);
        let empty = saved_product(2, "Empty", 10.0, 0);
        let unsaved = Product::new("Unsaved", 1.0, 1).unwrap();

        assert_eq!(order.add_item(&widget, 0).unwrap_err(), OrderError::InvalidQuantity(0));
        assert_eq!(order.add_item(&widget, -1).unwrap_err(), OrderError::InvalidQuantity(-1));
        assert_eq!(
            order.add_item(&empty, 1).unwrap_err(),
            OrderError::OutOfStock("Empty".to_string())
        );
        assert_eq!(
            order.add_item(&widget, 6).unwrap_err(),
            OrderError::InsufficientStock {
                product: "Widget".to_string(),
                requested: 6,
                available: 5,
            }
        );
        assert_eq!(
            order.add_item(&unsaved, 1).unwrap_err(),
            OrderError::UnsavedProduct("Unsaved".to_string())
        );
        assert_eq!(order.items_count(), 0);
    }

    #[test]
    fn test_total_amount_tracks_items() {
        let mut order = Order::new(1);
        let widget = saved_product(1, "Widget", 10.0, 5);
        let gizmo = saved_product(2, "Gizmo", 2.5, 10);

        order.add_item(&widget, 1).unwrap();
        order.add_item(&gizmo, 4).unwrap();
        assert_eq!(order.total_amount(), 20.0);

        let expected: f64 = order.items().iter().map(|i| i.price() * i.quantity() as f64).sum();
        assert_eq!(order.total_amount(), expected);

        order.remove_item(1).unwrap();
        assert_eq!(order.total_amount(), 10.0);
        assert_eq!(order.items_count(), 1);
    }

    #[test]
    fn test_remove_item_returns_line_and_ignores_unknown() {
        let mut order = Order::new(1);
        let widget = saved_product(1, "Widget", 10.0, 5);
        order.add_item(&widget, 3).unwrap();

        assert_eq!(order.remove_item(42).unwrap(), None);
        assert_eq!(order.items_count(), 1);

        let removed = order.remove_item(1).unwrap().unwrap();
        assert_eq!(removed.quantity(), 3);
        assert_eq!(order.items_count(), 0);
    }

    #[test]
    fn test_confirm_lifecycle() {
        let mut order = Order::new(1);
        assert_eq!(order.confirm().unwrap_err(), OrderError::EmptyOrder);

        let widget = saved_product(1, "Widget", 10.0, 5);
        order.add_item(&widget, 2).unwrap();
        order.confirm().unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);

        assert_eq!(
            order.confirm().unwrap_err(),
            OrderError::NotPending(OrderStatus::Confirmed)
        );
    }

    #[test]
    fn test_cancel_confirmed_then_again() {
        let mut order = Order::new(1);
        let widget = saved_product(1, "Widget", 10.0, 5);
        order.add_item(&widget, 1).unwrap();
        order.confirm().unwrap();

        order.cancel().unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);

        assert_eq!(
            order.cancel().unwrap_err(),
            OrderError::CannotCancel(OrderStatus::Cancelled)
        );
    }

    #[test]
    fn test_cancel_pending_and_not_delivered() {
        let mut pending = Order::new(1);
        pending.cancel().unwrap();
        assert_eq!(pending.status(), OrderStatus::Cancelled);

        let mut delivered = Order::new(1);
        let widget = saved_product(1, "Widget", 10.0, 5);
        delivered.add_item(&widget, 1).unwrap();
        delivered.confirm().unwrap();
        delivered.deliver().unwrap();
        assert_eq!(
            delivered.cancel().unwrap_err(),
            OrderError::CannotCancel(OrderStatus::Delivered)
        );
        assert_eq!(
            delivered.confirm().unwrap_err(),
            OrderError::NotPending(OrderStatus::Delivered)
        );
    }

    #[test]
    fn test_deliver_requires_confirmation() {
        let mut order = Order::new(1);
        assert_eq!(
            order.deliver().unwrap_err(),
            OrderError::NotConfirmed(OrderStatus::Pending)
        );
    }

    #[test]
    fn test_items_frozen_after_confirm() {
        let mut order = Order::new(1);
        let widget = saved_product(1, "Widget", 10.0, 5);
        order.add_item(&widget, 1).unwrap();
        order.confirm().unwrap();

        assert_eq!(
            order.add_item(&widget, 1).unwrap_err(),
            OrderError::NotModifiable(OrderStatus::Confirmed)
        );
        assert_eq!(
            order.remove_item(1).unwrap_err(),
            OrderError::NotModifiable(OrderStatus::Confirmed)
        );
        assert_eq!(order.item(1).unwrap().quantity(), 1);
    }
}
