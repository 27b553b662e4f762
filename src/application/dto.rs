use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::domain::product::Product;

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub quantity: i64,
}

/// Partial update; `None` fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<f64>,
    /// Target stock level, applied as an add or remove of the difference
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AddItem {
    pub product_id: i64,
    pub quantity: i64,
}

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductView {
    pub id: Option<i64>,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
    pub is_in_stock: bool,
    pub total_value: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name().to_string(),
            price: product.price(),
            quantity: product.quantity(),
            is_in_stock: product.is_in_stock(),
            total_value: product.total_value(),
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemView {
    pub product_id: i64,
    pub product_name: String,
    pub price: f64,
    pub quantity: i64,
    pub subtotal: f64,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id(),
            product_name: item.product_name().to_string(),
            price: item.price(),
            quantity: item.quantity(),
            subtotal: item.subtotal(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub id: Option<i64>,
    pub user_id: i64,
    pub status: OrderStatus,
    pub items: Vec<OrderItemView>,
    pub total_amount: f64,
    pub items_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status(),
            items: order.items().iter().map(OrderItemView::from).collect(),
            total_amount: order.total_amount(),
            items_count: order.items_count(),
            created_at: order.created_at,
        }
    }
}
