use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::outbox::DomainEvent;
use super::value_objects::OrderItem;

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================

/// Order Event - Union type for all order events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Created(OrderCreated),
    ItemAdded(OrderItemAdded),
    ItemRemoved(OrderItemRemoved),
    Confirmed(OrderConfirmed),
    Cancelled(OrderCancelled),
    Delivered(OrderDelivered),
}

impl DomainEvent for OrderEvent {
    fn aggregate_type() -> &'static str { "Order" }

    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "OrderCreated",
            OrderEvent::ItemAdded(_) => "OrderItemAdded",
            OrderEvent::ItemRemoved(_) => "OrderItemRemoved",
            OrderEvent::Confirmed(_) => "OrderConfirmed",
            OrderEvent::Cancelled(_) => "OrderCancelled",
            OrderEvent::Delivered(_) => "OrderDelivered",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order Created - empty pending order opened for a user
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCreated {
    pub user_id: i64,
}

/// Order Item Added - stock was reserved for the order
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderItemAdded {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: f64,
}

/// Order Item Removed - line dropped and its stock returned
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderItemRemoved {
    pub item: OrderItem,
}

/// Order Confirmed - order accepted for fulfillment
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderConfirmed {
    pub total_amount: f64,
    pub confirmed_at: DateTime<Utc>,
}

/// Order Cancelled - lifecycle ended, reserved stock returned
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCancelled {
    pub restored_units: i64,
}

/// Order Delivered - handed over to the customer
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderDelivered {
    pub delivered_at: DateTime<Utc>,
}
