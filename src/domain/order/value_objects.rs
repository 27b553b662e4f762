use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Order Value Objects
// ============================================================================

/// One line of an order.
///
/// Immutable once built. Equality is by product id, price and quantity; the
/// product name is a display snapshot and does not take part.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderItem {
    product_id: i64,
    product_name: String,
    price: f64,
    quantity: i64,
}

impl OrderItem {
    pub(crate) fn new(product_id: i64, product_name: impl Into<String>, price: f64, quantity: i64) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            price,
            quantity,
        }
    }

    /// Same line with `extra` more units, `None` if the count would overflow.
    pub(crate) fn merged(&self, extra: i64) -> Option<Self> {
        Some(Self {
            quantity: self.quantity.checked_add(extra)?,
            ..self.clone()
        })
    }

    pub fn product_id(&self) -> i64 {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn subtotal(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

impl PartialEq for OrderItem {
    fn eq(&self, other: &Self) -> bool {
        self.product_id == other.product_id
            && self.price == other.price
            && self.quantity == other.quantity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "delivered" => Ok(OrderStatus::Delivered),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
