use serde::{Deserialize, Serialize};

use crate::outbox::DomainEvent;

// ============================================================================
// Product Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    Created(ProductCreated),
    Updated(ProductUpdated),
    StockReserved(ProductStockChanged),
    StockRestored(ProductStockChanged),
    Deleted(ProductDeleted),
}

impl DomainEvent for ProductEvent {
    fn aggregate_type() -> &'static str { "Product" }

    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::Created(_) => "ProductCreated",
            ProductEvent::Updated(_) => "ProductUpdated",
            ProductEvent::StockReserved(_) => "ProductStockReserved",
            ProductEvent::StockRestored(_) => "ProductStockRestored",
            ProductEvent::Deleted(_) => "ProductDeleted",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProductCreated {
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProductUpdated {
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

/// Stock moved because of an order
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProductStockChanged {
    pub order_id: i64,
    pub amount: i64,
    pub remaining: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProductDeleted {}
