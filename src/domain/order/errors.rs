use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Item quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    #[error("Product '{0}' is out of stock")]
    OutOfStock(String),

    #[error("Not enough '{product}' in stock: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    #[error("Adding {requested} more '{product}' to {current} would overflow the line quantity")]
    QuantityOverflow {
        product: String,
        current: i64,
        requested: i64,
    },

    #[error("Product '{0}' has not been saved yet")]
    UnsavedProduct(String),

    #[error("Order is empty")]
    EmptyOrder,

    #[error("Only pending orders can be confirmed, order is {0}")]
    NotPending(OrderStatus),

    #[error("Items can only be changed while the order is pending, order is {0}")]
    NotModifiable(OrderStatus),

    #[error("Cannot cancel an order that is {0}")]
    CannotCancel(OrderStatus),

    #[error("Only confirmed orders can be delivered, order is {0}")]
    NotConfirmed(OrderStatus),
}
