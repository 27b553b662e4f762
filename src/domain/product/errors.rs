// ============================================================================
// Product Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProductError {
    #[error("Product name must be at least {min} characters, got {name:?}")]
    NameTooShort { name: String, min: usize },

    #[error("Price must be positive, got {0}")]
    NonPositivePrice(f64),

    #[error("Quantity cannot be negative, got {0}")]
    NegativeQuantity(i64),

    #[error("Price cannot change by more than 50% at once: {current} -> {requested}")]
    PriceSwingTooLarge { current: f64, requested: f64 },

    #[error("Stock amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("Adding {amount} units to {current} would overflow the stock counter")]
    StockOverflow { current: i64, amount: i64 },

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },
}
