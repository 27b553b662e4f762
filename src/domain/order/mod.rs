// ============================================================================
// Order Domain - Business Logic for Order Aggregate
// ============================================================================
//
// - Value objects (OrderItem, OrderStatus)
// - Events (OrderCreated, OrderItemAdded, ...)
// - Errors (OrderError enum)
// - Aggregate (Order with status transitions and stock checks)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod errors;
pub mod aggregate;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use errors::*;
pub use aggregate::*;
