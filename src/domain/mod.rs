// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// One subdirectory per aggregate:
// - product/ - Product entity with price and stock rules
// - order/   - Order aggregate owning OrderItem value objects
//
// Nothing in here knows about storage; repositories load and save these
// types as plain values.
//
// ============================================================================

pub mod product;
pub mod order;

use order::OrderError;
use product::ProductError;

/// Any business rule rejection, regardless of which aggregate raised it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleViolation {
    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Order(#[from] OrderError),
}
