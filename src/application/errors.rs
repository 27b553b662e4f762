use crate::domain::order::OrderError;
use crate::domain::product::ProductError;
use crate::domain::RuleViolation;
use crate::persistence::StoreError;
use crate::utils::IsTransient;

// ============================================================================
// Service Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A business rule rejected the operation; nothing was written
    #[error("Invalid operation: {0}")]
    InvalidOperation(#[from] RuleViolation),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub(crate) fn product_not_found(id: i64) -> Self {
        ServiceError::NotFound { entity: "Product", id }
    }

    pub(crate) fn order_not_found(id: i64) -> Self {
        ServiceError::NotFound { entity: "Order", id }
    }
}

impl From<ProductError> for ServiceError {
    fn from(error: ProductError) -> Self {
        ServiceError::InvalidOperation(error.into())
    }
}

impl From<OrderError> for ServiceError {
    fn from(error: OrderError) -> Self {
        ServiceError::InvalidOperation(error.into())
    }
}

impl IsTransient for ServiceError {
    fn is_transient(&self) -> bool {
        match self {
            ServiceError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_violations_share_one_kind() {
        let from_product: ServiceError = ProductError::NonPositiveAmount(0).into();
        let from_order: ServiceError = OrderError::EmptyOrder.into();

        assert!(matches!(from_product, ServiceError::InvalidOperation(RuleViolation::Product(_))));
        assert!(matches!(from_order, ServiceError::InvalidOperation(RuleViolation::Order(_))));
        assert!(from_order.to_string().starts_with("Invalid operation:"));
    }

    #[test]
    fn test_only_store_conflicts_are_transient() {
        let conflict = ServiceError::Store(StoreError::VersionConflict {
            entity: "Order",
            id: 1,
            expected: 3,
        });
        assert!(conflict.is_transient());

        assert!(!ServiceError::order_not_found(1).is_transient());
        assert!(!ServiceError::from(OrderError::EmptyOrder).is_transient());
    }
}
