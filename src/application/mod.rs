// ============================================================================
// Application Layer - Service Orchestration
// ============================================================================
//
// Services open one unit of work per call, drive the domain objects, write
// the resulting events to the outbox and commit. Any error before the commit
// drops the unit of work, which rolls back every change it made.
//
// Version conflicts replay the whole unit of work; rule violations do not.
//
// ============================================================================

mod dto;
mod errors;
mod order_service;
mod product_service;

pub use dto::{AddItem, OrderItemView, OrderView, ProductCreate, ProductUpdate, ProductView};
pub use errors::ServiceError;
pub use order_service::OrderService;
pub use product_service::ProductService;

use std::future::Future;
use std::time::Instant;

use uuid::Uuid;

use crate::metrics::Metrics;
use crate::outbox::{DomainEvent, EventEnvelope, OutboxMessage};
use crate::persistence::{OutboxRepository, StoreError};
use crate::utils::{retry_on_transient, RetryConfig};

/// Run a write operation with retries, recording its outcome.
async fn execute<T, F, Fut>(
    metrics: &Metrics,
    retry: &RetryConfig,
    operation: &'static str,
    attempt: F,
) -> Result<T, ServiceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let started = Instant::now();
    let result = retry_on_transient(retry.clone(), attempt).await.into_result();
    let elapsed = started.elapsed().as_secs_f64();

    match &result {
        Ok(_) => {
            metrics.record_operation(operation, elapsed, true);
        }
        Err(ServiceError::InvalidOperation(violation)) => {
            tracing::info!(operation, reason = %violation, "Operation rejected");
            metrics.record_rule_violation(operation);
            metrics.record_operation(operation, elapsed, false);
        }
        Err(e) => {
            tracing::warn!(operation, error = %e, "Operation failed");
            metrics.record_operation(operation, elapsed, false);
        }
    }

    result
}

/// Append `event` to the outbox of the open unit of work.
async fn publish<R, E>(
    uow: &mut R,
    aggregate_id: i64,
    event: E,
    correlation_id: Uuid,
) -> Result<(), StoreError>
where
    R: OutboxRepository,
    E: DomainEvent,
{
    let envelope = EventEnvelope::new(aggregate_id, event, correlation_id);
    let message = OutboxMessage::from_envelope(&envelope)?;

    tracing::debug!(
        aggregate_type = %message.aggregate_type,
        aggregate_id,
        event_type = %message.event_type,
        "Queued outbox event"
    );

    uow.append_outbox(message).await
}
