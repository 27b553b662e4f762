// ============================================================================
// Transactional Outbox
// ============================================================================
//
// Domain events are wrapped in envelopes and written to the outbox inside the
// same unit of work as the state change that produced them. Nothing here
// knows about Product or Order.
//
// ============================================================================

mod event;
mod message;

pub use event::{DomainEvent, EventEnvelope};
pub use message::OutboxMessage;
