use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

// ============================================================================
// Event Envelope - Metadata around a domain event
// ============================================================================
//
// Every business operation that commits produces one or more domain events.
// The envelope carries the identity, ordering and correlation data that the
// outbox table needs; the payload stays a plain serde value.
//
// ============================================================================

/// Generic Event Envelope - wraps any domain event with metadata
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: i64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Groups every event emitted by one unit of work
    pub correlation_id: Uuid,

    pub timestamp: DateTime<Utc>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(aggregate_id: i64, event_data: E, correlation_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            event_type: event_data.event_type().to_string(),
            event_version: E::event_version(),
            event_data,
            correlation_id,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// Implemented by the per-aggregate event unions so they can be written to
/// the outbox.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    /// Aggregate the event belongs to, e.g. "Product" or "Order"
    fn aggregate_type() -> &'static str where Self: Sized;

    /// Name of the concrete variant, e.g. "OrderConfirmed"
    fn event_type(&self) -> &'static str;

    fn event_version() -> i32 where Self: Sized { 1 }
}

// ============================================================================
// Event Serialization Helpers
// ============================================================================

pub fn serialize_event<E: Serialize>(event: &E) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug)]
    #[serde(tag = "type", content = "data")]
    enum TestEvent {
        Happened { data: String },
    }

    impl DomainEvent for TestEvent {
        fn aggregate_type() -> &'static str { "Test" }

        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Happened { .. } => "TestHappened",
            }
        }
    }

    #[test]
    fn test_event_envelope_creation() {
        let correlation_id = Uuid::new_v4();

        let envelope = EventEnvelope::new(
            42,
            TestEvent::Happened { data: "test".to_string() },
            correlation_id,
        );

        assert_eq!(envelope.aggregate_id, 42);
        assert_eq!(envelope.event_type, "TestHappened");
        assert_eq!(envelope.event_version, 1);
        assert_eq!(envelope.correlation_id, correlation_id);
    }

    #[test]
    fn test_event_serialization() {
        let event = TestEvent::Happened { data: "test data".to_string() };

        let json = serialize_event(&event).unwrap();
        assert!(json.contains("Happened"));

        let TestEvent::Happened { data } = serde_json::from_str(&json).unwrap();
        assert_eq!(data, "test data");
    }
}
