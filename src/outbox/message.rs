use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use super::event::{serialize_event, DomainEvent, EventEnvelope};

// ============================================================================
// Outbox Message - one row of the transactional outbox
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: i64,
    pub event_id: Uuid,
    pub event_type: String,
    pub correlation_id: Uuid,
    /// JSON-encoded envelope
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn from_envelope<E: DomainEvent>(envelope: &EventEnvelope<E>) -> serde_json::Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            aggregate_type: E::aggregate_type().to_string(),
            aggregate_id: envelope.aggregate_id,
            event_id: envelope.event_id,
            event_type: envelope.event_type.clone(),
            correlation_id: envelope.correlation_id,
            payload: serialize_event(envelope)?,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderEvent, OrderConfirmed};

    #[test]
    fn test_message_carries_envelope_metadata() {
        let correlation_id = Uuid::new_v4();
        let envelope = EventEnvelope::new(
            7,
            OrderEvent::Confirmed(OrderConfirmed {
                total_amount: 30.0,
                confirmed_at: Utc::now(),
            }),
            correlation_id,
        );

        let message = OutboxMessage::from_envelope(&envelope).unwrap();

        assert_eq!(message.aggregate_type, "Order");
        assert_eq!(message.aggregate_id, 7);
        assert_eq!(message.event_type, "OrderConfirmed");
        assert_eq!(message.event_id, envelope.event_id);
        assert_eq!(message.correlation_id, correlation_id);

        let decoded: EventEnvelope<OrderEvent> = serde_json::from_str(&message.payload).unwrap();
        match decoded.event_data {
            OrderEvent::Confirmed(e) => assert_eq!(e.total_amount, 30.0),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
