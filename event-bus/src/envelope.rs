//! Delivery envelope wrapping every published event

use crate::event::Event;
use crate::types::{PartitionKey, Topic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope carrying an event across the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Publish timestamp
    pub timestamp: DateTime<Utc>,

    /// The event itself
    #[serde(flatten)]
    pub event: Event,
}

impl Envelope {
    /// Wrap an event for publishing
    pub fn new(event: Event) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event,
        }
    }

    /// Topic this envelope is routed on
    pub fn topic(&self) -> Topic {
        self.event.topic()
    }

    /// Partition key for lane routing
    pub fn partition_key(&self) -> PartitionKey {
        self.event.partition_key()
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Deserialize from wire bytes
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| crate::Error::Deserialization(e.to_string()))
    }
}
