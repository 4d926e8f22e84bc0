//! Prometheus metrics for the event bus

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};

lazy_static! {
    /// Total envelopes published
    pub static ref EVENT_PUBLISH_TOTAL: CounterVec = register_counter_vec!(
        "event_bus_publish_total",
        "Total envelopes published",
        &["topic"]
    )
    .unwrap();

    /// Total delivery attempts, by outcome
    pub static ref EVENT_DELIVER_TOTAL: CounterVec = register_counter_vec!(
        "event_bus_deliver_total",
        "Total delivery attempts",
        &["topic", "status"]
    )
    .unwrap();

    /// Total envelopes dead-lettered after exhausting redelivery
    pub static ref EVENT_DEAD_LETTER_TOTAL: CounterVec = register_counter_vec!(
        "event_bus_dead_letter_total",
        "Total envelopes dead-lettered",
        &["topic"]
    )
    .unwrap();
}
