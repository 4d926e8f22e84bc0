//! In-process partitioned broker with at-least-once delivery
//!
//! Each subscription owns a fixed set of worker lanes. An envelope is routed
//! to a lane by hashing its partition key, so envelopes for the same entity
//! are handled serially and in publish order while different entities proceed
//! concurrently. A handler returning `Err` means its local effect did not
//! commit: the envelope is redelivered with exponential backoff, and goes to
//! the dead-letter queue once attempts are exhausted.

use crate::{
    envelope::Envelope,
    metrics::{EVENT_DEAD_LETTER_TOTAL, EVENT_DELIVER_TOTAL, EVENT_PUBLISH_TOTAL},
    types::Topic,
    Error, Event, Result,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Handler for consumed envelopes
///
/// Returning `Ok` acknowledges the envelope; returning `Err` triggers
/// redelivery. Handlers must therefore be idempotent or detect duplicates by
/// checking entity state before acting.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one envelope
    async fn handle(&self, envelope: Envelope) -> Result<()>;
}

/// Broker configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Worker lanes per subscription (entity-hash partitions)
    pub lanes_per_subscription: u32,

    /// Buffered envelopes per lane before publishers see backpressure
    pub lane_buffer: usize,

    /// Max delivery attempts before dead-lettering
    pub max_deliver: u32,

    /// Initial redelivery delay
    pub initial_retry_delay: Duration,

    /// Max redelivery delay
    pub max_retry_delay: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            lanes_per_subscription: 8,
            lane_buffer: 1024,
            max_deliver: 3,
            initial_retry_delay: Duration::from_millis(25),
            max_retry_delay: Duration::from_millis(250),
        }
    }
}

struct Subscription {
    group: String,
    lanes: Vec<mpsc::Sender<Envelope>>,
}

/// In-process event broker
pub struct Broker {
    subscriptions: RwLock<HashMap<Topic, Vec<Subscription>>>,
    dead_letters: Arc<Mutex<Vec<Envelope>>>,
    in_flight: Arc<AtomicUsize>,
    config: BrokerConfig,
}

impl Broker {
    /// Create a broker with the given configuration
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            dead_letters: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    /// Register a consumer group on a topic
    ///
    /// Must be called from within a Tokio runtime; lane workers are spawned
    /// immediately.
    pub fn subscribe<H>(&self, topic: Topic, group: impl Into<String>, handler: Arc<H>)
    where
        H: EventHandler + 'static,
    {
        let group = group.into();
        let lane_count = self.config.lanes_per_subscription.max(1);
        let mut lanes = Vec::with_capacity(lane_count as usize);

        for lane_no in 0..lane_count {
            let (tx, rx) = mpsc::channel(self.config.lane_buffer);
            lanes.push(tx);

            let worker = LaneWorker {
                handler: handler.clone(),
                config: self.config.clone(),
                dead_letters: self.dead_letters.clone(),
                in_flight: self.in_flight.clone(),
                group: group.clone(),
                lane_no,
            };
            tokio::spawn(worker.run(rx));
        }

        info!(%topic, %group, lane_count, "Subscription registered");

        self.subscriptions
            .write()
            .entry(topic)
            .or_default()
            .push(Subscription { group, lanes });
    }

    /// Publish an event to every subscription on its topic
    ///
    /// Returns the envelope so callers can log the assigned event id.
    pub async fn publish(&self, event: Event) -> Result<Envelope> {
        let envelope = Envelope::new(event);

        EVENT_PUBLISH_TOTAL
            .with_label_values(&[envelope.topic().subject()])
            .inc();

        self.dispatch(envelope.clone()).await?;
        Ok(envelope)
    }

    /// Inject an envelope again, as an at-least-once bus would on redelivery
    pub async fn redeliver(&self, envelope: Envelope) -> Result<()> {
        self.dispatch(envelope).await
    }

    /// Wait until every enqueued envelope has been handled or dead-lettered
    pub async fn quiesce(&self) {
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Envelopes that exhausted their delivery attempts
    pub fn dead_letters(&self) -> Vec<Envelope> {
        self.dead_letters.lock().clone()
    }

    async fn dispatch(&self, envelope: Envelope) -> Result<()> {
        let topic = envelope.topic();
        let key = envelope.partition_key();

        // Snapshot lane senders so the lock is not held across awaits
        let senders: Vec<mpsc::Sender<Envelope>> = {
            let subs = self.subscriptions.read();
            match subs.get(&topic) {
                Some(list) => list
                    .iter()
                    .map(|sub| {
                        let lane = key.partition_number(sub.lanes.len() as u32) as usize;
                        sub.lanes[lane].clone()
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        for sender in senders {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            if sender.send(envelope.clone()).await.is_err() {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::Publish(format!("lane closed for topic {topic}")));
            }
        }

        Ok(())
    }
}

struct LaneWorker<H> {
    handler: Arc<H>,
    config: BrokerConfig,
    dead_letters: Arc<Mutex<Vec<Envelope>>>,
    in_flight: Arc<AtomicUsize>,
    group: String,
    lane_no: u32,
}

impl<H: EventHandler + 'static> LaneWorker<H> {
    async fn run(self, mut rx: mpsc::Receiver<Envelope>) {
        while let Some(envelope) = rx.recv().await {
            self.deliver(envelope).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn deliver(&self, envelope: Envelope) {
        let topic = envelope.topic();
        let mut attempts = 0u32;
        let mut delay = self.config.initial_retry_delay;

        loop {
            attempts += 1;

            match self.handler.handle(envelope.clone()).await {
                Ok(()) => {
                    EVENT_DELIVER_TOTAL
                        .with_label_values(&[topic.subject(), "success"])
                        .inc();
                    if attempts > 1 {
                        info!(
                            event_id = %envelope.event_id,
                            %topic,
                            attempts,
                            "Envelope handled after redelivery"
                        );
                    }
                    return;
                }
                Err(e) => {
                    EVENT_DELIVER_TOTAL
                        .with_label_values(&[topic.subject(), "error"])
                        .inc();

                    if attempts >= self.config.max_deliver {
                        error!(
                            event_id = %envelope.event_id,
                            %topic,
                            group = %self.group,
                            lane = self.lane_no,
                            attempts,
                            error = %e,
                            "Delivery attempts exhausted, dead-lettering"
                        );
                        EVENT_DEAD_LETTER_TOTAL
                            .with_label_values(&[topic.subject()])
                            .inc();
                        self.dead_letters.lock().push(envelope);
                        return;
                    }

                    warn!(
                        event_id = %envelope.event_id,
                        %topic,
                        attempts,
                        retry_in = ?delay,
                        error = %e,
                        "Handler failed, redelivering"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.config.max_retry_delay);
                }
            }
        }
    }
}
