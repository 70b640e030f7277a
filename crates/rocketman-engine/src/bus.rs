//! Event bus client: topic-routed publish and durable subscriptions.
//!
//! Every rocket event is published on `rocket.<id>.<event>` with a JSON
//! [`RocketEnvelope`] body. Two kinds of subscription exist:
//!
//! - **Durable** ([`EventBus::subscribe`]): a named consumer with its own
//!   queue. A [`Delivery`] stays owned by the consumer until it is
//!   acknowledged; a negative acknowledgement hands it back for redelivery
//!   after [`REDELIVERY_DELAY`].
//! - **Live** ([`EventBus::subscribe_live`]): fire-and-forget fan-out used
//!   by the WebSocket relay. Nothing is retained for a live subscriber that
//!   is not listening.
//!
//! Two backends implement this: NATS `JetStream` (stream [`STREAM_NAME`]
//! over `rocket.>`, durable pull consumers with explicit ack) and an
//! in-process bus with the same queue semantics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_nats::jetstream::{self, AckKind, consumer, stream};
use futures::StreamExt;
use rocketman_types::{RocketEnvelope, TOPIC_PREFIX, Topic, topic_matches};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RocketError;

/// Name of the `JetStream` stream holding rocket events.
pub const STREAM_NAME: &str = "ROCKETS";

/// How long a negatively acknowledged delivery waits before redelivery.
pub const REDELIVERY_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on how long an event stays in the stream, acknowledged or not.
pub const STREAM_MAX_AGE: Duration = Duration::from_secs(3600);

/// The `ROCKETS` stream. Interest retention drops a message once every
/// consumer it matches has acknowledged it (and at once when none match);
/// `max_age` bounds whatever a stalled consumer leaves behind.
fn stream_config() -> stream::Config {
    stream::Config {
        name: STREAM_NAME.to_owned(),
        subjects: vec![format!("{TOPIC_PREFIX}.>")],
        retention: stream::RetentionPolicy::Interest,
        max_age: STREAM_MAX_AGE,
        ..Default::default()
    }
}

/// Rocket event bus backend.
#[derive(Clone)]
pub enum EventBus {
    /// NATS `JetStream`.
    Nats(NatsBus),
    /// In-process bus.
    Memory(MemoryBus),
}

impl EventBus {
    /// Publish an envelope on a topic.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::Bus`] if serialization or the publish fails.
    pub async fn publish(&self, topic: &Topic, envelope: &RocketEnvelope) -> Result<(), RocketError> {
        let payload = serde_json::to_vec(envelope)
            .map_err(|e| RocketError::Bus(format!("failed to serialize envelope: {e}")))?;
        debug!(topic = %topic, "publishing rocket event");
        self.publish_raw(&topic.to_string(), payload).await
    }

    /// Publish an arbitrary body on a subject.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::Bus`] if the publish fails.
    pub async fn publish_raw(&self, subject: &str, payload: Vec<u8>) -> Result<(), RocketError> {
        match self {
            Self::Nats(bus) => bus.publish(subject, payload).await,
            Self::Memory(bus) => {
                bus.publish(subject, payload);
                Ok(())
            }
        }
    }

    /// Open (or resume) the durable consumer `consumer` over `patterns`.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::Bus`] if the consumer cannot be created.
    pub async fn subscribe(
        &self,
        consumer: &str,
        patterns: &[String],
    ) -> Result<Subscription, RocketError> {
        match self {
            Self::Nats(bus) => bus.subscribe(consumer, patterns).await,
            Self::Memory(bus) => Ok(bus.subscribe(consumer, patterns)),
        }
    }

    /// Open a non-durable subscription over `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::Bus`] if the subscription fails.
    pub async fn subscribe_live(&self, pattern: &str) -> Result<LiveSubscription, RocketError> {
        match self {
            Self::Nats(bus) => bus.subscribe_live(pattern).await,
            Self::Memory(bus) => Ok(bus.subscribe_live(pattern)),
        }
    }

    /// Whether the bus is currently connected.
    pub fn is_connected(&self) -> bool {
        match self {
            Self::Nats(bus) => bus.is_connected(),
            Self::Memory(_) => true,
        }
    }

    /// Flush pending publishes and stop delivering.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::Bus`] if the flush fails.
    pub async fn shutdown(&self) -> Result<(), RocketError> {
        match self {
            Self::Nats(bus) => bus.shutdown().await,
            Self::Memory(bus) => {
                bus.close();
                Ok(())
            }
        }
    }

    /// Human-readable backend name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Nats(_) => "nats",
            Self::Memory(_) => "memory",
        }
    }
}

impl From<NatsBus> for EventBus {
    fn from(bus: NatsBus) -> Self {
        Self::Nats(bus)
    }
}

impl From<MemoryBus> for EventBus {
    fn from(bus: MemoryBus) -> Self {
        Self::Memory(bus)
    }
}

// ---------------------------------------------------------------------------
// Deliveries
// ---------------------------------------------------------------------------

/// One message handed to a durable consumer.
///
/// Must be settled exactly once with [`ack`](Self::ack),
/// [`nak`](Self::nak) or [`settle`](Self::settle). An unsettled `JetStream`
/// delivery is redelivered once its ack deadline passes.
pub struct Delivery {
    /// The routing key the message was published on.
    pub subject: String,
    /// The raw message body.
    pub payload: Vec<u8>,
    acker: Acker,
}

enum Acker {
    JetStream(Box<jetstream::Message>),
    Memory { bus: MemoryBus, consumer: String },
}

impl Delivery {
    /// Parse the routing key and decode the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::MalformedEvent`] if the subject is not a
    /// rocket topic, the body is not an envelope, or the envelope is about
    /// a different rocket than the subject.
    pub fn decode(&self) -> Result<(Topic, RocketEnvelope), RocketError> {
        let malformed = |reason: String| RocketError::MalformedEvent {
            subject: self.subject.clone(),
            reason,
        };
        let topic = Topic::parse(&self.subject)
            .ok_or_else(|| malformed("not a rocket routing key".to_owned()))?;
        let envelope: RocketEnvelope = serde_json::from_slice(&self.payload)
            .map_err(|e| malformed(format!("undecodable envelope: {e}")))?;
        if envelope.rocket.id != topic.rocket_id {
            return Err(malformed(format!(
                "envelope is about rocket {}",
                envelope.rocket.id
            )));
        }
        Ok((topic, envelope))
    }

    /// Acknowledge: the message will not be delivered to this consumer again.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::Bus`] if the broker rejects the ack.
    pub async fn ack(self) -> Result<(), RocketError> {
        match self.acker {
            Acker::JetStream(message) => message
                .ack()
                .await
                .map_err(|e| RocketError::Bus(format!("failed to ack {}: {e}", self.subject))),
            Acker::Memory { bus, .. } => {
                bus.record_ack();
                Ok(())
            }
        }
    }

    /// Negatively acknowledge: redeliver after [`REDELIVERY_DELAY`].
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::Bus`] if the broker rejects the nak.
    pub async fn nak(self) -> Result<(), RocketError> {
        match self.acker {
            Acker::JetStream(message) => message
                .ack_with(AckKind::Nak(Some(REDELIVERY_DELAY)))
                .await
                .map_err(|e| RocketError::Bus(format!("failed to nak {}: {e}", self.subject))),
            Acker::Memory { bus, consumer } => {
                bus.record_nak();
                let message = RawMessage {
                    subject: self.subject,
                    payload: self.payload,
                };
                tokio::spawn(async move {
                    tokio::time::sleep(REDELIVERY_DELAY).await;
                    bus.redeliver(&consumer, message);
                });
                Ok(())
            }
        }
    }

    /// Settle according to a handler outcome.
    ///
    /// Success and permanent failures are acknowledged; anything else is
    /// handed back for redelivery. Never fails: settlement errors are
    /// logged, and the broker's ack deadline covers a lost ack.
    pub async fn settle<T>(self, outcome: &Result<T, RocketError>) {
        let subject = self.subject.clone();
        let settled = match outcome {
            Ok(_) => self.ack().await,
            Err(e) if e.is_permanent() => {
                warn!(subject = %subject, error = %e, "dropping malformed event");
                self.ack().await
            }
            Err(e) => {
                warn!(subject = %subject, error = %e, "event handling failed, requesting redelivery");
                self.nak().await
            }
        };
        if let Err(e) = settled {
            warn!(subject = %subject, error = %e, "failed to settle delivery");
        }
    }
}

/// A durable subscription: a lazy sequence of [`Delivery`] values.
pub enum Subscription {
    /// `JetStream` pull consumer.
    Nats(Box<consumer::pull::Stream>),
    /// In-process queue.
    Memory {
        /// Queue receiver.
        rx: mpsc::UnboundedReceiver<RawMessage>,
        /// Bus the queue belongs to, for acks and redelivery.
        bus: MemoryBus,
        /// Consumer name.
        consumer: String,
    },
}

impl Subscription {
    /// Wait for the next delivery. `None` once the subscription is closed.
    ///
    /// An `Err` is a transient transport problem; the subscription remains
    /// usable.
    pub async fn next(&mut self) -> Option<Result<Delivery, RocketError>> {
        match self {
            Self::Nats(messages) => {
                let next = messages.next().await?;
                Some(
                    next.map(|message| Delivery {
                        subject: message.subject.to_string(),
                        payload: message.payload.to_vec(),
                        acker: Acker::JetStream(Box::new(message)),
                    })
                    .map_err(|e| RocketError::Bus(format!("consumer stream error: {e}"))),
                )
            }
            Self::Memory { rx, bus, consumer } => {
                let message = rx.recv().await?;
                Some(Ok(Delivery {
                    subject: message.subject,
                    payload: message.payload,
                    acker: Acker::Memory {
                        bus: bus.clone(),
                        consumer: consumer.clone(),
                    },
                }))
            }
        }
    }
}

/// A message received on a live subscription.
#[derive(Debug, Clone)]
pub struct LiveEvent {
    /// The routing key.
    pub subject: String,
    /// The raw body, forwarded untouched.
    pub payload: Vec<u8>,
}

/// A non-durable subscription. Dropping it unsubscribes.
pub enum LiveSubscription {
    /// Core NATS subscriber.
    Nats(Box<async_nats::Subscriber>),
    /// In-process fan-out.
    Memory(MemoryLive),
}

impl LiveSubscription {
    /// Wait for the next event. `None` once the bus is closed.
    pub async fn next(&mut self) -> Option<LiveEvent> {
        match self {
            Self::Nats(subscriber) => subscriber.next().await.map(|message| LiveEvent {
                subject: message.subject.to_string(),
                payload: message.payload.to_vec(),
            }),
            Self::Memory(live) => live.rx.recv().await.map(|message| LiveEvent {
                subject: message.subject,
                payload: message.payload,
            }),
        }
    }

    /// Unsubscribe explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::Bus`] if the broker rejects the unsubscribe.
    pub async fn unsubscribe(self) -> Result<(), RocketError> {
        match self {
            Self::Nats(mut subscriber) => subscriber
                .unsubscribe()
                .await
                .map_err(|e| RocketError::Bus(format!("failed to unsubscribe: {e}"))),
            Self::Memory(live) => {
                drop(live);
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// NATS JetStream backend
// ---------------------------------------------------------------------------

/// NATS `JetStream` event bus.
#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect and make sure the [`STREAM_NAME`] stream exists.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::Bus`] if the connection or stream setup fails.
    pub async fn connect(url: &str) -> Result<Self, RocketError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| RocketError::Bus(format!("failed to connect to {url}: {e}")))?;

        let bus = Self { client };
        bus.jetstream()
            .get_or_create_stream(stream_config())
            .await
            .map_err(|e| RocketError::Bus(format!("failed to create stream {STREAM_NAME}: {e}")))?;
        info!(stream = STREAM_NAME, "NATS JetStream ready");
        Ok(bus)
    }

    fn jetstream(&self) -> jetstream::Context {
        jetstream::new(self.client.clone())
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), RocketError> {
        self.jetstream()
            .publish(subject.to_owned(), payload.into())
            .await
            .map_err(|e| RocketError::Bus(format!("failed to publish to {subject}: {e}")))?
            .await
            .map_err(|e| RocketError::Bus(format!("publish to {subject} not acknowledged: {e}")))?;
        Ok(())
    }

    async fn subscribe(&self, name: &str, patterns: &[String]) -> Result<Subscription, RocketError> {
        let stream = self
            .jetstream()
            .get_stream(STREAM_NAME)
            .await
            .map_err(|e| RocketError::Bus(format!("failed to open stream {STREAM_NAME}: {e}")))?;
        let consumer = stream
            .get_or_create_consumer(
                name,
                consumer::pull::Config {
                    durable_name: Some(name.to_owned()),
                    filter_subjects: patterns.to_vec(),
                    ack_policy: consumer::AckPolicy::Explicit,
                    deliver_policy: consumer::DeliverPolicy::New,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| RocketError::Bus(format!("failed to create consumer {name}: {e}")))?;
        let messages = consumer
            .messages()
            .await
            .map_err(|e| RocketError::Bus(format!("failed to pull from {name}: {e}")))?;
        info!(consumer = name, patterns = ?patterns, "durable consumer subscribed");
        Ok(Subscription::Nats(Box::new(messages)))
    }

    async fn subscribe_live(&self, pattern: &str) -> Result<LiveSubscription, RocketError> {
        let subscriber = self
            .client
            .subscribe(pattern.to_owned())
            .await
            .map_err(|e| RocketError::Bus(format!("failed to subscribe to {pattern}: {e}")))?;
        debug!(pattern = pattern, "live subscription opened");
        Ok(LiveSubscription::Nats(Box::new(subscriber)))
    }

    fn is_connected(&self) -> bool {
        matches!(
            self.client.connection_state(),
            async_nats::connection::State::Connected
        )
    }

    async fn shutdown(&self) -> Result<(), RocketError> {
        self.client
            .flush()
            .await
            .map_err(|e| RocketError::Bus(format!("failed to flush: {e}")))?;
        info!("Disconnected from NATS");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-process backend
// ---------------------------------------------------------------------------

/// A message as stored by the in-process bus.
#[derive(Debug, Clone)]
pub struct RawMessage {
    subject: String,
    payload: Vec<u8>,
}

struct DurableQueue {
    patterns: Vec<String>,
    tx: Option<mpsc::UnboundedSender<RawMessage>>,
    backlog: Vec<RawMessage>,
}

impl DurableQueue {
    fn offer(&mut self, message: RawMessage) {
        let undelivered = match &self.tx {
            Some(tx) => tx.send(message).err().map(|e| e.0),
            None => Some(message),
        };
        if let Some(message) = undelivered {
            self.tx = None;
            self.backlog.push(message);
        }
    }
}

struct LiveQueue {
    pattern: String,
    tx: mpsc::UnboundedSender<RawMessage>,
}

#[derive(Default)]
struct MemoryBusState {
    durable: HashMap<String, DurableQueue>,
    live: HashMap<Uuid, LiveQueue>,
    published: Vec<RawMessage>,
    acks: usize,
    naks: usize,
}

/// In-process event bus with durable named queues.
///
/// A durable queue exists from the first [`EventBus::subscribe`] with its
/// name; messages published while its subscriber is gone are kept and
/// handed to the next subscriber with that name. Cloning shares the bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<MemoryBusState>>,
}

impl MemoryBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryBusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, subject: &str, payload: Vec<u8>) {
        let message = RawMessage {
            subject: subject.to_owned(),
            payload,
        };
        let mut state = self.lock();
        for queue in state.durable.values_mut() {
            if queue.patterns.iter().any(|p| topic_matches(p, subject)) {
                queue.offer(message.clone());
            }
        }
        state
            .live
            .retain(|_, live| !topic_matches(&live.pattern, subject) || live.tx.send(message.clone()).is_ok());
        state.published.push(message);
    }

    fn subscribe(&self, name: &str, patterns: &[String]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let queue = state
            .durable
            .entry(name.to_owned())
            .or_insert_with(|| DurableQueue {
                patterns: Vec::new(),
                tx: None,
                backlog: Vec::new(),
            });
        queue.patterns = patterns.to_vec();
        for message in queue.backlog.drain(..) {
            let _ = tx.send(message);
        }
        queue.tx = Some(tx);
        drop(state);
        Subscription::Memory {
            rx,
            bus: self.clone(),
            consumer: name.to_owned(),
        }
    }

    fn subscribe_live(&self, pattern: &str) -> LiveSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.lock().live.insert(
            id,
            LiveQueue {
                pattern: pattern.to_owned(),
                tx,
            },
        );
        LiveSubscription::Memory(MemoryLive {
            rx,
            bus: self.clone(),
            id,
        })
    }

    fn redeliver(&self, consumer: &str, message: RawMessage) {
        if let Some(queue) = self.lock().durable.get_mut(consumer) {
            queue.offer(message);
        }
    }

    fn record_ack(&self) {
        let mut state = self.lock();
        state.acks = state.acks.saturating_add(1);
    }

    fn record_nak(&self) {
        let mut state = self.lock();
        state.naks = state.naks.saturating_add(1);
    }

    fn close(&self) {
        let mut state = self.lock();
        for queue in state.durable.values_mut() {
            queue.tx = None;
        }
        state.live.clear();
    }

    /// Every envelope published so far that decodes, in publish order.
    pub fn published(&self) -> Vec<(Topic, RocketEnvelope)> {
        self.lock()
            .published
            .iter()
            .filter_map(|m| {
                let topic = Topic::parse(&m.subject)?;
                let envelope = serde_json::from_slice(&m.payload).ok()?;
                Some((topic, envelope))
            })
            .collect()
    }

    /// Deliveries acknowledged so far.
    pub fn ack_count(&self) -> usize {
        self.lock().acks
    }

    /// Deliveries negatively acknowledged so far.
    pub fn nak_count(&self) -> usize {
        self.lock().naks
    }

    /// Live subscriptions currently open.
    pub fn live_subscribers(&self) -> usize {
        self.lock().live.len()
    }
}

/// An in-process live subscription. Unsubscribes on drop.
pub struct MemoryLive {
    rx: mpsc::UnboundedReceiver<RawMessage>,
    bus: MemoryBus,
    id: Uuid,
}

impl Drop for MemoryLive {
    fn drop(&mut self) {
        self.bus.lock().live.remove(&self.id);
    }
}
