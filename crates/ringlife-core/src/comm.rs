//! Rank-to-rank message passing.
//!
//! A [`CommBroker`] owns one bounded inbox per rank. Each worker holds the
//! [`Endpoint`] for its own rank and uses it to post non-blocking sends and
//! to await matching receives. Envelopes that arrive before anyone asks for
//! them are parked in the endpoint until a receive with a matching
//! `(source, type, tag)` shows up.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Result, RingLifeError};
use crate::message::{MessageEnvelope, Rank};

/// Configuration for rank messaging.
#[derive(Debug, Clone)]
pub struct CommConfig {
    /// Capacity of every rank inbox.
    pub max_pending_messages: usize,
    /// How long a receive waits before failing, in milliseconds.
    pub receive_timeout_ms: u64,
    /// Log every delivered envelope at trace level.
    pub enable_tracing: bool,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            max_pending_messages: 1024,
            receive_timeout_ms: 30_000,
            enable_tracing: false,
        }
    }
}

/// Status of a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Envelope placed in the destination inbox.
    Delivered,
    /// Destination rank is not registered or has shut down.
    NotFound,
    /// Destination inbox is full.
    QueueFull,
}

/// Receipt for a send.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// Sending rank.
    pub source: Rank,
    /// Destination rank.
    pub destination: Rank,
    /// Delivery status.
    pub status: DeliveryStatus,
}

/// Messaging statistics.
#[derive(Debug, Clone, Default)]
pub struct CommStats {
    /// Number of registered endpoints.
    pub registered_endpoints: usize,
    /// Total envelopes delivered.
    pub messages_delivered: u64,
}

/// Routes envelopes between the ranks of one simulation.
pub struct CommBroker {
    config: CommConfig,
    size: usize,
    endpoints: RwLock<HashMap<Rank, mpsc::Sender<MessageEnvelope>>>,
    message_counter: AtomicU64,
}

impl std::fmt::Debug for CommBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommBroker")
            .field("size", &self.size)
            .field("registered", &self.endpoints.read().len())
            .field("delivered", &self.message_counter.load(Ordering::Relaxed))
            .finish()
    }
}

impl CommBroker {
    /// Create a broker for a ring of `size` ranks.
    pub fn new(size: usize, config: CommConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            size,
            endpoints: RwLock::new(HashMap::new()),
            message_counter: AtomicU64::new(0),
        })
    }

    /// Number of ranks in the ring.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Broker configuration.
    pub fn config(&self) -> &CommConfig {
        &self.config
    }

    /// Register the endpoint for `rank`.
    pub fn register(self: &Arc<Self>, rank: Rank) -> Result<Endpoint> {
        if rank.index() >= self.size {
            return Err(RingLifeError::Config(format!(
                "{} is outside a ring of {} ranks",
                rank, self.size
            )));
        }

        let (sender, receiver) = mpsc::channel(self.config.max_pending_messages.max(1));
        {
            let mut endpoints = self.endpoints.write();
            if endpoints.contains_key(&rank) {
                return Err(RingLifeError::Config(format!("{} registered twice", rank)));
            }
            endpoints.insert(rank, sender);
        }

        Ok(Endpoint {
            rank,
            receiver,
            pending: VecDeque::new(),
            broker: Arc::clone(self),
            receive_timeout: Duration::from_millis(self.config.receive_timeout_ms),
        })
    }

    /// Remove the endpoint for `rank`. Later sends to it report `NotFound`.
    pub fn unregister(&self, rank: Rank) {
        self.endpoints.write().remove(&rank);
    }

    /// Check if a rank is registered.
    pub fn is_registered(&self, rank: Rank) -> bool {
        self.endpoints.read().contains_key(&rank)
    }

    /// Deliver an envelope to `destination` without waiting.
    pub fn send(&self, destination: Rank, envelope: MessageEnvelope) -> DeliveryReceipt {
        let source = envelope.header.source;
        let endpoints = self.endpoints.read();

        let status = match endpoints.get(&destination) {
            Some(sender) => {
                let message_type = envelope.header.message_type;
                let tag = envelope.header.tag;
                match sender.try_send(envelope) {
                    Ok(()) => {
                        self.record_delivery(source, destination, message_type, tag);
                        DeliveryStatus::Delivered
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => DeliveryStatus::QueueFull,
                    Err(mpsc::error::TrySendError::Closed(_)) => DeliveryStatus::NotFound,
                }
            }
            None => DeliveryStatus::NotFound,
        };

        DeliveryReceipt {
            source,
            destination,
            status,
        }
    }

    /// Deliver an envelope to `destination`, waiting up to `timeout` for
    /// room in its inbox. A destination that stays full reports `QueueFull`.
    pub async fn send_wait(
        &self,
        destination: Rank,
        envelope: MessageEnvelope,
        timeout: Duration,
    ) -> DeliveryReceipt {
        let source = envelope.header.source;
        let message_type = envelope.header.message_type;
        let tag = envelope.header.tag;
        let sender = self.endpoints.read().get(&destination).cloned();

        let status = match sender {
            Some(sender) => match tokio::time::timeout(timeout, sender.send(envelope)).await {
                Ok(Ok(())) => {
                    self.record_delivery(source, destination, message_type, tag);
                    DeliveryStatus::Delivered
                }
                Ok(Err(_)) => DeliveryStatus::NotFound,
                Err(_) => DeliveryStatus::QueueFull,
            },
            None => DeliveryStatus::NotFound,
        };

        DeliveryReceipt {
            source,
            destination,
            status,
        }
    }

    fn record_delivery(&self, source: Rank, destination: Rank, message_type: u64, tag: u64) {
        self.message_counter.fetch_add(1, Ordering::Relaxed);
        if self.config.enable_tracing {
            tracing::trace!(
                "{} -> {}: type={} tag={}",
                source,
                destination,
                message_type,
                tag
            );
        }
    }

    /// Get statistics.
    pub fn stats(&self) -> CommStats {
        CommStats {
            registered_endpoints: self.endpoints.read().len(),
            messages_delivered: self.message_counter.load(Ordering::Relaxed),
        }
    }
}

/// The messaging handle owned by one rank.
pub struct Endpoint {
    rank: Rank,
    receiver: mpsc::Receiver<MessageEnvelope>,
    /// Envelopes received ahead of the receive that wants them.
    pending: VecDeque<MessageEnvelope>,
    broker: Arc<CommBroker>,
    receive_timeout: Duration,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("rank", &self.rank)
            .field("size", &self.broker.size)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Endpoint {
    /// This endpoint's rank.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Number of ranks in the ring.
    pub fn size(&self) -> usize {
        self.broker.size
    }

    /// Number of envelopes parked for later receives.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Send without waiting and return the receipt.
    pub fn send(&self, destination: Rank, envelope: MessageEnvelope) -> DeliveryReceipt {
        self.broker.send(destination, envelope)
    }

    /// Send without waiting; anything but delivery is an error.
    pub fn post(&self, destination: Rank, envelope: MessageEnvelope) -> Result<()> {
        let message_type = envelope.header.message_type;
        let receipt = self.send(destination, envelope);
        check_receipt(&receipt, message_type)
    }

    /// Send, waiting for room in the destination inbox for at most the
    /// receive timeout; anything but delivery is an error.
    pub async fn deliver(&self, destination: Rank, envelope: MessageEnvelope) -> Result<()> {
        let message_type = envelope.header.message_type;
        let receipt = self
            .broker
            .send_wait(destination, envelope, self.receive_timeout)
            .await;
        check_receipt(&receipt, message_type)
    }

    /// Wait for an envelope of `message_type` and `tag` from `source`.
    pub async fn recv_from(
        &mut self,
        source: Rank,
        message_type: u64,
        tag: u64,
    ) -> Result<MessageEnvelope> {
        self.recv_matching(Some(source), message_type, Some(tag))
            .await
    }

    /// Wait for an envelope of `message_type` and `tag` from any rank.
    pub async fn recv_any(&mut self, message_type: u64, tag: u64) -> Result<MessageEnvelope> {
        self.recv_matching(None, message_type, Some(tag)).await
    }

    /// Wait for an envelope of `message_type` from any rank, whatever its
    /// tag. Envelopes of one type are taken in arrival order.
    pub async fn recv_type(&mut self, message_type: u64) -> Result<MessageEnvelope> {
        self.recv_matching(None, message_type, None).await
    }

    async fn recv_matching(
        &mut self,
        source: Option<Rank>,
        message_type: u64,
        tag: Option<u64>,
    ) -> Result<MessageEnvelope> {
        let matches = |env: &MessageEnvelope| {
            env.header.message_type == message_type
                && tag.map_or(true, |t| env.header.tag == t)
                && source.map_or(true, |s| env.header.source == s)
        };

        if let Some(pos) = self.pending.iter().position(matches) {
            if let Some(envelope) = self.pending.remove(pos) {
                return Ok(envelope);
            }
        }

        let deadline = Instant::now() + self.receive_timeout;
        loop {
            let received = tokio::time::timeout_at(deadline, self.receiver.recv()).await;
            match received {
                Ok(Some(envelope)) if matches(&envelope) => return Ok(envelope),
                Ok(Some(envelope)) => {
                    if self.pending.len() >= self.broker.config.max_pending_messages {
                        return Err(RingLifeError::Communication(format!(
                            "{} has {} unmatched messages parked",
                            self.rank,
                            self.pending.len()
                        )));
                    }
                    self.pending.push_back(envelope);
                }
                Ok(None) => {
                    return Err(RingLifeError::Communication(format!(
                        "inbox of {} closed",
                        self.rank
                    )));
                }
                Err(_) => {
                    let what = match tag {
                        Some(tag) => format!("message type {} tag {}", message_type, tag),
                        None => format!("message type {}", message_type),
                    };
                    return Err(RingLifeError::Timeout {
                        what,
                        source_rank: source.map(Rank::index),
                        timeout_ms: self.receive_timeout.as_millis() as u64,
                    });
                }
            }
        }
    }
}

fn check_receipt(receipt: &DeliveryReceipt, message_type: u64) -> Result<()> {
    if receipt.status != DeliveryStatus::Delivered {
        tracing::warn!(
            "Send failed: {} -> {} (type {}), status: {:?}",
            receipt.source,
            receipt.destination,
            message_type,
            receipt.status
        );
        return Err(RingLifeError::Communication(format!(
            "{} could not deliver message type {} to {}: {:?}",
            receipt.source, message_type, receipt.destination, receipt.status
        )));
    }
    Ok(())
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.broker.unregister(self.rank);
    }
}

/// Builder for a [`CommBroker`].
pub struct CommBuilder {
    config: CommConfig,
}

impl CommBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: CommConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn with_config(config: CommConfig) -> Self {
        Self { config }
    }

    /// Set the inbox capacity.
    pub fn max_pending_messages(mut self, count: usize) -> Self {
        self.config.max_pending_messages = count;
        self
    }

    /// Set the receive timeout.
    pub fn receive_timeout_ms(mut self, timeout: u64) -> Self {
        self.config.receive_timeout_ms = timeout;
        self
    }

    /// Enable message tracing.
    pub fn enable_tracing(mut self, enable: bool) -> Self {
        self.config.enable_tracing = enable;
        self
    }

    /// Build a broker for `size` ranks.
    pub fn build(self, size: usize) -> Arc<CommBroker> {
        CommBroker::new(size, self.config)
    }
}

impl Default for CommBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::message_type;

    #[tokio::test]
    async fn test_broker_registration() {
        let broker = CommBuilder::new().build(2);

        let _e0 = broker.register(Rank(0)).unwrap();
        let _e1 = broker.register(Rank(1)).unwrap();

        assert!(broker.is_registered(Rank(0)));
        assert!(broker.is_registered(Rank(1)));
        assert_eq!(broker.stats().registered_endpoints, 2);

        assert!(broker.register(Rank(1)).is_err());
        assert!(broker.register(Rank(2)).is_err());
    }

    #[tokio::test]
    async fn test_message_delivery() {
        let broker = CommBuilder::new().build(2);
        let e0 = broker.register(Rank(0)).unwrap();
        let mut e1 = broker.register(Rank(1)).unwrap();

        let envelope = MessageEnvelope::new(message_type::HALO_ROW, Rank(0), 7, 1, vec![1, 2]);
        let receipt = e0.send(Rank(1), envelope);
        assert_eq!(receipt.status, DeliveryStatus::Delivered);

        let got = e1.recv_from(Rank(0), message_type::HALO_ROW, 7).await.unwrap();
        assert_eq!(got.payload, vec![1, 2]);
        assert_eq!(broker.stats().messages_delivered, 1);
    }

    #[tokio::test]
    async fn test_out_of_order_messages_are_parked() {
        let broker = CommBuilder::new().build(2);
        let e0 = broker.register(Rank(0)).unwrap();
        let mut e1 = broker.register(Rank(1)).unwrap();

        e0.post(Rank(1), MessageEnvelope::empty(message_type::VERDICT, Rank(0), 0, 1))
            .unwrap();
        e0.post(Rank(1), MessageEnvelope::empty(message_type::HALO_ROW, Rank(0), 1, 1))
            .unwrap();

        let halo = e1.recv_from(Rank(0), message_type::HALO_ROW, 1).await.unwrap();
        assert_eq!(halo.header.tag, 1);
        assert_eq!(e1.pending_count(), 1);

        let verdict = e1.recv_any(message_type::VERDICT, 0).await.unwrap();
        assert_eq!(verdict.header.source, Rank(0));
        assert_eq!(e1.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_send_to_dropped_endpoint() {
        let broker = CommBuilder::new().build(2);
        let e0 = broker.register(Rank(0)).unwrap();
        let e1 = broker.register(Rank(1)).unwrap();
        drop(e1);

        let receipt = e0.send(Rank(1), MessageEnvelope::empty(message_type::VERDICT, Rank(0), 0, 0));
        assert_eq!(receipt.status, DeliveryStatus::NotFound);
        assert!(e0
            .post(Rank(1), MessageEnvelope::empty(message_type::VERDICT, Rank(0), 0, 0))
            .is_err());
    }

    #[tokio::test]
    async fn test_queue_full() {
        let broker = CommBuilder::new().max_pending_messages(1).build(2);
        let e0 = broker.register(Rank(0)).unwrap();
        let _e1 = broker.register(Rank(1)).unwrap();

        let first = e0.send(Rank(1), MessageEnvelope::empty(message_type::VERDICT, Rank(0), 0, 0));
        let second = e0.send(Rank(1), MessageEnvelope::empty(message_type::VERDICT, Rank(0), 0, 0));
        assert_eq!(first.status, DeliveryStatus::Delivered);
        assert_eq!(second.status, DeliveryStatus::QueueFull);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_timeout() {
        let broker = CommBuilder::new().receive_timeout_ms(50).build(2);
        let mut e0 = broker.register(Rank(0)).unwrap();
        let _e1 = broker.register(Rank(1)).unwrap();

        let err = e0
            .recv_from(Rank(1), message_type::HALO_ROW, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RingLifeError::Timeout {
                source_rank: Some(1),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_deliver_waits_for_room() {
        let broker = CommBuilder::new()
            .max_pending_messages(2)
            .receive_timeout_ms(5_000)
            .build(2);
        let e0 = broker.register(Rank(0)).unwrap();
        let mut e1 = broker.register(Rank(1)).unwrap();

        let receiver = tokio::spawn(async move {
            let mut tags = Vec::new();
            for _ in 0..10 {
                let env = e1.recv_type(message_type::GATHER_ROW).await.unwrap();
                tags.push(env.header.tag);
            }
            tags
        });

        for tag in 0..10 {
            e0.deliver(
                Rank(1),
                MessageEnvelope::empty(message_type::GATHER_ROW, Rank(0), tag, 1),
            )
            .await
            .unwrap();
        }

        assert_eq!(receiver.await.unwrap(), (0..10).collect::<Vec<_>>());
        assert_eq!(broker.stats().messages_delivered, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_to_full_inbox_times_out() {
        let broker = CommBuilder::new()
            .max_pending_messages(1)
            .receive_timeout_ms(50)
            .build(2);
        let e0 = broker.register(Rank(0)).unwrap();
        let _e1 = broker.register(Rank(1)).unwrap();

        let env = MessageEnvelope::empty(message_type::GATHER_ROW, Rank(0), 0, 0);
        e0.deliver(Rank(1), env.clone()).await.unwrap();
        let err = e0.deliver(Rank(1), env).await.unwrap_err();
        assert!(err.is_communication());
    }

    #[tokio::test]
    async fn test_recv_type_ignores_tag() {
        let broker = CommBuilder::new().build(3);
        let e1 = broker.register(Rank(1)).unwrap();
        let e2 = broker.register(Rank(2)).unwrap();
        let mut e0 = broker.register(Rank(0)).unwrap();

        e1.post(Rank(0), MessageEnvelope::empty(message_type::VERDICT, Rank(1), 3, 0))
            .unwrap();
        e2.post(Rank(0), MessageEnvelope::empty(message_type::GATHER_ROW, Rank(2), 9, 0))
            .unwrap();

        let env = e0.recv_type(message_type::GATHER_ROW).await.unwrap();
        assert_eq!((env.header.source, env.header.tag), (Rank(2), 9));
        assert_eq!(e0.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_any_timeout_names_no_rank() {
        let broker = CommBuilder::new().receive_timeout_ms(50).build(2);
        let mut e0 = broker.register(Rank(0)).unwrap();

        let err = e0
            .recv_any(message_type::GATHER_ROW, 4)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RingLifeError::Timeout {
                source_rank: None,
                ..
            }
        ));
        assert!(err.to_string().ends_with("from any rank"));
    }

    #[test]
    fn test_comm_config_default() {
        let config = CommConfig::default();
        assert_eq!(config.max_pending_messages, 1024);
        assert_eq!(config.receive_timeout_ms, 30_000);
    }
}
