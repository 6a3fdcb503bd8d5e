//! Notification delivery over a bounded queue
//!
//! Delivery is asynchronous relative to classification: the alert task
//! pushes notifications into a bounded queue and a dedicated worker drains
//! it, so a slow or failing webhook never stalls ingestion. The queue drops
//! the newest notification on overflow (and records the drop) rather than
//! buffering without bound. Failed sends are retried with exponential
//! backoff up to a fixed attempt count, then dropped with a recorded
//! delivery-failure metric.

use crate::error::AlertError;
use crate::events::Notification;
use log::{error, info, warn};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Capacity of the notification queue between the alert task and the worker
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 64;

/// Delivery attempts per notification before it is dropped
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Initial backoff between delivery attempts; doubles per retry
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Counters describing delivery outcomes
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    delivered: AtomicU64,
    /// Notifications dropped after exhausting all delivery attempts
    failed: AtomicU64,
    /// Notifications dropped because the queue was full
    dropped: AtomicU64,
}

impl DeliveryMetrics {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Abstract notification sink
///
/// The worker is generic over the sink so tests can substitute one backed
/// by a channel instead of a live webhook.
pub trait DeliverySink: Send + Sync + 'static {
    fn deliver(
        &self,
        notification: &Notification,
    ) -> impl std::future::Future<Output = Result<(), AlertError>> + Send;
}

/// Webhook sink posting to a Discord/Slack-compatible endpoint
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

impl DeliverySink for WebhookSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), AlertError> {
        // Both `content` (Discord) and `text` (Slack/Mattermost) carry the
        // human-readable summary; the structured fields ride alongside.
        let summary = format!("🚨 Sentinel: {}", notification.message);
        let payload = json!({
            "content": summary,
            "text": summary,
            "rule_name": notification.rule_name,
            "message": notification.message,
            "trigger_count": notification.trigger_count,
            "window_secs": notification.window_secs,
            "timestamp": notification.timestamp.to_rfc3339(),
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(AlertError::WebhookStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Producer side of the bounded notification queue
///
/// `push` never waits: when the queue is full the notification is dropped
/// (drop-newest) and counted, keeping the alert task non-blocking.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<Notification>,
    metrics: Arc<DeliveryMetrics>,
}

impl NotificationQueue {
    /// Create the queue, returning the producer handle and worker receiver
    pub fn bounded(
        capacity: usize,
        metrics: Arc<DeliveryMetrics>,
    ) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender, metrics }, receiver)
    }

    pub fn push(&self, notification: Notification) {
        if let Err(e) = self.sender.try_send(notification) {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Notification queue full, dropping alert: {}", e);
        }
    }
}

/// Drains the notification queue through a delivery sink
pub struct DeliveryWorker<S: DeliverySink> {
    sink: S,
    receiver: mpsc::Receiver<Notification>,
    metrics: Arc<DeliveryMetrics>,
}

impl<S: DeliverySink> DeliveryWorker<S> {
    pub fn new(
        sink: S,
        receiver: mpsc::Receiver<Notification>,
        metrics: Arc<DeliveryMetrics>,
    ) -> Self {
        Self {
            sink,
            receiver,
            metrics,
        }
    }

    /// Run until the queue closes, delivering each notification with retry
    pub async fn run(mut self) {
        while let Some(notification) = self.receiver.recv().await {
            self.deliver_with_retry(&notification).await;
        }
        info!(
            "Delivery worker stopped ({} delivered, {} failed, {} dropped)",
            self.metrics.delivered(),
            self.metrics.failed(),
            self.metrics.dropped()
        );
    }

    async fn deliver_with_retry(&self, notification: &Notification) {
        let mut backoff = INITIAL_BACKOFF;
        for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
            match self.sink.deliver(notification).await {
                Ok(()) => {
                    self.metrics.delivered.fetch_add(1, Ordering::Relaxed);
                    info!("Delivered alert for rule '{}'", notification.rule_name);
                    return;
                }
                Err(e) if attempt < MAX_DELIVERY_ATTEMPTS => {
                    warn!(
                        "Delivery attempt {}/{} for rule '{}' failed: {}, retrying in {:?}",
                        attempt, MAX_DELIVERY_ATTEMPTS, notification.rule_name, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    self.metrics.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "Dropping alert for rule '{}' after {} attempts: {}",
                        notification.rule_name, MAX_DELIVERY_ATTEMPTS, e
                    );
                }
            }
        }
    }
}
