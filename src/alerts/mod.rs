//! Threshold evaluation and rate-limited notification delivery

mod alert_engine;
mod webhook;

pub use alert_engine::{AlertEngine, ClassifiedLine};
pub use webhook::{
    DeliveryMetrics, DeliverySink, DeliveryWorker, NotificationQueue, WebhookSink,
    MAX_DELIVERY_ATTEMPTS, NOTIFICATION_QUEUE_CAPACITY,
};
