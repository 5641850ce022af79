// src/core/notifier.rs
use crate::connectors::traits::NotificationSink;
use crate::types::Notification;
use crate::utils::deadline::bounded;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Starts the delivery worker. The loop only ever `try_send`s into the
/// returned channel, so a slow or broken sink can't stall a cycle.
pub fn spawn_notifier(
    sink: Arc<dyn NotificationSink>,
    send_timeout: Duration,
    capacity: usize,
) -> (mpsc::Sender<Notification>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);
    let handle = tokio::spawn(deliver(rx, sink, send_timeout));
    (tx, handle)
}

async fn deliver(
    mut rx: mpsc::Receiver<Notification>,
    sink: Arc<dyn NotificationSink>,
    send_timeout: Duration,
) {
    while let Some(notification) = rx.recv().await {
        let text = notification.to_string();
        if let Err(e) = bounded(send_timeout, "notification", sink.send(&text)).await {
            warn!("Notification dropped: {:#}", e);
        }
    }
    info!("Notifier finished, channel closed");
}
