use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::{QueueError, SeatQueue};
use crate::models::SeatCreationMessage;

/// Single-process queue over a tokio channel.
pub struct MemorySeatQueue {
    tx: mpsc::UnboundedSender<SeatCreationMessage>,
    rx: Mutex<mpsc::UnboundedReceiver<SeatCreationMessage>>,
    published: Mutex<Vec<SeatCreationMessage>>,
    reject_publish: AtomicBool,
    poll: Duration,
}

impl MemorySeatQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            published: Mutex::new(Vec::new()),
            reject_publish: AtomicBool::new(false),
            poll: Duration::from_millis(100),
        }
    }

    /// Every message ever published, in order.
    pub async fn published(&self) -> Vec<SeatCreationMessage> {
        self.published.lock().await.clone()
    }

    pub fn reject_publish(&self, reject: bool) {
        self.reject_publish.store(reject, Ordering::SeqCst);
    }
}

impl Default for MemorySeatQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeatQueue for MemorySeatQueue {
    async fn publish(&self, message: &SeatCreationMessage) -> Result<(), QueueError> {
        if self.reject_publish.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("injected publish failure".to_string()));
        }
        self.published.lock().await.push(message.clone());
        self.tx.send(message.clone()).map_err(|_| QueueError::Closed)
    }

    async fn next(&self) -> Result<Option<SeatCreationMessage>, QueueError> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(self.poll, rx.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(concert_id: i64) -> SeatCreationMessage {
        SeatCreationMessage {
            concert_id,
            total_seats: 0,
            ticket_classes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_messages_arrive_in_publish_order() {
        let queue = MemorySeatQueue::new();
        queue.publish(&message(1)).await.unwrap();
        queue.publish(&message(2)).await.unwrap();

        assert_eq!(queue.next().await.unwrap().unwrap().concert_id, 1);
        assert_eq!(queue.next().await.unwrap().unwrap().concert_id, 2);
        assert!(queue.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_publish_is_not_delivered() {
        let queue = MemorySeatQueue::new();
        queue.reject_publish(true);
        assert!(queue.publish(&message(1)).await.is_err());
        assert!(queue.published().await.is_empty());
    }
}
