use bytes::Bytes;
use tokio::sync::broadcast;

/// Messages buffered per subscriber before it starts lagging.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 1024;

/// Delivers each payload to every current subscriber.
///
/// Every subscriber has its own bounded buffer; one that falls behind loses the oldest
/// messages instead of holding the others back.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    tx: broadcast::Sender<Bytes>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl Broadcaster {
    /// Creates a broadcaster with `buffer` messages of room per subscriber.
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    /// Publishes a payload and returns how many subscribers it was queued for.
    pub fn publish(&self, payload: impl Into<Bytes>) -> usize {
        // No subscribers is not an error: the message is simply not seen by anyone.
        self.tx.send(payload.into()).unwrap_or(0)
    }

    /// Subscribes to messages published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn subscribers_only_see_later_messages() {
        let broadcaster = Broadcaster::new(8);
        assert_eq!(broadcaster.publish(Bytes::from_static(b"before")), 0);

        let mut rx = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(broadcaster.publish(Bytes::from_static(b"after")), 1);
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"after"));
    }

    #[tokio::test]
    async fn slow_subscriber_lags_without_blocking_others() {
        let broadcaster = Broadcaster::new(2);
        let mut slow = broadcaster.subscribe();
        let mut fast = broadcaster.subscribe();

        for i in 0..4u8 {
            broadcaster.publish(vec![i]);
            assert_eq!(fast.recv().await.unwrap().as_ref(), &[i]);
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(2))));
        assert_eq!(slow.recv().await.unwrap().as_ref(), &[2]);
    }
}
