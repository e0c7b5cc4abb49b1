use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use siren_core::prelude::*;

#[derive(Debug, Default)]
struct QueueData {
    ready: VecDeque<(u64, Vec<u8>)>,
    unacked: HashMap<u64, Vec<u8>>,
    next_tag: u64,
    closed: bool,
}

/// An in-memory acknowledged FIFO queue.
///
/// Deliveries stay unacknowledged until [`QueueConsumer::ack`] is called and can be put
/// back with [`InMemoryQueue::recover`], the way a broker redelivers after a consumer
/// goes away.
#[derive(Clone, Debug, Default)]
pub struct InMemoryQueue {
    data: Arc<Mutex<QueueData>>,
    notify: Arc<Notify>,
}

/// Errors returned by the in-memory queue.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InMemoryQueueError {
    /// The queue was closed.
    #[error("Queue is closed")]
    Closed,
    /// The tag doesn't belong to an unacknowledged delivery.
    #[error("Unknown delivery tag {0}")]
    UnknownTag(u64),
}

impl InMemoryQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        log::debug!("Creating a new InMemoryQueue");
        Self::default()
    }

    /// Enqueues a payload.
    pub async fn publish(&self, payload: impl Into<Vec<u8>>) -> Result<(), InMemoryQueueError> {
        let mut data = self.data.lock().await;
        if data.closed {
            return Err(InMemoryQueueError::Closed);
        }
        let tag = data.next_tag;
        data.next_tag += 1;
        data.ready.push_back((tag, payload.into()));
        drop(data);
        self.notify.notify_one();
        Ok(())
    }

    /// A consumer of this queue.
    pub fn consumer(&self) -> InMemoryQueueConsumer {
        InMemoryQueueConsumer {
            queue: self.clone(),
        }
    }

    /// Closes the queue. Consumers see the end of the subscription once the ready
    /// messages are drained.
    pub async fn close(&self) {
        self.data.lock().await.closed = true;
        self.notify.notify_one();
    }

    /// Puts every unacknowledged delivery back at the front of the queue, in order.
    pub async fn recover(&self) -> usize {
        let mut data = self.data.lock().await;
        let mut unacked: Vec<(u64, Vec<u8>)> = data.unacked.drain().collect();
        unacked.sort_by_key(|(tag, _)| *tag);
        let count = unacked.len();
        for delivery in unacked.into_iter().rev() {
            data.ready.push_front(delivery);
        }
        drop(data);
        if count > 0 {
            self.notify.notify_one();
        }
        count
    }

    /// Number of delivered but unacknowledged messages.
    pub async fn unacked_count(&self) -> usize {
        self.data.lock().await.unacked.len()
    }

    /// Number of messages waiting for delivery.
    pub async fn ready_count(&self) -> usize {
        self.data.lock().await.ready.len()
    }
}

/// Consumer handed out by [`InMemoryQueue::consumer`].
#[derive(Debug)]
pub struct InMemoryQueueConsumer {
    queue: InMemoryQueue,
}

#[async_trait]
impl QueueConsumer for InMemoryQueueConsumer {
    type Tag = u64;
    type Error = InMemoryQueueError;

    async fn recv(&mut self) -> Result<Option<Delivery<u64>>, Self::Error> {
        loop {
            {
                let mut data = self.queue.data.lock().await;
                if let Some((tag, payload)) = data.ready.pop_front() {
                    data.unacked.insert(tag, payload.clone());
                    return Ok(Some(Delivery { payload, tag }));
                }
                if data.closed {
                    return Ok(None);
                }
            }
            self.queue.notify.notified().await;
        }
    }

    async fn ack(&mut self, tag: u64) -> Result<(), Self::Error> {
        let mut data = self.queue.data.lock().await;
        match data.unacked.remove(&tag) {
            Some(_) => Ok(()),
            None => Err(InMemoryQueueError::UnknownTag(tag)),
        }
    }
}
