//! Durable, acknowledged queue consumption.

use async_trait::async_trait;

/// A message handed out by a [`QueueConsumer`], pending acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<T> {
    /// Opaque payload, relayed unmodified.
    pub payload: Vec<u8>,
    /// Handle used to acknowledge the delivery.
    pub tag: T,
}

/// Consumer side of a FIFO, at-least-once queue.
///
/// Messages stay with the broker until acknowledged.
#[async_trait]
pub trait QueueConsumer: Send {
    /// Acknowledgment handle of a delivery.
    type Tag: Send;
    /// Broker errors. Any of them ends consumption.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for the next delivery. `Ok(None)` means the broker closed the subscription.
    async fn recv(&mut self) -> Result<Option<Delivery<Self::Tag>>, Self::Error>;

    /// Acknowledges a delivery.
    async fn ack(&mut self, tag: Self::Tag) -> Result<(), Self::Error>;
}
