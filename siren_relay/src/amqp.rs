use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};

use siren_core::queue::{Delivery, QueueConsumer};

/// Errors raised by [`AmqpQueue`].
#[derive(Debug, thiserror::Error)]
pub enum AmqpQueueError {
    /// Any error reported by the AMQP client.
    #[error("AMQP error: {0}")]
    Lapin(#[from] lapin::Error),
}

/// A durable RabbitMQ queue consumed with manual acknowledgments.
pub struct AmqpQueue {
    // Held so the connection outlives the consumer.
    _connection: Connection,
    _channel: Channel,
    consumer: Consumer,
    queue: String,
}

impl AmqpQueue {
    /// Connects to the broker, declares `queue` as durable and starts consuming it.
    pub async fn connect(uri: &str, queue: &str) -> Result<Self, AmqpQueueError> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let consumer = channel
            .basic_consume(
                queue,
                "siren-relay",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        log::info!("Consuming durable queue '{}'", queue);
        Ok(Self {
            _connection: connection,
            _channel: channel,
            consumer,
            queue: queue.to_string(),
        })
    }

    /// Name of the consumed queue.
    pub fn queue(&self) -> &str {
        &self.queue
    }
}

#[async_trait]
impl QueueConsumer for AmqpQueue {
    type Tag = Acker;
    type Error = AmqpQueueError;

    async fn recv(&mut self) -> Result<Option<Delivery<Acker>>, Self::Error> {
        match self.consumer.next().await {
            Some(Ok(delivery)) => Ok(Some(Delivery {
                payload: delivery.data,
                tag: delivery.acker,
            })),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    async fn ack(&mut self, tag: Acker) -> Result<(), Self::Error> {
        tag.ack(BasicAckOptions::default()).await?;
        Ok(())
    }
}
