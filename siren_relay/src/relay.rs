use log::{debug, error, info};
use siren_core::queue::QueueConsumer;

use crate::broadcaster::Broadcaster;

/// Why the relay stopped. Every variant is fatal to the relay process.
#[derive(Debug, thiserror::Error)]
pub enum RelayError<E: std::error::Error + 'static> {
    /// The broker failed.
    #[error("Broker error: {0}")]
    Broker(#[source] E),
    /// The broker closed the subscription.
    #[error("Broker closed the subscription")]
    Closed,
}

/// Relays deliveries from `consumer` to `broadcaster` until the subscription fails.
///
/// Each delivery is acknowledged once it has been handed to the broadcaster, whether or
/// not anyone was subscribed. There is no retry: a broker error ends the relay and the
/// process supervisor is expected to restart it.
pub async fn run_relay<C: QueueConsumer>(
    mut consumer: C,
    broadcaster: Broadcaster,
) -> RelayError<C::Error> {
    info!("Relay started");
    loop {
        let delivery = match consumer.recv().await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                error!("Broker closed the subscription");
                return RelayError::Closed;
            }
            Err(e) => {
                error!("Failed to receive from broker: {}", e);
                return RelayError::Broker(e);
            }
        };

        let size = delivery.payload.len();
        let subscribers = broadcaster.publish(delivery.payload);
        debug!("Relayed {} bytes to {} subscribers", size, subscribers);

        if let Err(e) = consumer.ack(delivery.tag).await {
            error!("Failed to acknowledge delivery: {}", e);
            return RelayError::Broker(e);
        }
    }
}
