use std::future::IntoFuture;
use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use siren_relay::{AmqpQueue, Broadcaster, DEFAULT_SUBSCRIBER_BUFFER, router, run_relay};
use tokio::net::TcpListener;

/// Relays the ingestion queue to live websocket subscribers.
#[derive(Debug, Parser)]
#[command(name = "siren-relay", version)]
struct Args {
    /// AMQP broker URI.
    #[arg(long, env = "RABBITMQ_URL", default_value = "amqp://127.0.0.1:5672/%2f")]
    amqp_url: String,
    /// Durable queue to consume.
    #[arg(long, env = "SIREN_QUEUE", default_value = "push")]
    queue: String,
    /// Address to serve `/live` and `/health` on.
    #[arg(long, env = "SIREN_RELAY_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
    /// Messages buffered per subscriber before it lags.
    #[arg(long, default_value_t = DEFAULT_SUBSCRIBER_BUFFER)]
    subscriber_buffer: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let queue = match AmqpQueue::connect(&args.amqp_url, &args.queue).await {
        Ok(queue) => queue,
        Err(e) => {
            error!("Failed to connect to broker: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let listener = match TcpListener::bind(args.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", args.bind, e);
            return ExitCode::FAILURE;
        }
    };
    info!("Serving live subscribers on ws://{}/live", args.bind);

    let broadcaster = Broadcaster::new(args.subscriber_buffer);
    let server = axum::serve(listener, router(broadcaster.clone())).into_future();

    tokio::select! {
        e = run_relay(queue, broadcaster) => {
            error!("Relay stopped: {}", e);
        }
        result = server => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
    }
    ExitCode::FAILURE
}
