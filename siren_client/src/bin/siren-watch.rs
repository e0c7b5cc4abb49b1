use clap::Parser;
use log::info;
use siren_client::{ClientSession, HttpAlertLookup, SessionConfig};

/// Follows the live alert channel and logs what a display would show.
#[derive(Debug, Parser)]
#[command(name = "siren-watch", version)]
struct Args {
    /// Base URL of the query service.
    #[arg(long, env = "SIREN_API_URL", default_value = "http://127.0.0.1:3000")]
    api_url: String,
    /// Base URL of the geometry service.
    #[arg(long, env = "SIREN_GEO_URL", default_value = "http://127.0.0.1:3001")]
    geo_url: String,
    /// Websocket URL of the relay.
    #[arg(long, env = "SIREN_LIVE_URL", default_value = "ws://127.0.0.1:8080/live")]
    live_url: String,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let lookup = HttpAlertLookup::new(args.api_url, args.geo_url);
    let session = ClientSession::start(lookup, SessionConfig::new(args.live_url)).await;
    let caches = session.caches();
    let mut notifications = session.notifications();
    let mut revisions = caches.changes();
    let mut statuses = session.statuses();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Ok(()) = notifications.changed() => {
                if let Some(shown) = notifications.borrow_and_update().clone() {
                    let envelope = &shown.entry.envelope;
                    info!(
                        "[{:?}] {} from {} ({})",
                        envelope.action, envelope.event, envelope.sender, envelope.identifier
                    );
                }
            }
            Ok(()) = revisions.changed() => {
                let revision = *revisions.borrow_and_update();
                info!(
                    "Caches at revision {}: {} alerts, {} features",
                    revision,
                    caches.alert_count().await,
                    caches.feature_count().await
                );
            }
            Ok(()) = statuses.changed() => {
                info!("Live channel {:?}", *statuses.borrow_and_update());
            }
        }
    }

    info!("Shutting down");
    session.shutdown().await;
}
