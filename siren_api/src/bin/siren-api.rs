use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use siren_pg::{Migrator, PgAlertStateStore};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

/// Serves the active alert set and batch detail lookups from postgres.
#[derive(Debug, Parser)]
#[command(name = "siren-api", version)]
struct Args {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
    /// Address to listen on.
    #[arg(long, env = "SIREN_API_BIND", default_value = "0.0.0.0:3000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&args.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to postgres: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match Migrator::new(pool.clone()).run().await {
        Ok(applied) => info!("Applied {} migrations", applied),
        Err(e) => {
            error!("Migration failed: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let listener = match TcpListener::bind(args.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", args.bind, e);
            return ExitCode::FAILURE;
        }
    };
    info!("Serving SIREN API on http://{}", args.bind);

    let app = siren_api::router(PgAlertStateStore::new(pool));
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server stopped: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
