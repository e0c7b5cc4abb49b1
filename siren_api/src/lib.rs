//! # Siren API
//!
//! The read side of the authoritative alert store, served over HTTP:
//!
//! - `GET /` answers `SIREN API`.
//! - `GET /active` returns the alerts active right now.
//! - `POST /alerts` takes a JSON array of identifiers and returns their joined records.
//!
//! The router is generic over the [`AlertStateStore`], so the same routes run over
//! postgres in production and over the in-memory store in tests.

#![deny(missing_docs)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, error};
use serde::Serialize;
use siren_core::prelude::*;

/// Errors surfaced by the API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);
        let body = ErrorBody {
            error: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

fn store_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> ApiError {
    ApiError::Store(Box::new(e))
}

/// Routes of the API over `store`.
pub fn router<S>(store: S) -> Router
where
    S: AlertStateStore + Clone + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/active", get(active::<S>))
        .route("/alerts", post(alerts::<S>))
        .with_state(ActiveStateAggregator::new(store))
}

async fn root() -> &'static str {
    "SIREN API"
}

async fn active<S>(
    State(aggregator): State<ActiveStateAggregator<S>>,
) -> Result<Json<Vec<AlertRecord>>, ApiError>
where
    S: AlertStateStore + Clone + 'static,
{
    let records = aggregator.active().await.map_err(store_error)?;
    debug!("Serving {} active alerts", records.len());
    Ok(Json(records))
}

async fn alerts<S>(
    State(aggregator): State<ActiveStateAggregator<S>>,
    Json(identifiers): Json<Vec<String>>,
) -> Result<Json<Vec<AlertRecord>>, ApiError>
where
    S: AlertStateStore + Clone + 'static,
{
    let records = aggregator
        .store()
        .records_by_ids(&identifiers)
        .await
        .map_err(store_error)?;
    debug!(
        "Resolved {} of {} requested alerts",
        records.len(),
        identifiers.len()
    );
    Ok(Json(records))
}
