use async_trait::async_trait;
use reqwest::Client;
use siren_core::prelude::*;

/// Errors raised by [`HttpAlertLookup`].
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Transport failure or non-success status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The geometry response couldn't be decoded.
    #[error("Decode error: {0}")]
    Codec(#[from] CodecError),
}

/// [`AlertLookup`] over the query service (`POST /alerts`, `GET /active`) and the
/// geometry service (`POST /polygon`).
#[derive(Debug, Clone)]
pub struct HttpAlertLookup {
    client: Client,
    api_url: String,
    geo_url: String,
}

impl HttpAlertLookup {
    /// Creates a lookup against the given base URLs.
    pub fn new(api_url: impl Into<String>, geo_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_url, geo_url)
    }

    /// Same as [`new`](Self::new) with a preconfigured client.
    pub fn with_client(
        client: Client,
        api_url: impl Into<String>,
        geo_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            geo_url: geo_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AlertLookup for HttpAlertLookup {
    type Error = LookupError;

    async fn fetch_alerts(&self, identifiers: &[String]) -> Result<Vec<AlertRecord>, Self::Error> {
        let records = self
            .client
            .post(format!("{}/alerts", self.api_url))
            .json(identifiers)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(records)
    }

    async fn fetch_geometry(&self, identifiers: &[String]) -> Result<Topology, Self::Error> {
        let body = self
            .client
            .post(format!("{}/polygon", self.geo_url))
            .json(identifiers)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(Topology::decode(&body)?)
    }

    async fn fetch_active(&self) -> Result<Vec<AlertRecord>, Self::Error> {
        let records = self
            .client
            .get(format!("{}/active", self.api_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(records)
    }
}
