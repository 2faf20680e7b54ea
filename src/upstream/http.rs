//! HTTP clients for the trust and graph services.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::{GraphSource, SellerDirectory, TrustSource};
use crate::error::UpstreamError;
use crate::types::{
    CollusionReport, GraphPayload, GraphResult, SellerId, SellerSummary, TrustPayload, TrustResult,
};

/// Longest upstream error body kept in an error.
const MAX_ERROR_BODY: usize = 256;

/// Client for the trust ("ML") service.
///
/// The same service also serves the seller directory.
#[derive(Debug, Clone)]
pub struct HttpTrustClient {
    client: Client,
    base_url: String,
}

impl HttpTrustClient {
    /// Create a client for the service at `base_url` (no trailing slash).
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Base URL of the service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TrustSource for HttpTrustClient {
    async fn compute_trust(&self, seller: &SellerId) -> Result<TrustResult, UpstreamError> {
        let url = format!("{}/compute-trust", self.base_url);
        debug!(url = %url, seller_id = %seller, "Requesting trust computation");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "seller_id": seller.as_str() }))
            .send()
            .await?;

        let payload: TrustPayload = read_json(response).await?;
        TrustResult::from_payload(payload).map_err(UpstreamError::Malformed)
    }

    async fn ping(&self) -> Result<(), UpstreamError> {
        ping(&self.client, &self.base_url).await
    }
}

#[async_trait]
impl SellerDirectory for HttpTrustClient {
    async fn list_sellers(&self) -> Result<Vec<SellerSummary>, UpstreamError> {
        let url = format!("{}/sellers", self.base_url);
        debug!(url = %url, "Fetching seller directory");

        let response = self.client.get(&url).send().await?;
        read_json(response).await
    }
}

/// Client for the graph analysis service.
#[derive(Debug, Clone)]
pub struct HttpGraphClient {
    client: Client,
    base_url: String,
}

impl HttpGraphClient {
    /// Create a client for the service at `base_url` (no trailing slash).
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl GraphSource for HttpGraphClient {
    async fn graph_signals(&self, seller: &SellerId) -> Result<GraphResult, UpstreamError> {
        let url = format!("{}/graph/{}", self.base_url, seller);
        debug!(url = %url, "Requesting graph signals");

        let response = self.client.get(&url).send().await?;
        let payload: GraphPayload = read_json(response).await?;
        GraphResult::from_payload(payload).map_err(UpstreamError::Malformed)
    }

    async fn suspicious_communities(&self) -> Result<CollusionReport, UpstreamError> {
        let url = format!("{}/detect-collusion", self.base_url);
        debug!(url = %url, "Requesting collusion communities");

        let response = self.client.get(&url).send().await?;
        read_json(response).await
    }

    async fn ping(&self) -> Result<(), UpstreamError> {
        ping(&self.client, &self.base_url).await
    }
}

async fn ping(client: &Client, base_url: &str) -> Result<(), UpstreamError> {
    let response = client.get(format!("{}/", base_url)).send().await?;
    if response.status().is_success() {
        Ok(())
    } else {
        Err(UpstreamError::Status {
            status: response.status().as_u16(),
            body: String::new(),
        })
    }
}

/// Check the status and decode a JSON body.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Malformed(e.to_string()))
}
