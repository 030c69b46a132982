use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::DeliveryError;
use crate::kernel::delivery::CollectorPayload;

/// Best-effort outbound transport to the collector.
///
/// `Ok(())` only means the request left without a transport-level error.
/// A request that reached the collector but got no answer in time counts as sent.
/// Implementations must not read or interpret the response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &CollectorPayload) -> Result<(), DeliveryError>;
}

/// POSTs JSON payloads to the collector endpoint, fire-and-forget.
#[derive(Clone)]
pub struct HttpCollector {
    client: Client,
    url: String,
}

impl HttpCollector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        // Connect must fail first, so a timeout on a connected request is never a connect error.
        let client = Client::builder()
            .connect_timeout(timeout / 2)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpCollector {
    async fn send(&self, payload: &CollectorPayload) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(payload)?;

        // Status and body are not inspected; a completed request counts as delivered.
        let sent = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        match sent {
            Ok(_) => Ok(()),
            Err(e) if e.is_timeout() && !e.is_connect() => {
                debug!(url = %self.url, "collector did not answer in time, request counted as sent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
