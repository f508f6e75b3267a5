// # Webhook Event Sink
//
// This crate provides an HTTP webhook EventSink implementation for the
// buildwatch system.
//
// ## Delivery Semantics
//
// One POST per build event, fire-and-forget:
// - The serialized `BuildEvent` is the request body (JSON)
// - A non-2xx response or transport error is returned as a sink error,
//   which the detector logs and discards
// - No retries, no queueing, no acknowledgement protocol
//
// ## Constraints
//
// - Stateless: nothing persists between publishes
// - Single-shot: exactly one request per `publish` call

use std::time::Duration;

use async_trait::async_trait;
use buildwatch_core::traits::{BuildEvent, EventSink};
use buildwatch_core::{Error, Result};

/// Default HTTP timeout for webhook deliveries
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhook event sink
///
/// POSTs every event as a JSON document to one configured endpoint.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    /// Webhook endpoint URL
    url: String,

    /// HTTP client for deliveries
    client: reqwest::Client,
}

impl WebhookSink {
    /// Create a new webhook sink
    ///
    /// # Parameters
    ///
    /// - `url`: Endpoint receiving one POST per build event
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::sink(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl EventSink for WebhookSink {
    async fn publish(&self, event: &BuildEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| Error::sink(format!("delivery failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::sink(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        tracing::trace!(
            master = %event.master,
            job = %event.job,
            number = event.number,
            "event delivered"
        );
        Ok(())
    }
}
