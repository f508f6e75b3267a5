// # HTTP Instance-Health Oracle
//
// This crate provides an HTTP-backed InstanceHealth implementation for the
// buildwatch system.
//
// ## Semantics
//
// One GET per check against a status endpoint (a load-balancer health
// page, a service-discovery status URL):
//
// - 2xx response  -> in service
// - non-2xx       -> out of service (the instance was deliberately pulled)
// - transport error -> surfaced as an error; the scheduler fails OPEN, so
//   an unreachable status endpoint never stops polling fleet-wide
//
// This stays a boolean predicate on purpose. It is not leader election,
// and several instances may be reported up at once.

use std::time::Duration;

use async_trait::async_trait;
use buildwatch_core::traits::InstanceHealth;
use buildwatch_core::{Error, Result};

/// Default HTTP timeout for health checks
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP-backed instance-health oracle
#[derive(Debug, Clone)]
pub struct HttpHealth {
    /// Status endpoint URL
    url: String,

    /// HTTP client for checks
    client: reqwest::Client,
}

impl HttpHealth {
    /// Create a new HTTP health oracle
    ///
    /// # Parameters
    ///
    /// - `url`: Status endpoint answering 2xx while this instance should poll
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::health(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl InstanceHealth for HttpHealth {
    async fn is_in_service(&self) -> Result<bool> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::health(format!("status check failed: {}", e)))?;

        let in_service = response.status().is_success();
        tracing::debug!(status = %response.status(), in_service, "health check");
        Ok(in_service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error_not_out_of_service() {
        // The distinction matters: errors fail open at the scheduler,
        // an explicit out-of-service answer does not.
        let oracle = HttpHealth::new("http://127.0.0.1:1/status").unwrap();
        assert!(oracle.is_in_service().await.is_err());
    }
}
