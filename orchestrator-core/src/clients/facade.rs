//! Shared HTTP call facade: one [`ServiceClient`] per downstream service,
//! combining a per-service [`CircuitBreaker`] with [`RetryPolicy`] and a
//! per-request timeout (spec §4.C1).

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{CircuitBreakerConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Thin wrapper around `reqwest::Client` that applies the breaker, retry
/// policy, and timeout uniformly for one downstream service.
pub struct ServiceClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    timeout: Duration,
}

impl ServiceClient {
    /// Builds a client for `name` at `base_url` using the given breaker/retry config.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the underlying HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        breaker: CircuitBreakerConfig,
        retry: RetryConfig,
    ) -> Result<Self> {
        let name = name.into();
        let timeout = retry.request_timeout();
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Configuration(format!("building http client for {name}: {e}")))?;
        Ok(Self {
            breaker: CircuitBreaker::new(name.clone(), breaker),
            retry: RetryPolicy::new(retry),
            name,
            base_url: base_url.into(),
            http,
            timeout,
        })
    }

    /// Current breaker state, exposed for health checks.
    pub async fn breaker_state(&self) -> crate::circuit_breaker::CircuitState {
        self.breaker.state().await
    }

    async fn send_once<B: Serialize + Sync>(
        &self,
        method: &Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let mut req = self.http.request(method.clone(), url).timeout(self.timeout);
        if let Some(b) = body {
            req = req.json(b);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout { service: self.name.clone(), elapsed_ms: self.timeout.as_millis() as u64 }
            } else {
                Error::Transient { service: self.name.clone(), message: e.to_string() }
            }
        })?;
        classify_status(&self.name, response.status())?;
        Ok(response)
    }

    /// Issues a JSON request, running it under the retry policy and circuit
    /// breaker. `404` responses are mapped to `Ok(None)`; other non-2xx
    /// responses become [`Error::Fatal`] (4xx) or [`Error::Transient`] (5xx,
    /// retried by the policy before the breaker observes the final outcome).
    pub async fn request_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .breaker
            .call(|| self.retry.execute(|| self.send_once(&method, &url, body)))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .json::<T>()
            .await
            .map_err(|e| Error::DataQuality(format!("malformed response body from {}: {e}", self.name)))?;
        Ok(Some(body))
    }
}

fn classify_status(service: &str, status: StatusCode) -> Result<()> {
    if status.is_success() || status == StatusCode::NOT_FOUND {
        return Ok(());
    }
    if status.is_server_error() {
        return Err(Error::Transient { service: service.to_string(), message: format!("status {status}") });
    }
    match status {
        StatusCode::CONFLICT => Err(Error::Conflict(format!("{service} returned 409"))),
        StatusCode::UNPROCESSABLE_ENTITY => Err(Error::InvalidInput(format!("{service} returned 422"))),
        _ => Err(Error::Fatal { service: service.to_string(), status: status.as_u16(), message: status.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_not_found_pass_through() {
        assert!(classify_status("project", StatusCode::OK).is_ok());
        assert!(classify_status("project", StatusCode::NOT_FOUND).is_ok());
    }

    #[test]
    fn server_errors_are_transient() {
        match classify_status("sprint", StatusCode::SERVICE_UNAVAILABLE) {
            Err(Error::Transient { service, .. }) => assert_eq!(service, "sprint"),
            other => panic!("expected Transient, got {other:?}"),
        }
    }

    #[test]
    fn conflict_and_unprocessable_map_to_specific_errors() {
        assert!(matches!(classify_status("backlog", StatusCode::CONFLICT), Err(Error::Conflict(_))));
        assert!(matches!(classify_status("backlog", StatusCode::UNPROCESSABLE_ENTITY), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn other_client_errors_are_fatal() {
        match classify_status("control-plane", StatusCode::FORBIDDEN) {
            Err(Error::Fatal { status, .. }) => assert_eq!(status, 403),
            other => panic!("expected Fatal, got {other:?}"),
        }
    }
}
