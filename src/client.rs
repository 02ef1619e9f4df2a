//! HTTP client construction and timed requests

use crate::{
    error::{AppError, Result},
    models::Config,
};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Outcome of a single timed HTTP exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedResponse {
    pub url: String,
    pub status_code: u16,
    pub elapsed: Duration,
}

impl TimedResponse {
    /// Any status below 400 counts as the server answering
    pub fn is_ok(&self) -> bool {
        self.status_code < 400
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Builds the shared `reqwest` client used by every HTTP measurement.
///
/// The client carries no overall timeout. Availability and latency requests
/// set their own deadline; transfers bound each read instead, so one
/// connection pool serves both.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    user_agent: String,
    connect_timeout: Duration,
}

impl HttpClientFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            user_agent: crate::defaults::USER_AGENT.to_string(),
            connect_timeout: config.http_timeout(),
        }
    }

    /// Build a client
    pub fn create(&self) -> Result<Client> {
        Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))
    }
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

/// Send a request without a body and time it up to the response headers
pub async fn timed_request(client: &Client, method: Method, url: &str, timeout: Duration) -> Result<TimedResponse> {
    let started = Instant::now();
    let response = client.request(method, url).timeout(timeout).send().await?;
    Ok(TimedResponse {
        url: url.to_string(),
        status_code: response.status().as_u16(),
        elapsed: started.elapsed(),
    })
}

/// Timed HEAD request
pub async fn timed_head(client: &Client, url: &str, timeout: Duration) -> Result<TimedResponse> {
    timed_request(client, Method::HEAD, url, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_factory_builds_client() {
        assert!(HttpClientFactory::default().create().is_ok());
    }

    #[tokio::test]
    async fn test_timed_head_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClientFactory::default().create().unwrap();
        let ok = timed_head(&client, &server.uri(), Duration::from_secs(2)).await.unwrap();
        assert_eq!(ok.status_code, 204);
        assert!(ok.is_ok());

        let missing = timed_head(&client, &format!("{}/missing", server.uri()), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!missing.is_ok());
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let client = HttpClientFactory::default().create().unwrap();
        let err = timed_head(&client, &server.uri(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        let client = HttpClientFactory::default().create().unwrap();
        let err = timed_head(&client, "http://127.0.0.1:1", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
    }
}
