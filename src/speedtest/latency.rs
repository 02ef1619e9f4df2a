//! HTTP round-trip latency stage

use crate::client::timed_head;
use crate::logging::NetworkLogger;
use std::time::Duration;

/// HEAD every host in order and keep the round-trip times of those that
/// answered below 400. Failures are logged and skipped.
pub async fn measure_latency(
    client: &reqwest::Client,
    urls: &[String],
    timeout: Duration,
    logger: Option<&NetworkLogger>,
) -> Vec<f64> {
    let mut samples = Vec::with_capacity(urls.len());

    for url in urls {
        match timed_head(client, url, timeout).await {
            Ok(response) => {
                if let Some(logger) = logger {
                    logger
                        .log_http_request(url, "HEAD", Some(response.status_code), response.elapsed_ms())
                        .await;
                }
                if response.is_ok() {
                    samples.push(response.elapsed_ms());
                } else if let Some(logger) = logger {
                    logger
                        .log_candidate_failure("latency", url, &format!("HTTP {}", response.status_code))
                        .await;
                }
            }
            Err(e) => {
                if let Some(logger) = logger {
                    logger.log_candidate_failure("latency", url, &e.to_string()).await;
                }
            }
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_only_successful_hosts_count() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/up"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let urls = vec![
            format!("{}/up", server.uri()),
            format!("{}/down", server.uri()),
            "http://127.0.0.1:1".to_string(),
            format!("{}/up", server.uri()),
        ];
        let client = crate::client::HttpClientFactory::default().create().unwrap();
        let samples = measure_latency(&client, &urls, Duration::from_secs(2), None).await;

        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|ms| *ms >= 0.0));
    }

    #[tokio::test]
    async fn test_no_hosts_no_samples() {
        let client = crate::client::HttpClientFactory::default().create().unwrap();
        assert!(measure_latency(&client, &[], Duration::from_secs(1), None).await.is_empty());
    }
}
