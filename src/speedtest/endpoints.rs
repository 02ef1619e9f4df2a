//! Speed-test endpoint catalogue and availability store

use crate::client::timed_head;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub const AUTO_URL: &str = "auto";
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// (name, url, location, provider)
const CATALOGUE: &[(&str, &str, &str, &str)] = &[
    ("Automatic (Recommended)", AUTO_URL, "Multiple Regions", "Various"),
    ("Cloudflare (Global CDN)", "https://www.cloudflare.com", "Global CDN", "Cloudflare"),
    ("Google (Global CDN)", "https://www.google.com", "Global CDN", "Google"),
    ("Microsoft (Global CDN)", "https://www.microsoft.com", "Global CDN", "Microsoft"),
    ("AWS CloudFront (Global CDN)", "https://d1.awsstatic.com", "Global CDN", "Amazon AWS"),
    ("Fast.com (Netflix CDN)", "https://fast.com", "Global CDN", "Netflix"),
    ("Local Connection", "https://127.0.0.1", "Local Network", "Your Router"),
];

pub const OFFLINE_WARNING: &str = "⚠️ No internet connection detected - All servers unavailable";

/// Whether `name` is the display name (or URL) of a catalogue entry
pub fn is_known_endpoint(name: &str) -> bool {
    let name = name.trim();
    CATALOGUE
        .iter()
        .any(|(n, url, _, _)| n.eq_ignore_ascii_case(name) || *url == name)
}

/// The default catalogue in display order
pub fn catalogue() -> Vec<EndpointCandidate> {
    CATALOGUE
        .iter()
        .map(|(name, url, location, provider)| EndpointCandidate::new(*name, *url, *location, *provider))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    #[default]
    Unknown,
    Available,
    Unavailable,
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndpointStatus::Unknown => "unknown",
            EndpointStatus::Available => "available",
            EndpointStatus::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCandidate {
    pub name: String,
    pub url: String,
    pub location: String,
    pub provider: String,
    pub status: EndpointStatus,
}

impl EndpointCandidate {
    pub fn new(name: impl Into<String>, url: impl Into<String>, location: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            location: location.into(),
            provider: provider.into(),
            status: EndpointStatus::Unknown,
        }
    }

    pub fn is_auto(&self) -> bool {
        self.url == AUTO_URL
    }

    pub fn is_loopback(&self) -> bool {
        host_of(&self.url).is_some_and(|host| host.split(':').next() == Some(LOOPBACK_HOST))
    }

    /// Automatic selection and the loopback entry are never probed
    pub fn is_remote(&self) -> bool {
        !self.is_auto() && !self.is_loopback()
    }
}

/// `host[:port]` of a URL, or the input itself when it carries no scheme
fn host_of(url: &str) -> Option<String> {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str()?;
            Some(match parsed.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            })
        }
        Err(_) => {
            let trimmed = url.trim().trim_end_matches('/');
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
    }
}

/// Probe one endpoint: HEAD over HTTPS, then plain HTTP; any status below
/// 400 within `timeout` counts as available.
pub async fn check_availability(client: &reqwest::Client, candidate: &EndpointCandidate, timeout: Duration) -> EndpointStatus {
    if !candidate.is_remote() {
        return EndpointStatus::Available;
    }
    let Some(host) = host_of(&candidate.url) else {
        return EndpointStatus::Unavailable;
    };

    for scheme in ["https", "http"] {
        let url = format!("{}://{}", scheme, host);
        if let Ok(response) = timed_head(client, &url, timeout).await {
            if response.is_ok() {
                return EndpointStatus::Available;
            }
        }
    }
    EndpointStatus::Unavailable
}

/// Ordered endpoint table shared between the speed test and whoever renders it.
///
/// Only availability checks mutate statuses.
#[derive(Debug, Clone)]
pub struct EndpointStore {
    endpoints: Arc<RwLock<Vec<EndpointCandidate>>>,
    client: reqwest::Client,
    timeout: Duration,
}

impl EndpointStore {
    /// Store holding the default catalogue
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoints(client, catalogue())
    }

    pub fn with_endpoints(client: reqwest::Client, endpoints: Vec<EndpointCandidate>) -> Self {
        Self {
            endpoints: Arc::new(RwLock::new(endpoints)),
            client,
            timeout: crate::defaults::AVAILABILITY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn list(&self) -> Vec<EndpointCandidate> {
        self.endpoints.read().await.clone()
    }

    /// Look up by display name (case-insensitive) or URL
    pub async fn get(&self, name: &str) -> Option<EndpointCandidate> {
        let name = name.trim();
        self.endpoints
            .read()
            .await
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name) || e.url == name)
            .cloned()
    }

    /// Returns false when no endpoint has that name
    pub async fn set_status(&self, name: &str, status: EndpointStatus) -> bool {
        let mut endpoints = self.endpoints.write().await;
        match endpoints.iter_mut().find(|e| e.name == name) {
            Some(endpoint) => {
                endpoint.status = status;
                true
            }
            None => false,
        }
    }

    /// Probe one endpoint and record the result
    pub async fn check(&self, name: &str) -> Option<EndpointStatus> {
        let candidate = self.get(name).await?;
        let status = check_availability(&self.client, &candidate, self.timeout).await;
        self.set_status(&candidate.name, status).await;
        Some(status)
    }

    /// Probe every endpoint concurrently and wait for all results
    pub async fn refresh_all(&self) {
        let names: Vec<String> = self.list().await.into_iter().map(|e| e.name).collect();
        futures::future::join_all(names.iter().map(|name| self.check(name))).await;
    }

    /// Start a refresh in the background without waiting for it
    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move { store.refresh_all().await })
    }

    /// True when every probed endpoint is down (automatic and loopback
    /// entries excluded). Unchecked endpoints keep this false.
    pub async fn all_remote_unavailable(&self) -> bool {
        let endpoints = self.endpoints.read().await;
        let mut remote = endpoints.iter().filter(|e| e.is_remote()).peekable();
        remote.peek().is_some() && remote.all(|e| e.status == EndpointStatus::Unavailable)
    }

    /// URL to favour for a selection, `None` for automatic or unknown names
    pub async fn resolve_selection(&self, name: &str) -> Option<String> {
        self.get(name).await.filter(|e| !e.is_auto()).map(|e| e.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> reqwest::Client {
        crate::client::HttpClientFactory::default().create().unwrap()
    }

    #[test]
    fn test_catalogue_contents() {
        let endpoints = catalogue();
        assert_eq!(endpoints.len(), 7);
        assert!(endpoints[0].is_auto());
        assert!(endpoints.iter().all(|e| e.status == EndpointStatus::Unknown));
        assert!(endpoints.last().unwrap().is_loopback());
        assert_eq!(endpoints.iter().filter(|e| e.is_remote()).count(), 5);
    }

    #[test]
    fn test_known_endpoint_names() {
        assert!(is_known_endpoint("Automatic (Recommended)"));
        assert!(is_known_endpoint("cloudflare (global cdn)"));
        assert!(is_known_endpoint("https://fast.com"));
        assert!(!is_known_endpoint("My Server"));
    }

    #[test]
    fn test_host_extraction() {
        assert_eq!(host_of("https://www.google.com"), Some("www.google.com".to_string()));
        assert_eq!(host_of("http://localhost:8080/x"), Some("localhost:8080".to_string()));
        assert_eq!(host_of("example.org/"), Some("example.org".to_string()));
        assert_eq!(host_of(""), None);
    }

    #[tokio::test]
    async fn test_auto_and_loopback_always_available() {
        let client = client();
        let auto = EndpointCandidate::new("a", AUTO_URL, "", "");
        let local = EndpointCandidate::new("l", "https://127.0.0.1", "", "");
        assert_eq!(check_availability(&client, &auto, Duration::from_millis(1)).await, EndpointStatus::Available);
        assert_eq!(check_availability(&client, &local, Duration::from_millis(1)).await, EndpointStatus::Available);
    }

    #[tokio::test]
    async fn test_http_fallback_marks_available() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        // Plain HTTP mock: the HTTPS attempt fails, the HTTP one answers
        let url = format!("http://localhost:{}", server.address().port());
        let candidate = EndpointCandidate::new("mock", url, "Test", "Test");
        let status = check_availability(&client(), &candidate, Duration::from_secs(1)).await;
        assert_eq!(status, EndpointStatus::Available);
    }

    #[tokio::test]
    async fn test_error_status_marks_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = format!("http://localhost:{}", server.address().port());
        let candidate = EndpointCandidate::new("mock", url, "Test", "Test");
        let status = check_availability(&client(), &candidate, Duration::from_secs(1)).await;
        assert_eq!(status, EndpointStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_store_updates_and_selection() {
        let store = EndpointStore::new(client());

        assert!(store.set_status("Google (Global CDN)", EndpointStatus::Available).await);
        assert!(!store.set_status("Nope", EndpointStatus::Available).await);
        assert_eq!(store.get("Google (Global CDN)").await.unwrap().status, EndpointStatus::Available);

        assert_eq!(store.resolve_selection("Automatic (Recommended)").await, None);
        assert_eq!(store.resolve_selection("Nope").await, None);
        assert_eq!(
            store.resolve_selection("Fast.com (Netflix CDN)").await,
            Some("https://fast.com".to_string())
        );
    }

    #[tokio::test]
    async fn test_all_remote_unavailable() {
        let store = EndpointStore::new(client());
        assert!(!store.all_remote_unavailable().await);

        for endpoint in store.list().await.into_iter().filter(|e| e.is_remote()) {
            store.set_status(&endpoint.name, EndpointStatus::Unavailable).await;
        }
        assert!(store.all_remote_unavailable().await);

        store.set_status("Google (Global CDN)", EndpointStatus::Available).await;
        assert!(!store.all_remote_unavailable().await);
    }

    #[tokio::test]
    async fn test_refresh_all_against_dead_hosts() {
        let endpoints = vec![
            EndpointCandidate::new("Automatic", AUTO_URL, "", ""),
            EndpointCandidate::new("Dead A", "http://127.0.0.2:1", "", ""),
            EndpointCandidate::new("Dead B", "http://localhost:1", "", ""),
        ];
        let store = EndpointStore::with_endpoints(client(), endpoints).with_timeout(Duration::from_millis(500));

        store.spawn_refresh().await.unwrap();

        let statuses: Vec<EndpointStatus> = store.list().await.into_iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![EndpointStatus::Available, EndpointStatus::Unavailable, EndpointStatus::Unavailable]
        );
        assert!(store.all_remote_unavailable().await);
    }
}
