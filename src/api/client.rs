use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::api_types::{error_from_body, ApiResponse, Envelope};
use super::error::{ErrorKind, NormalizedError};
use super::params::QueryParams;
use crate::config::ApiConfig;
use crate::sync::rate_limit::{retry_after, RateLimitInfo};
use crate::sync::{ConnectivityMonitor, RateLimitTracker};

pub const API_KEY_HEADER: &str = "X-API-Key";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-request options
#[derive(Debug, Clone)]
pub struct RequestOptions {
  pub method: Method,
  pub body: Option<serde_json::Value>,
  pub headers: Vec<(String, String)>,
  pub query: QueryParams,
  pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
  fn default() -> Self {
    Self {
      method: Method::GET,
      body: None,
      headers: Vec::new(),
      query: QueryParams::new(),
      timeout: None,
    }
  }
}

impl RequestOptions {
  pub fn get() -> Self {
    Self::default()
  }

  pub fn with_query(mut self, query: QueryParams) -> Self {
    self.query = query;
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }
}

/// HTTP client for the news API.
///
/// Unwraps the response envelope and turns every failure into a
/// [`NormalizedError`]. Also feeds quota headers to the rate-limit tracker
/// and reachability to the connectivity monitor when those are attached.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  api_key: Option<String>,
  rate_limits: Option<RateLimitTracker>,
  connectivity: Option<ConnectivityMonitor>,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let mut base = config.base_url.trim().to_string();
    if !base.ends_with('/') {
      base.push('/');
    }
    let base_url =
      Url::parse(&base).map_err(|e| eyre!("Invalid API base URL {}: {}", config.base_url, e))?;

    let http = reqwest::Client::builder()
      .connect_timeout(CONNECT_TIMEOUT)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      api_key: config.api_key.clone().filter(|k| !k.is_empty()),
      rate_limits: None,
      connectivity: None,
    })
  }

  pub fn with_rate_limits(mut self, tracker: RateLimitTracker) -> Self {
    self.rate_limits = Some(tracker);
    self
  }

  pub fn with_connectivity(mut self, monitor: ConnectivityMonitor) -> Self {
    self.connectivity = Some(monitor);
    self
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Resolve a relative path (leading slash optional) against the base URL.
  pub fn url_for(&self, path: &str, query: &QueryParams) -> Result<Url, NormalizedError> {
    let mut url = self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| NormalizedError::new(ErrorKind::InvalidRequest, format!("bad path {}: {}", path, e)))?;

    if !query.is_empty() {
      url.set_query(Some(&query.to_query_string()));
    }
    Ok(url)
  }

  /// Issue a request and decode the envelope's `data` as `T`.
  pub async fn request<T: DeserializeOwned>(
    &self,
    path: &str,
    options: RequestOptions,
  ) -> Result<ApiResponse<T>, NormalizedError> {
    let url = self.url_for(path, &options.query)?;

    let mut request = self
      .http
      .request(options.method.clone(), url)
      .header(CONTENT_TYPE, "application/json")
      .header(ACCEPT, "application/json");

    if let Some(key) = &self.api_key {
      request = request.header(API_KEY_HEADER, key);
    }
    for (name, value) in &options.headers {
      request = request.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &options.body {
      let bytes = serde_json::to_vec(body).map_err(|e| {
        NormalizedError::new(ErrorKind::InvalidRequest, format!("body serialization failed: {}", e))
      })?;
      request = request.body(bytes);
    }
    if let Some(timeout) = options.timeout {
      request = request.timeout(timeout);
    }

    let response = request.send().await.map_err(|e| self.transport_error(path, e))?;
    self.report_reachable(true);

    let status = response.status();
    self.observe_quota(status, response.headers());

    let body = response
      .bytes()
      .await
      .map_err(|e| self.transport_error(path, e))?;

    debug!(
      method = %options.method,
      path,
      status = status.as_u16(),
      bytes = body.len(),
      "api response"
    );

    if !status.is_success() {
      let mut err = error_from_body(status.as_u16(), &body);
      if status == StatusCode::TOO_MANY_REQUESTS {
        err.kind = ErrorKind::RateLimited;
      }
      return Err(err);
    }

    let envelope: Envelope<T> = serde_json::from_slice(&body).map_err(|e| {
      NormalizedError::decode(format!("{}: {}", path, e)).with_status(status.as_u16())
    })?;

    envelope.into_response()
  }

  pub async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    query: QueryParams,
    timeout: Duration,
  ) -> Result<ApiResponse<T>, NormalizedError> {
    self
      .request(
        path,
        RequestOptions::get().with_query(query).with_timeout(timeout),
      )
      .await
  }

  /// Reachability check against `/health`. Any HTTP response counts as
  /// reachable, even an error status.
  pub async fn probe(&self) -> bool {
    let result = self
      .get::<serde_json::Value>("health", QueryParams::new(), PROBE_TIMEOUT)
      .await;

    match result {
      Ok(_) => true,
      Err(err) => !matches!(err.kind, ErrorKind::Network | ErrorKind::Timeout),
    }
  }

  fn transport_error(&self, path: &str, err: reqwest::Error) -> NormalizedError {
    if err.is_timeout() {
      warn!(path, "request timed out");
      return NormalizedError::timeout(format!("{} timed out", path));
    }

    if err.is_builder() {
      warn!(path, error = %err, "request could not be built");
      return NormalizedError::new(ErrorKind::InvalidRequest, err.to_string());
    }

    warn!(path, error = %err, "request failed");
    // Only failures to reach the server say anything about connectivity.
    if err.is_connect() || (err.is_request() && err.status().is_none()) {
      self.report_reachable(false);
    }
    NormalizedError::network(err.to_string())
  }

  fn report_reachable(&self, reachable: bool) {
    if let Some(monitor) = &self.connectivity {
      monitor.set_online(reachable);
    }
  }

  fn observe_quota(&self, status: StatusCode, headers: &HeaderMap) {
    let Some(tracker) = &self.rate_limits else {
      return;
    };

    let now = Utc::now();
    if let Some(info) = RateLimitInfo::from_headers(headers, now) {
      tracker.observe(info);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
      tracker.mark_exhausted(retry_after(headers, now));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sync::connectivity::DEFAULT_RECONNECT_GRACE;
  use serde::Deserialize;
  use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[derive(Debug, Deserialize, PartialEq)]
  struct Item {
    id: u32,
  }

  fn config(base_url: String, api_key: Option<&str>) -> ApiConfig {
    ApiConfig {
      base_url,
      api_key: api_key.map(str::to_string),
      ..ApiConfig::default()
    }
  }

  async fn client_for(server: &MockServer, api_key: Option<&str>) -> ApiClient {
    ApiClient::new(&config(format!("{}/api/v1", server.uri()), api_key)).unwrap()
  }

  fn envelope(data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
      "success": true,
      "data": data,
      "request_id": "req-1",
      "timestamp": "2024-03-01T12:00:00Z"
    })
  }

  #[tokio::test]
  async fn test_success_sends_headers_and_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/articles/7"))
      .and(header("x-api-key", "k-123"))
      .and(header("content-type", "application/json"))
      .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!({ "id": 7 }))))
      .mount(&server)
      .await;

    let client = client_for(&server, Some("k-123")).await;
    let response: ApiResponse<Item> = client
      .request("/articles/7", RequestOptions::get())
      .await
      .unwrap();

    assert_eq!(response.data, Item { id: 7 });
    assert_eq!(response.request_id, "req-1");
  }

  #[tokio::test]
  async fn test_query_drops_empty_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/articles"))
      .and(query_param("limit", "20"))
      .and(query_param_is_missing("source"))
      .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!([]))))
      .mount(&server)
      .await;

    let client = client_for(&server, None).await;
    let query = QueryParams::new()
      .with("limit", Some(20))
      .with("source", Some(""))
      .with::<String>("sentiment", None);

    let response: ApiResponse<Vec<Item>> = client
      .request("articles", RequestOptions::get().with_query(query))
      .await
      .unwrap();
    assert!(response.data.is_empty());
  }

  #[tokio::test]
  async fn test_structured_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/articles/99"))
      .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
        "success": false,
        "error": { "code": "NOT_FOUND", "message": "article 99 not found" },
        "request_id": "req-404",
        "timestamp": ""
      })))
      .mount(&server)
      .await;

    let client = client_for(&server, None).await;
    let err = client
      .request::<Item>("articles/99", RequestOptions::get())
      .await
      .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.message, "article 99 not found");
    assert_eq!(err.status, Some(404));
    assert_eq!(err.request_id.as_deref(), Some("req-404"));
  }

  #[tokio::test]
  async fn test_unparseable_error_body_falls_back_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
      .mount(&server)
      .await;

    let client = client_for(&server, None).await;
    let err = client
      .request::<Item>("sources", RequestOptions::get())
      .await
      .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Http(502));
    assert_eq!(err.message, "HTTP 502");
  }

  #[tokio::test]
  async fn test_success_false_with_200_is_application_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "success": false,
        "error": { "code": "MISSING_QUERY", "message": "q is required" },
        "request_id": "req-2",
        "timestamp": ""
      })))
      .mount(&server)
      .await;

    let client = client_for(&server, None).await;
    let err = client
      .request::<Vec<Item>>("articles/search", RequestOptions::get())
      .await
      .unwrap_err();
    assert_eq!(err.kind, ErrorKind::MissingQuery);
  }

  #[tokio::test]
  async fn test_schema_mismatch_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!({ "id": "seven" }))),
      )
      .mount(&server)
      .await;

    let client = client_for(&server, None).await;
    let err = client
      .request::<Item>("articles/7", RequestOptions::get())
      .await
      .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Decode);
  }

  #[tokio::test]
  async fn test_quota_headers_feed_tracker() {
    let server = MockServer::start().await;
    let reset = Utc::now().timestamp() + 45;
    Mock::given(method("GET"))
      .respond_with(
        ResponseTemplate::new(200)
          .insert_header("X-RateLimit-Limit", "100")
          .insert_header("X-RateLimit-Remaining", "0")
          .insert_header("X-RateLimit-Reset", reset.to_string().as_str())
          .set_body_json(envelope(serde_json::json!([]))),
      )
      .mount(&server)
      .await;

    let tracker = RateLimitTracker::new();
    let client = client_for(&server, None)
      .await
      .with_rate_limits(tracker.clone());
    client
      .request::<Vec<Item>>("articles", RequestOptions::get())
      .await
      .unwrap();

    let state = tracker.snapshot();
    assert_eq!(state.limit, 100);
    assert!(state.is_limited);
    assert!(tracker.check_manual().is_err());
  }

  #[tokio::test]
  async fn test_429_marks_tracker_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "20"))
      .mount(&server)
      .await;

    let tracker = RateLimitTracker::new();
    let client = client_for(&server, None)
      .await
      .with_rate_limits(tracker.clone());
    let err = client
      .request::<Item>("health", RequestOptions::get())
      .await
      .unwrap_err();

    assert_eq!(err.kind, ErrorKind::RateLimited);
    assert!(tracker.is_limited());
    assert!(tracker.reset_in() <= Duration::from_secs(20));
  }

  #[tokio::test]
  async fn test_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(envelope(serde_json::json!({ "id": 1 })))
          .set_delay(Duration::from_secs(2)),
      )
      .mount(&server)
      .await;

    let client = client_for(&server, None).await;
    let err = client
      .request::<Item>(
        "stocks/AAPL/quote",
        RequestOptions::get().with_timeout(Duration::from_millis(200)),
      )
      .await
      .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
  }

  #[tokio::test]
  async fn test_connection_refused_reports_offline() {
    let monitor = ConnectivityMonitor::new(DEFAULT_RECONNECT_GRACE);
    let client = ApiClient::new(&config("http://127.0.0.1:1/api/v1".to_string(), None))
      .unwrap()
      .with_connectivity(monitor.clone());

    let err = client
      .request::<Item>("health", RequestOptions::get())
      .await
      .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Network);
    assert!(!monitor.is_online());
    assert!(!client.probe().await);
  }

  #[tokio::test]
  async fn test_malformed_header_does_not_report_offline() {
    let server = MockServer::start().await;
    let monitor = ConnectivityMonitor::new(DEFAULT_RECONNECT_GRACE);
    let client = client_for(&server, None)
      .await
      .with_connectivity(monitor.clone());

    let mut options = RequestOptions::get();
    options
      .headers
      .push(("bad header".to_string(), "x".to_string()));
    let err = client
      .request::<Item>("health", options)
      .await
      .unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert!(monitor.is_online());
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(0));
  }

  #[tokio::test]
  async fn test_probe_counts_error_status_as_reachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/health"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;

    let client = client_for(&server, None).await;
    assert!(client.probe().await);
  }

  #[test]
  fn test_url_for_keeps_base_path() {
    let client = ApiClient::new(&config("http://localhost:8000/api/v1".to_string(), None)).unwrap();
    let url = client
      .url_for("/articles/search", &QueryParams::new().with("q", Some("fed rates")))
      .unwrap();
    assert_eq!(
      url.as_str(),
      "http://localhost:8000/api/v1/articles/search?q=fed+rates"
    );
  }
}
