use bytes::{Bytes, BytesMut};
use http_body_util::{BodyExt, Empty};
use hyper::{StatusCode, Uri};
#[cfg(not(feature = "rustls-platform-verifier"))]
use hyper_rustls::ConfigBuilderExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use once_cell::sync::Lazy;
use rustls::ClientConfig;
#[cfg(feature = "rustls-platform-verifier")]
use rustls_platform_verifier::BuilderVerifierExt;
use std::{collections::HashMap, fmt, time::Duration};
use thiserror::Error;
use tracing::debug;

#[derive(Debug)]
pub struct ResponseData {
    pub status: u16,
    pub body: Option<Bytes>,
}

impl fmt::Display for ResponseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response status: {}, body: {}",
            self.status,
            self.body.as_ref().map_or_else(
                || "".to_string(),
                |body| String::from_utf8_lossy(body).to_string(),
            )
        )
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid request: {0}")]
    Request(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("tls configuration failed: {0}")]
    Tls(String),
}

impl HttpError {
    /// Only timeouts and connection failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HttpError::Timeout(_) | HttpError::Connect(_))
    }
}

/// Per-request timeout and retry budget.
///
/// Attempt `n` waits `t(n-1) + t(n-1) * backoff_multiplier`, starting from
/// `initial_timeout`, for at most `max_retries + 1` attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_timeout: Duration,
    pub max_retries: u32,
    pub backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_timeout: Duration::from_millis(2500),
            max_retries: 1,
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(initial_timeout: Duration, max_retries: u32, backoff_multiplier: f32) -> Self {
        Self {
            initial_timeout,
            max_retries,
            backoff_multiplier,
        }
    }

    /// Saturates at [`Duration::MAX`].
    pub fn next_timeout(&self, current: Duration) -> Duration {
        let growth = current.as_secs_f32() * self.backoff_multiplier.max(0.0);
        current.saturating_add(Duration::try_from_secs_f32(growth).unwrap_or(Duration::MAX))
    }

    /// Timeouts of every attempt this policy allows, in order.
    pub fn attempt_timeouts(&self) -> Vec<Duration> {
        let mut timeouts = Vec::with_capacity(self.max_retries as usize + 1);
        let mut timeout = self.initial_timeout;
        timeouts.push(timeout);
        for _ in 0..self.max_retries {
            timeout = self.next_timeout(timeout);
            timeouts.push(timeout);
        }
        timeouts
    }
}

/// GET `url`, retrying timeouts and connection failures according to `policy`.
pub async fn get(
    url: Uri,
    header_map: &HashMap<String, String>,
    policy: &RetryPolicy,
) -> Result<ResponseData, HttpError> {
    let mut timeout = policy.initial_timeout;
    let mut attempt = 0;
    loop {
        let err = match tokio::time::timeout(timeout, get_once(url.clone(), header_map)).await {
            Ok(Ok(rsp)) => return Ok(rsp),
            Ok(Err(e)) => e,
            Err(_) => HttpError::Timeout(timeout),
        };
        if !err.is_retryable() || attempt >= policy.max_retries {
            return Err(err);
        }
        attempt += 1;
        timeout = policy.next_timeout(timeout);
        debug!(%url, attempt, ?timeout, error = %err, "retrying request");
    }
}

/// Single GET attempt without any timeout of its own.
pub async fn get_once(
    url: Uri,
    header_map: &HashMap<String, String>,
) -> Result<ResponseData, HttpError> {
    if url.scheme_str() == Some("https") {
        let client = Client::builder(TokioExecutor::new()).build(https_config()?);
        send(&client, url, header_map).await
    } else {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        send(&client, url, header_map).await
    }
}

async fn send<C>(
    client: &Client<C, Empty<Bytes>>,
    url: Uri,
    header_map: &HashMap<String, String>,
) -> Result<ResponseData, HttpError>
where
    C: hyper_util::client::legacy::connect::Connect + Clone + Send + Sync + 'static,
{
    let mut req = hyper::Request::builder().method("GET").uri(url);
    for (key, value) in header_map {
        req = req.header(key, value);
    }
    let req = req
        .body(Empty::<Bytes>::new())
        .map_err(|e| HttpError::Request(e.to_string()))?;

    let mut res = client.request(req).await.map_err(|e| {
        if e.is_connect() {
            HttpError::Connect(e.to_string())
        } else {
            HttpError::Transport(e.to_string())
        }
    })?;
    let status = res.status();
    let mut body = BytesMut::new();
    while let Some(next) = res.frame().await {
        let frame = next.map_err(|e| HttpError::Body(e.to_string()))?;
        if let Some(chunk) = frame.data_ref() {
            body.extend_from_slice(chunk);
        }
    }
    Ok(ResponseData {
        status: status.as_u16(),
        body: Some(body.freeze()),
    })
}

static PROVIDER: Lazy<std::sync::Arc<rustls::crypto::CryptoProvider>> =
    Lazy::new(|| std::sync::Arc::new(rustls::crypto::ring::default_provider()));

fn https_config() -> Result<hyper_rustls::HttpsConnector<HttpConnector>, HttpError> {
    let provider = PROVIDER.clone();
    let tls: rustls::ClientConfig;
    #[cfg(feature = "rustls-platform-verifier")]
    {
        tls = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| HttpError::Tls(e.to_string()))?
            .with_platform_verifier()
            .map_err(|e| HttpError::Tls(e.to_string()))?
            .with_no_client_auth();
    }
    #[cfg(all(feature = "webpki-roots", not(feature = "rustls-platform-verifier")))]
    {
        tls = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| HttpError::Tls(e.to_string()))?
            .with_webpki_roots()
            .with_no_client_auth();
    }
    #[cfg(all(
        feature = "native-tokio",
        not(feature = "webpki-roots"),
        not(feature = "rustls-platform-verifier")
    ))]
    {
        tls = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| HttpError::Tls(e.to_string()))?
            .with_native_roots()
            .map_err(|e| HttpError::Tls(e.to_string()))?
            .with_no_client_auth();
    }
    #[cfg(all(
        not(feature = "native-tokio"),
        not(feature = "webpki-roots"),
        not(feature = "rustls-platform-verifier")
    ))]
    {
        compile_error!("No TLS backend enabled");
    }
    Ok(hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build())
}

pub fn http_status_is_ok(status: u16) -> bool {
    if let Ok(status) = StatusCode::from_u16(status) {
        status.is_success()
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_timeouts_default_multiplier() {
        let policy = RetryPolicy::new(Duration::from_millis(5000), 3, 1.0);
        assert_eq!(
            policy.attempt_timeouts(),
            vec![
                Duration::from_millis(5000),
                Duration::from_millis(10000),
                Duration::from_millis(20000),
                Duration::from_millis(40000),
            ]
        );
    }

    #[test]
    fn test_attempt_timeouts_no_retries() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 0, 1.0);
        assert_eq!(policy.attempt_timeouts(), vec![Duration::from_millis(100)]);
    }

    #[test]
    fn test_negative_multiplier_keeps_timeout() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 2, -3.0);
        assert_eq!(
            policy.attempt_timeouts(),
            vec![Duration::from_millis(100); 3]
        );
    }

    #[test]
    fn test_timeout_growth_saturates() {
        let policy = RetryPolicy::new(Duration::from_millis(5000), 100, 1.0);
        assert_eq!(policy.next_timeout(Duration::MAX), Duration::MAX);
        let timeouts = policy.attempt_timeouts();
        assert_eq!(timeouts.len(), 101);
        assert_eq!(timeouts[100], Duration::MAX);
        assert!(timeouts.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_http_status_is_ok() {
        assert!(http_status_is_ok(200));
        assert!(http_status_is_ok(204));
        assert!(!http_status_is_ok(301));
        assert!(!http_status_is_ok(404));
        assert!(!http_status_is_ok(503));
        assert!(!http_status_is_ok(1000));
    }

    #[tokio::test]
    async fn test_http_get() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/ota/device")
            .match_header("user-agent", "test-agent")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let url = format!("{}/ota/device", server.url()).parse().unwrap();
        let headers = HashMap::from([("User-Agent".to_string(), "test-agent".to_string())]);
        let rsp = get(url, &headers, &RetryPolicy::default()).await.unwrap();
        assert_eq!(rsp.status, 200);
        assert_eq!(rsp.body.unwrap().as_ref(), b"{}");
    }

    #[tokio::test]
    async fn test_status_error_is_returned_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/missing", server.url()).parse().unwrap();
        let policy = RetryPolicy::new(Duration::from_secs(5), 3, 1.0);
        let rsp = get(url, &HashMap::new(), &policy).await.unwrap();
        assert_eq!(rsp.status, 404);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_refused_is_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/ota", addr).parse().unwrap();
        let policy = RetryPolicy::new(Duration::from_secs(2), 2, 1.0);
        let err = get(url, &HashMap::new(), &policy).await.unwrap_err();
        assert!(matches!(err, HttpError::Connect(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_silent_server_times_out_after_all_retries() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        let server = tokio::spawn(async move {
            // keep every connection open without ever answering
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                open.push(socket);
            }
        });

        let url = format!("http://{}/ota/device", addr).parse().unwrap();
        let policy = RetryPolicy::new(Duration::from_millis(50), 3, 1.0);
        let err = get(url, &HashMap::new(), &policy).await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout(t) if t == Duration::from_millis(400)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 4);
        server.abort();
    }
}
