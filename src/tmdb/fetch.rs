//! Resilient JSON fetch.
//!
//! A single GET, bounded by a per-attempt timeout, retried with exponential
//! backoff when the failure is a timeout or one of a small set of transient
//! network errors. Non-200 responses and malformed bodies are never retried.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("moodflix/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries on top of the first attempt.
    pub max_retries: u32,
    /// Upper bound for a single attempt, body included.
    pub timeout: Duration,
    /// Delay before the second attempt; doubles for every attempt after that.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_millis(15_000),
            initial_backoff: Duration::from_millis(1_500),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            timeout,
            initial_backoff: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after `attempt` failed, before attempt `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkErrorKind {
    ConnectionReset,
    ConnectionTimeout,
    HostNotFound,
    DnsTemporaryFailure,
    Other(String),
}

impl NetworkErrorKind {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NetworkErrorKind::Other(_))
    }

    pub fn code(&self) -> &str {
        match self {
            NetworkErrorKind::ConnectionReset => "ECONNRESET",
            NetworkErrorKind::ConnectionTimeout => "ETIMEDOUT",
            NetworkErrorKind::HostNotFound => "ENOTFOUND",
            NetworkErrorKind::DnsTemporaryFailure => "EAI_AGAIN",
            NetworkErrorKind::Other(code) => code.as_str(),
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("{kind}: {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },
}

impl TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout => true,
            TransportError::Network { kind, .. } => kind.is_retryable(),
        }
    }

    fn into_fetch_error(self, attempts: u32) -> FetchError {
        match self {
            TransportError::Timeout => FetchError::RequestTimeout { attempts },
            TransportError::Network { kind, message } => FetchError::Network { kind, message },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed with status code {status}")]
    UpstreamStatus { status: u16 },
    #[error("request timed out after {attempts} attempt(s)")]
    RequestTimeout { attempts: u32 },
    #[error("network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },
    #[error("failed to parse response body: {0}")]
    ResponseParse(#[from] serde_json::Error),
}

/// One outbound GET. Implementations return any status code as a response;
/// only transport-level failures are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = client_builder().build()?;
        Ok(Self { client })
    }
}

fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder().user_agent(USER_AGENT)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        if status != 200 {
            // Body is discarded for non-200 responses.
            return Ok(RawResponse {
                status,
                body: Vec::new(),
            });
        }

        let body = response.bytes().await.map_err(classify_reqwest_error)?;
        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() && !err.is_connect() {
        return TransportError::Timeout;
    }
    // The request URL carries the API key; keep it out of the message.
    let kind = classify_error_chain(&err);
    TransportError::Network {
        kind,
        message: err.without_url().to_string(),
    }
}

/// Walk an error and its sources looking for a recognisable network failure.
pub(crate) fn classify_error_chain(err: &(dyn std::error::Error + 'static)) -> NetworkErrorKind {
    let mut other = None;
    let mut current = Some(err);

    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if let Some(kind) = classify_io(io.kind()) {
                return kind;
            }
            other.get_or_insert_with(|| format!("{:?}", io.kind()));
        }
        if let Some(kind) = classify_message(&e.to_string()) {
            return kind;
        }
        current = e.source();
    }

    NetworkErrorKind::Other(other.unwrap_or_else(|| "UNKNOWN".to_string()))
}

fn classify_io(kind: std::io::ErrorKind) -> Option<NetworkErrorKind> {
    match kind {
        std::io::ErrorKind::ConnectionReset => Some(NetworkErrorKind::ConnectionReset),
        std::io::ErrorKind::TimedOut => Some(NetworkErrorKind::ConnectionTimeout),
        _ => None,
    }
}

fn classify_message(message: &str) -> Option<NetworkErrorKind> {
    let message = message.to_ascii_lowercase();

    // Resolver messages first: they can also mention "timed out".
    if message.contains("temporary failure in name resolution") || message.contains("eai_again") {
        Some(NetworkErrorKind::DnsTemporaryFailure)
    } else if message.contains("failed to lookup address")
        || message.contains("name or service not known")
        || message.contains("no such host")
        || message.contains("nodename nor servname")
    {
        Some(NetworkErrorKind::HostNotFound)
    } else if message.contains("connection reset") {
        Some(NetworkErrorKind::ConnectionReset)
    } else if message.contains("timed out") {
        Some(NetworkErrorKind::ConnectionTimeout)
    } else {
        None
    }
}

/// Hide credentials before a URL reaches the logs.
pub(crate) fn redact_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let query: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some(("api_key", _)) => "api_key=***".to_string(),
            _ => pair.to_string(),
        })
        .collect();
    format!("{}?{}", base, query.join("&"))
}

pub struct ResilientFetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt: u32 = 1;

        loop {
            debug!(url = %redact_url(url), attempt, max_attempts, "Fetching JSON");

            let failure =
                match tokio::time::timeout(self.policy.timeout, self.transport.get(url)).await {
                    Ok(Ok(response)) => return parse_response(response, attempt),
                    Ok(Err(e)) => e,
                    Err(_) => TransportError::Timeout,
                };

            if !failure.is_retryable() || attempt > self.policy.max_retries {
                warn!(
                    url = %redact_url(url),
                    attempt,
                    error = %failure,
                    "Giving up"
                );
                return Err(failure.into_fetch_error(attempt));
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                url = %redact_url(url),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn parse_response(response: RawResponse, attempt: u32) -> Result<Value, FetchError> {
    debug!(status = response.status, attempt, "Upstream responded");
    if response.status != 200 {
        return Err(FetchError::UpstreamStatus {
            status: response.status,
        });
    }
    Ok(serde_json::from_slice(&response.body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ScriptedTransport, Step};
    use serde_json::json;

    fn fetcher(transport: Arc<ScriptedTransport>) -> ResilientFetcher {
        ResilientFetcher::new(transport, RetryPolicy::default())
    }

    fn network(kind: NetworkErrorKind) -> Step {
        Step::Fail(TransportError::Network {
            kind,
            message: "boom".to_string(),
        })
    }

    fn gaps(transport: &ScriptedTransport) -> Vec<Duration> {
        let times = transport.call_times();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    fn assert_close(actual: Duration, expected: Duration) {
        let diff = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            diff <= Duration::from_millis(50),
            "expected ~{:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1500));
        assert_eq!(policy.backoff(2), Duration::from_millis(3000));
        assert_eq!(policy.backoff(3), Duration::from_millis(6000));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_body_unchanged() {
        let body = json!({"page": 1, "results": [{"id": 550, "title": "Fight Club"}]});
        let transport = ScriptedTransport::new(vec![Step::Respond(200, body.to_string())]);

        let value = fetcher(transport.clone()).fetch_json("https://x/movie").await.unwrap();

        assert_eq!(value, body);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_200_is_not_retried() {
        for status in [404, 429, 500, 503] {
            let transport = ScriptedTransport::new(vec![Step::Respond(status, String::new())]);

            let err = fetcher(transport.clone()).fetch_json("https://x/").await.unwrap_err();

            assert!(matches!(err, FetchError::UpstreamStatus { status: s } if s == status));
            assert_eq!(transport.calls(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_json_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Step::Respond(200, "<html>".to_string())]);

        let err = fetcher(transport.clone()).fetch_json("https://x/").await.unwrap_err();

        assert!(matches!(err, FetchError::ResponseParse(_)));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_timeouts_then_success() {
        let transport = ScriptedTransport::new(vec![
            Step::Hang,
            Step::Hang,
            Step::Hang,
            Step::Respond(200, r#"{"ok":true}"#.to_string()),
        ]);

        let value = fetcher(transport.clone()).fetch_json("https://x/").await.unwrap();

        assert_eq!(value, json!({"ok": true}));
        assert_eq!(transport.calls(), 4);

        // Each gap is one full timeout plus the backoff for that attempt.
        let timeout = RetryPolicy::default().timeout;
        let gaps = gaps(&transport);
        assert_close(gaps[0], timeout + Duration::from_millis(1500));
        assert_close(gaps[1], timeout + Duration::from_millis(3000));
        assert_close(gaps[2], timeout + Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_time_out() {
        let transport = ScriptedTransport::new((0..4).map(|_| Step::Hang).collect());

        let err = fetcher(transport.clone()).fetch_json("https://x/").await.unwrap_err();

        assert!(matches!(err, FetchError::RequestTimeout { attempts: 4 }));
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_timeout_counts_as_timeout() {
        let transport = ScriptedTransport::new(vec![
            Step::Fail(TransportError::Timeout),
            Step::Respond(200, "[]".to_string()),
        ]);

        let value = fetcher(transport.clone()).fetch_json("https://x/").await.unwrap();

        assert_eq!(value, json!([]));
        assert_close(gaps(&transport)[0], Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_network_errors_follow_backoff() {
        let kinds = [
            NetworkErrorKind::ConnectionReset,
            NetworkErrorKind::ConnectionTimeout,
            NetworkErrorKind::HostNotFound,
            NetworkErrorKind::DnsTemporaryFailure,
        ];
        for kind in kinds {
            let transport = ScriptedTransport::new(vec![
                network(kind.clone()),
                network(kind.clone()),
                Step::Respond(200, "{}".to_string()),
            ]);

            fetcher(transport.clone()).fetch_json("https://x/").await.unwrap();

            assert_eq!(transport.calls(), 3, "{}", kind);
            let gaps = gaps(&transport);
            assert_close(gaps[0], Duration::from_millis(1500));
            assert_close(gaps[1], Duration::from_millis(3000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_network_error_exhausts_budget() {
        let transport = ScriptedTransport::new(vec![
            network(NetworkErrorKind::HostNotFound),
            network(NetworkErrorKind::HostNotFound),
            network(NetworkErrorKind::HostNotFound),
            network(NetworkErrorKind::HostNotFound),
        ]);

        let err = fetcher(transport.clone()).fetch_json("https://x/").await.unwrap_err();

        assert!(matches!(
            err,
            FetchError::Network { kind: NetworkErrorKind::HostNotFound, .. }
        ));
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_network_error_fails_immediately() {
        let transport = ScriptedTransport::new(vec![network(NetworkErrorKind::Other(
            "ConnectionRefused".to_string(),
        ))]);

        let err = fetcher(transport.clone()).fetch_json("https://x/").await.unwrap_err();

        match err {
            FetchError::Network { kind, .. } => assert_eq!(kind.code(), "ConnectionRefused"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invocations_are_independent() {
        let transport = ScriptedTransport::new(vec![
            Step::Respond(200, r#"{"n":1}"#.to_string()),
            Step::Respond(200, r#"{"n":2}"#.to_string()),
        ]);
        let fetcher = fetcher(transport.clone());

        let (a, b) = tokio::join!(
            fetcher.fetch_json("https://x/same"),
            fetcher.fetch_json("https://x/same")
        );

        let mut seen = vec![a.unwrap()["n"].as_i64(), b.unwrap()["n"].as_i64()];
        seen.sort();
        assert_eq!(seen, vec![Some(1), Some(2)]);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_policy() {
        let transport = ScriptedTransport::new(vec![Step::Hang]);
        let fetcher = ResilientFetcher::new(
            transport.clone(),
            RetryPolicy::no_retry(Duration::from_secs(15)),
        );

        let err = fetcher.fetch_json("https://x/").await.unwrap_err();

        assert!(matches!(err, FetchError::RequestTimeout { attempts: 1 }));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_classify_io_errors() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert_eq!(classify_error_chain(&reset), NetworkErrorKind::ConnectionReset);

        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect");
        assert_eq!(classify_error_chain(&timed_out), NetworkErrorKind::ConnectionTimeout);

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(
            classify_error_chain(&refused),
            NetworkErrorKind::Other("ConnectionRefused".to_string())
        );
    }

    #[test]
    fn test_classify_resolver_messages() {
        let temporary = std::io::Error::new(
            std::io::ErrorKind::Other,
            "failed to lookup address information: Temporary failure in name resolution",
        );
        assert_eq!(
            classify_error_chain(&temporary),
            NetworkErrorKind::DnsTemporaryFailure
        );

        let unknown = std::io::Error::new(
            std::io::ErrorKind::Other,
            "failed to lookup address information: Name or service not known",
        );
        assert_eq!(classify_error_chain(&unknown), NetworkErrorKind::HostNotFound);
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://x/discover?api_key=secret&sort_by=popularity.desc"),
            "https://x/discover?api_key=***&sort_by=popularity.desc"
        );
        assert_eq!(redact_url("https://x/health"), "https://x/health");
    }

    mod reqwest_transport {
        use super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        fn transport() -> Arc<ReqwestTransport> {
            let client = client_builder().no_proxy().build().unwrap();
            Arc::new(ReqwestTransport { client })
        }

        /// Address of a local port that refuses connections.
        async fn closed_port() -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            format!("http://{}", addr)
        }

        /// Answer one request per connection with the given status and body.
        async fn serve(replies: Vec<(u16, &'static str)>) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                for (status, body) in replies {
                    let (mut socket, _) = listener.accept().await.unwrap();
                    let mut request = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        let n = socket.read(&mut chunk).await.unwrap();
                        if n == 0 {
                            break;
                        }
                        request.extend_from_slice(&chunk[..n]);
                    }
                    let reply = format!(
                        "HTTP/1.1 {} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    socket.write_all(reply.as_bytes()).await.unwrap();
                    let _ = socket.shutdown().await;
                }
            });
            format!("http://{}", addr)
        }

        #[tokio::test]
        async fn test_refused_connection_is_not_retried() {
            let base = closed_port().await;
            let policy = RetryPolicy {
                max_retries: 3,
                timeout: Duration::from_secs(5),
                initial_backoff: Duration::from_secs(60),
            };
            let fetcher = ResilientFetcher::new(transport(), policy);
            let url = format!("{}/3/movie/popular?api_key=SUPERSECRET", base);

            // A retry would sleep for a minute.
            let err = tokio::time::timeout(Duration::from_secs(10), fetcher.fetch_json(&url))
                .await
                .unwrap()
                .unwrap_err();

            match &err {
                FetchError::Network { kind, .. } => {
                    assert_eq!(kind, &NetworkErrorKind::Other("ConnectionRefused".to_string()))
                }
                other => panic!("unexpected error: {:?}", other),
            }
            assert!(!err.to_string().contains("SUPERSECRET"), "{}", err);
        }

        #[tokio::test]
        async fn test_error_message_hides_api_key() {
            let base = closed_port().await;
            let url = format!("{}/3/search/movie?api_key=SUPERSECRET&query=x", base);

            let err = transport().get(&url).await.unwrap_err();

            assert!(!err.to_string().contains("SUPERSECRET"), "{}", err);
            assert!(!err.to_string().contains("api_key"), "{}", err);
        }

        #[tokio::test]
        async fn test_status_and_body() {
            let body = r#"{"page":1,"results":[{"id":550,"title":"Fight Club"}]}"#;
            let base = serve(vec![
                (404, r#"{"status_code":34}"#),
                (404, r#"{"status_code":34}"#),
                (200, body),
            ])
            .await;
            let transport = transport();
            let url = format!("{}/3/movie/550?api_key=k", base);

            let raw = transport.get(&url).await.unwrap();
            assert_eq!(raw.status, 404);
            assert!(raw.body.is_empty());

            let fetcher = ResilientFetcher::new(transport, RetryPolicy::default());
            let err = fetcher.fetch_json(&url).await.unwrap_err();
            assert!(matches!(err, FetchError::UpstreamStatus { status: 404 }));

            let value = fetcher.fetch_json(&url).await.unwrap();
            assert_eq!(value, serde_json::from_str::<Value>(body).unwrap());
        }

        #[tokio::test]
        async fn test_unknown_host() {
            let url = "http://moodflix-test.invalid/3/movie/popular?api_key=SUPERSECRET";

            let err = transport().get(url).await.unwrap_err();

            // Sandboxes without a resolver report a temporary failure instead.
            match &err {
                TransportError::Network { kind, message } => {
                    assert!(
                        matches!(
                            kind,
                            NetworkErrorKind::HostNotFound | NetworkErrorKind::DnsTemporaryFailure
                        ),
                        "{:?}",
                        kind
                    );
                    assert!(!message.contains("SUPERSECRET"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }
}
