//! The transport seam and the single-exchange executor.
//!
//! A [`Transport`] performs one HTTP exchange. [`ReqwestTransport`] is the
//! default implementation; anything else (a platform stack, a test double)
//! can be injected through [`ClientBuilder::transport`](crate::ClientBuilder::transport).

use crate::request::{Body, CachePolicy, OutboundRequest};
use crate::{BoxError, Error, Response, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONTENT_LENGTH};
use http::{HeaderMap, HeaderValue, StatusCode};
use std::error::Error as StdError;
use std::fmt;
use std::time::{Duration, Instant};

/// Categories of low-level transport failures, used for retry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportErrorKind {
    TimedOut,
    CannotFindHost,
    CannotConnectToHost,
    NetworkConnectionLost,
    NotConnectedToInternet,
    DnsLookupFailed,
    SecureConnectionFailed,
    BadServerResponse,
    Cancelled,
    Other,
}

/// A transport failure, with its category and the underlying cause.
#[derive(Debug)]
pub struct TransportError {
    kind: TransportErrorKind,
    source: BoxError,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// The underlying error reported by the transport.
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.source)
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// What a transport hands back for one exchange.
///
/// `status` is the raw status code as read from the wire; values that are not
/// valid HTTP status codes are reported as [`Error::InvalidResponse`].
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Sends one fully resolved request.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use fetchwire::{OutboundRequest, Transport, TransportError, TransportResponse};
///
/// struct AlwaysOk;
///
/// #[async_trait]
/// impl Transport for AlwaysOk {
///     async fn send(
///         &self,
///         _request: &OutboundRequest,
///     ) -> Result<TransportResponse, TransportError> {
///         Ok(TransportResponse {
///             status: 200,
///             headers: http::HeaderMap::new(),
///             body: bytes::Bytes::from_static(b"{}"),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &OutboundRequest,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// Runs one exchange and normalizes its outcome.
///
/// Statuses outside `200..=299` become [`Error::StatusCode`] with the body kept.
pub(crate) async fn execute(
    transport: &dyn Transport,
    request: &OutboundRequest,
    attempt: usize,
) -> Result<Response> {
    tracing::debug!(
        method = %request.method,
        url = %request.url,
        attempt = attempt,
        "Executing HTTP request"
    );

    let started = Instant::now();
    let raw = transport.send(request).await?;
    let latency = started.elapsed();

    let status = StatusCode::from_u16(raw.status).map_err(|_| {
        Error::InvalidResponse(format!("transport returned status {}", raw.status))
    })?;

    tracing::info!(
        status = status.as_u16(),
        latency_ms = latency.as_millis() as u64,
        attempt = attempt,
        "Received HTTP response"
    );

    if !status.is_success() {
        if status.is_client_error() {
            tracing::error!(status = status.as_u16(), "Client error (4xx)");
        } else if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "Server error (5xx)");
        }
        return Err(Error::StatusCode {
            status,
            body: raw.body,
            headers: raw.headers,
        });
    }

    Ok(Response::new(
        raw.body,
        status,
        raw.headers,
        request.url.clone(),
        latency,
        attempt,
    ))
}

/// The default transport, backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with reqwest's defaults.
    pub fn new() -> Result<Self> {
        Self::with_timeout(None)
    }

    /// Creates a transport with a default per-request timeout.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(|e| {
            Error::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self { http_client })
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &OutboundRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut builder = self
            .http_client
            .request(request.method.as_http(), request.url.clone())
            .headers(request.headers.clone());

        if let Some(directive) = request.cache_policy.and_then(cache_control_directive) {
            if !request.headers.contains_key(CACHE_CONTROL) {
                builder = builder.header(CACHE_CONTROL, HeaderValue::from_static(directive));
            }
        }

        if let Some(length) = stream_content_length(request) {
            builder = builder.header(CONTENT_LENGTH, HeaderValue::from(length));
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::Bytes(bytes) => builder.body(bytes.clone()),
            Body::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream.open())),
        };

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify_reqwest_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// The `Content-Length` to announce for a streamed body of known size.
///
/// `None` when the request already carries the header, or the body is not a
/// stream (reqwest sizes buffered bodies itself).
fn stream_content_length(request: &OutboundRequest) -> Option<u64> {
    match &request.body {
        Body::Stream(_) if !request.headers.contains_key(CONTENT_LENGTH) => {
            request.body.len_hint()
        }
        _ => None,
    }
}

fn cache_control_directive(policy: CachePolicy) -> Option<&'static str> {
    match policy {
        CachePolicy::UseProtocolCachePolicy => None,
        CachePolicy::ReloadIgnoringCacheData => Some("no-cache"),
        CachePolicy::ReturnCacheDataElseLoad => Some("max-stale"),
        CachePolicy::ReturnCacheDataDontLoad => Some("only-if-cached"),
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() {
        TransportErrorKind::TimedOut
    } else if error.is_connect() {
        if mentions(&error, "dns error") {
            TransportErrorKind::DnsLookupFailed
        } else if mentions(&error, "certificate") || mentions(&error, "tls") {
            TransportErrorKind::SecureConnectionFailed
        } else {
            TransportErrorKind::CannotConnectToHost
        }
    } else if error.is_body() || error.is_request() {
        TransportErrorKind::NetworkConnectionLost
    } else if error.is_decode() {
        TransportErrorKind::BadServerResponse
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, error)
}

/// Whether any error in the source chain mentions `needle`.
fn mentions(error: &(dyn StdError + 'static), needle: &str) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if err.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }
        current = err.source();
    }
    false
}
