//! Request values: what callers build, and what the transport receives.
//!
//! A [`Request`] is the caller-facing description of one call. Before each
//! attempt the client resolves it into an [`OutboundRequest`] (absolute URL,
//! merged headers, concrete [`Body`]), which is what interceptors rewrite and
//! what the [`Transport`](crate::Transport) sends.

use crate::multipart::MultipartFormData;
use crate::{Error, Result};
use bytes::Bytes;
use futures::Stream;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// The HTTP methods a request can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    /// The method as an [`http::Method`].
    pub fn as_http(self) -> http::Method {
        match self {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Patch => http::Method::PATCH,
            Method::Delete => http::Method::DELETE,
            Method::Head => http::Method::HEAD,
            Method::Options => http::Method::OPTIONS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache behaviour requested for a single call.
///
/// The crate does no caching itself; the flag is handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Let the transport follow the protocol's caching rules.
    #[default]
    UseProtocolCachePolicy,
    /// Always go to the origin.
    ReloadIgnoringCacheData,
    /// Prefer a cached response of any age, load otherwise.
    ReturnCacheDataElseLoad,
    /// Only answer from cache.
    ReturnCacheDataDontLoad,
}

/// A single-use stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

/// A restartable source of streamed request bodies.
///
/// Every call to [`open`](BodyStream::open) yields a fresh [`ByteStream`], so
/// a streamed request can be sent again when an attempt is retried.
#[derive(Clone)]
pub struct BodyStream {
    open: Arc<dyn Fn() -> ByteStream + Send + Sync>,
    length: Option<u64>,
}

impl BodyStream {
    /// Creates a stream source from a factory and an optional exact length.
    pub fn new<F>(length: Option<u64>, open: F) -> Self
    where
        F: Fn() -> ByteStream + Send + Sync + 'static,
    {
        Self {
            open: Arc::new(open),
            length,
        }
    }

    /// Opens a new stream over the body.
    pub fn open(&self) -> ByteStream {
        (self.open)()
    }

    /// The exact body length, if it is known up front.
    pub fn length(&self) -> Option<u64> {
        self.length
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// The body that goes on the wire for one attempt.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Bytes),
    Stream(BodyStream),
}

impl Body {
    /// The body length when it is known without reading the body.
    pub fn len_hint(&self) -> Option<u64> {
        match self {
            Body::Empty => Some(0),
            Body::Bytes(bytes) => Some(bytes.len() as u64),
            Body::Stream(stream) => stream.length(),
        }
    }
}

/// A request as described by the caller.
///
/// The URL may be absolute or relative to the client's base URL.
///
/// # Examples
///
/// ```
/// use fetchwire::{Method, Request};
/// use std::time::Duration;
///
/// let request = Request::new(Method::Post, "/users")
///     .header("x-request-id", "42")
///     .unwrap()
///     .body("raw payload")
///     .timeout(Duration::from_secs(5));
///
/// assert_eq!(request.method, Method::Post);
/// assert_eq!(request.url, "/users");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    /// Absolute URL, or a path relative to the base URL.
    pub url: String,

    pub method: Method,

    /// Per-request headers; these win over the client's default headers.
    pub headers: HeaderMap,

    /// Eager body. Takes precedence over `body_stream` when both are set.
    pub body: Option<Bytes>,

    /// Lazily produced body.
    pub body_stream: Option<BodyStream>,

    /// Explicit `Content-Length` to send.
    pub content_length: Option<u64>,

    /// Overrides the transport's default timeout for this request.
    pub timeout: Option<Duration>,

    pub cache_policy: Option<CachePolicy>,
}

impl Request {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
            body: None,
            body_stream: None,
            content_length: None,
            timeout: None,
            cache_policy: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Adds a header to the request, replacing any previous value for the name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets an eager body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a streamed body.
    pub fn body_stream(mut self, stream: BodyStream) -> Self {
        self.body_stream = Some(stream);
        self
    }

    /// Serializes `value` as the JSON body.
    ///
    /// Sets `Content-Type: application/json` unless a content type is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EncodingFailed`] if serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(value).map_err(Error::encoding)?;
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        self.body = Some(Bytes::from(encoded));
        Ok(self)
    }

    /// Uses the buffered encoding of `form` as the body.
    pub fn multipart(mut self, form: &MultipartFormData) -> Result<Self> {
        let encoded = form.build();
        self.headers
            .insert(CONTENT_TYPE, content_type_value(&encoded.content_type)?);
        self.body = Some(encoded.body);
        Ok(self)
    }

    /// Streams `form` as the body, with `Content-Length` set to its exact size.
    ///
    /// Each attempt opens a new stream over the form.
    pub fn multipart_stream(mut self, form: MultipartFormData) -> Result<Self> {
        let content_type = content_type_value(&form.content_type())?;
        let length = form.build_stream().content_length();
        let source = BodyStream::new(Some(length), move || form.build_stream().into_byte_stream());
        self.headers.insert(CONTENT_TYPE, content_type);
        self.content_length = Some(length);
        self.body = None;
        self.body_stream = Some(source);
        Ok(self)
    }

    pub fn content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }

    /// The body to send for one attempt; the eager body wins over a stream.
    pub(crate) fn resolved_body(&self) -> Body {
        match (&self.body, &self.body_stream) {
            (Some(bytes), _) => Body::Bytes(bytes.clone()),
            (None, Some(stream)) => Body::Stream(stream.clone()),
            (None, None) => Body::Empty,
        }
    }
}

/// A fully resolved request, ready for the transport.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Body,
    pub timeout: Option<Duration>,
    pub cache_policy: Option<CachePolicy>,
}

impl OutboundRequest {
    /// Sets a header, replacing any previous value for the name.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<()> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Sets an explicit `Content-Length` header.
    pub(crate) fn set_content_length(&mut self, length: u64) {
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
    Ok((name, value))
}

fn content_type_value(content_type: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(content_type)
        .map_err(|e| Error::encoding(format!("Invalid multipart content type: {}", e)))
}
