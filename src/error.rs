//! Error types for request execution and response decoding.
//!
//! Every failure of [`Client::perform`](crate::Client::perform) or of a decode
//! operation surfaces as one [`Error`] variant. Status-code failures keep the
//! response body and headers so callers can log what the server actually said.

use crate::transport::{TransportError, TransportErrorKind};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// A boxed error from an external collaborator (JSON engine, body transform).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for HTTP calls made through this crate.
///
/// # Examples
///
/// ```no_run
/// use fetchwire::{Client, Error, Request};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.perform(Request::get("/endpoint")).await {
///     Ok(response) => println!("Got {} bytes", response.body.len()),
///     Err(Error::StatusCode { status, body, .. }) => {
///         eprintln!("HTTP {}: {}", status, String::from_utf8_lossy(&body));
///     }
///     Err(Error::RequestFailed(source)) => {
///         eprintln!("Transport failure ({:?}): {}", source.kind(), source);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request URL could not be resolved into an absolute URL.
    ///
    /// Raised for malformed URLs and for relative URLs when the client has
    /// no base URL configured.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The transport answered with something that is not a usable HTTP response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The server returned a status outside `200..=299`.
    ///
    /// The body is kept verbatim, even when empty.
    #[error("HTTP error {status}: {}", String::from_utf8_lossy(.body))]
    StatusCode {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        body: Bytes,
        /// The response headers
        headers: HeaderMap,
    },

    /// The transport failed before a response was received (DNS, connect,
    /// timeout, TLS, ...).
    #[error("Request failed: {0}")]
    RequestFailed(#[from] TransportError),

    /// A request body could not be encoded. The request never reached the transport.
    #[error("Failed to encode request body: {0}")]
    EncodingFailed(#[source] BoxError),

    /// A response body could not be decoded into the requested type.
    #[error("Failed to decode response body: {0}")]
    DecodingFailed(#[source] BoxError),

    /// A key path did not lead to a value inside the decoded JSON document.
    #[error("Missing key path: {}", .0.join("."))]
    MissingKeyPath(Vec<String>),

    /// Invalid configuration was provided (header names or values, client setup).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Returns the HTTP status code for `StatusCode` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::StatusCode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the response body for `StatusCode` errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use fetchwire::Error;
    /// use http::{HeaderMap, StatusCode};
    ///
    /// let err = Error::StatusCode {
    ///     status: StatusCode::SERVICE_UNAVAILABLE,
    ///     body: "try later".into(),
    ///     headers: HeaderMap::new(),
    /// };
    ///
    /// assert_eq!(err.body().map(|b| b.as_ref()), Some(&b"try later"[..]));
    /// assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    /// ```
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            Error::StatusCode { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Returns the transport error category for `RequestFailed` errors.
    pub fn transport_error_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Error::RequestFailed(source) => Some(source.kind()),
            _ => None,
        }
    }

    pub(crate) fn encoding(source: impl Into<BoxError>) -> Self {
        Error::EncodingFailed(source.into())
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display_includes_body() {
        let err = Error::StatusCode {
            status: StatusCode::NOT_FOUND,
            body: Bytes::from_static(b"no such user"),
            headers: HeaderMap::new(),
        };
        assert_eq!(err.to_string(), "HTTP error 404 Not Found: no such user");
    }

    #[test]
    fn test_missing_key_path_display() {
        let err = Error::MissingKeyPath(vec!["data".into(), "items".into()]);
        assert_eq!(err.to_string(), "Missing key path: data.items");
    }

    #[test]
    fn test_transport_error_kind_accessor() {
        let err = Error::from(TransportError::new(TransportErrorKind::TimedOut, "deadline hit"));
        assert_eq!(err.transport_error_kind(), Some(TransportErrorKind::TimedOut));
        assert_eq!(Error::InvalidUrl("x".into()).transport_error_kind(), None);
        assert!(Error::InvalidUrl("x".into()).status().is_none());
    }
}
