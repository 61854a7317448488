//! Response value returned by a successful attempt.
//!
//! A [`Response`] keeps the raw body bytes along with metadata about the
//! exchange. Decoding into typed values is done on demand, see [`crate::codec`].

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::time::Duration;
use url::Url;

/// A successful (2xx) HTTP response.
///
/// # Examples
///
/// ```no_run
/// use fetchwire::{Client, Request};
///
/// # async fn example() -> Result<(), fetchwire::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let response = client.perform(Request::get("/users/123")).await?;
///
/// println!("Status: {}", response.status);
/// println!("Attempt {} took {:?}", response.attempts, response.latency);
/// println!("Body: {}", response.text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    /// The raw response body.
    pub body: Bytes,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The resolved URL the request was sent to.
    pub url: Url,

    /// The latency of the attempt that produced this response.
    pub latency: Duration,

    /// The 1-based number of the attempt that produced this response.
    ///
    /// This will be `1` for requests that succeeded on the first try,
    /// and higher for requests that required retries.
    pub attempts: usize,
}

impl Response {
    /// Creates a new `Response`.
    pub fn new(
        body: Bytes,
        status: StatusCode,
        headers: HeaderMap,
        url: Url,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            body,
            status,
            headers,
            url,
            latency,
            attempts,
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fetchwire::Response;
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response::new(
    ///     "{}".into(),
    ///     StatusCode::OK,
    ///     headers,
    ///     "https://api.example.com/".parse().unwrap(),
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// assert_eq!(response.header("Content-Type"), Some("application/json"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
