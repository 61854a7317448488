//! # fetchwire - a request execution pipeline over a pluggable HTTP transport
//!
//! fetchwire resolves request URLs against a base URL, runs requests through
//! an interceptor chain, sends them through an injected [`Transport`]
//! (reqwest by default), retries transient failures with exponential backoff,
//! and decodes JSON responses on demand.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fetchwire::{Client, Request, RetryPolicy};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fetchwire::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .default_query("locale", "en")
//!         .retry_policy(
//!             RetryPolicy::standard()
//!                 .max_retries(3)
//!                 .initial_backoff(Duration::from_millis(100)),
//!         )
//!         .build()?;
//!
//!     // Raw response, decoded on demand
//!     let response = client.perform(Request::get("/users/123")).await?;
//!     let user: User = response.json()?;
//!     println!("User: {} (attempt {})", user.name, response.attempts);
//!
//!     // Unwrap an envelope such as {"data": {...}}
//!     let response = client.perform(Request::get("/users/123/wrapped")).await?;
//!     let user: User = response.json_at(&["data"])?;
//!     println!("Wrapped user ID: {}", user.id);
//!
//!     // JSON in, JSON out
//!     let created: User = client
//!         .post("/users", &CreateUser { name: "Alice".to_string() })
//!         .await?;
//!     println!("Created user with ID: {}", created.id);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **URL resolution** - Relative paths join the base URL; default and per-call query
//!   parameters are merged
//! - **Retry policy** - Exponential backoff with jitter over retryable status codes and
//!   transport error categories, overridable by a predicate
//! - **Interceptors** - Ordered request rewriting plus per-attempt observation
//! - **Metrics hook** - One callback per attempt with request, outcome and duration
//! - **Multipart bodies** - Buffered or streamed `multipart/form-data` with an exact length
//!   up front
//! - **JSON decoding** - Direct, after a byte transform, or at a key path
//! - **Pluggable transport** - Anything implementing [`Transport`] can carry the requests
//!
//! ## Error Handling
//!
//! ```no_run
//! use fetchwire::{Client, Error, Request};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! match client.perform(Request::get("/endpoint")).await {
//!     Ok(response) => println!("Success: {}", response.text()),
//!     Err(Error::StatusCode { status, body, .. }) => {
//!         eprintln!("HTTP error {}: {}", status, String::from_utf8_lossy(&body));
//!     }
//!     Err(Error::RequestFailed(source)) => eprintln!("Transport failure: {}", source),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod codec;
mod error;
pub mod interceptor;
pub mod multipart;
pub mod request;
pub mod resolve;
mod response;
pub mod retry;
pub mod transport;

pub use client::{Client, ClientBuilder, ClientConfig, MetricsHook};
pub use error::{BoxError, Error, Result};
pub use interceptor::Interceptor;
pub use multipart::{MultipartFormData, Part};
pub use request::{Body, BodyStream, ByteStream, CachePolicy, Method, OutboundRequest, Request};
pub use response::Response;
pub use retry::{RetryPolicy, RetryPredicate};
pub use transport::{
    ReqwestTransport, Transport, TransportError, TransportErrorKind, TransportResponse,
};
