//! HTTP client with retry logic, interceptors and rich error handling.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure and create clients. A client's
//! configuration never changes after `build()`; to reconfigure, build a new one.

use crate::{
    interceptor::{Interceptor, InterceptorChain},
    request::{OutboundRequest, Request},
    resolve::{merge_query, resolve_url},
    retry::RetryPolicy,
    transport::{self, ReqwestTransport, Transport},
    Error, Response, Result,
};
use http::HeaderMap;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Called once per attempt with the request, its outcome and the attempt's duration.
pub type MetricsHook =
    Arc<dyn Fn(&OutboundRequest, Option<&Response>, Option<&Error>, Duration) + Send + Sync>;

/// An HTTP client for making API calls with retry logic and rich error handling.
///
/// Cloning is cheap; clones share one immutable configuration, and concurrent
/// calls on the same client are independent.
///
/// # Examples
///
/// ```no_run
/// use fetchwire::{Client, Request, RetryPolicy};
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), fetchwire::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .default_header("User-Agent", "my-app/1.0")?
///     .retry_policy(RetryPolicy::standard().initial_backoff(Duration::from_millis(100)))
///     .build()?;
///
/// let response = client.perform(Request::get("/users/123")).await?;
/// let user: User = response.json()?;
/// println!("User {}: {}", user.id, user.name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientConfig>,
}

/// The immutable configuration a [`Client`] runs with.
pub struct ClientConfig {
    pub base_url: Option<Url>,
    pub default_headers: HeaderMap,
    pub default_query: BTreeMap<String, String>,
    pub retry_policy: RetryPolicy,
    transport: Arc<dyn Transport>,
    interceptors: InterceptorChain,
    metrics: Option<MetricsHook>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .field("default_query", &self.default_query)
            .field("retry_policy", &self.retry_policy)
            .field("interceptors", &self.interceptors.len())
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("config", &self.inner).finish()
    }
}

/// Where one `perform` call stands.
enum Stage {
    Building,
    Adapting(OutboundRequest, Instant),
    Sending(OutboundRequest, Instant),
    Settled {
        request: OutboundRequest,
        result: Result<Response>,
        elapsed: Duration,
    },
    Backoff(Duration),
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The configuration this client runs with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner
    }

    /// Executes a request, retrying according to the retry policy.
    ///
    /// Returns the first successful response, or the error of the last
    /// attempt once the policy declines to retry.
    pub async fn perform(&self, request: Request) -> Result<Response> {
        self.perform_with_query(request, &BTreeMap::new()).await
    }

    /// Like [`perform`](Self::perform), with extra query parameters that win
    /// over the client's default query parameters.
    pub async fn perform_with_query(
        &self,
        request: Request,
        query: &BTreeMap<String, String>,
    ) -> Result<Response> {
        let config = &self.inner;
        let mut retries = 0usize;
        let mut stage = Stage::Building;

        loop {
            stage = match stage {
                Stage::Building => {
                    let outbound = self.build_outbound(&request, query)?;
                    Stage::Adapting(outbound, Instant::now())
                }
                Stage::Adapting(outbound, started) => {
                    match config.interceptors.adapt(outbound.clone()).await {
                        Ok(adapted) => Stage::Sending(adapted, started),
                        Err(e) => Stage::Settled {
                            request: outbound,
                            result: Err(e),
                            elapsed: started.elapsed(),
                        },
                    }
                }
                Stage::Sending(outbound, started) => {
                    let result =
                        transport::execute(config.transport.as_ref(), &outbound, retries + 1).await;
                    Stage::Settled {
                        request: outbound,
                        result,
                        elapsed: started.elapsed(),
                    }
                }
                Stage::Settled {
                    request: outbound,
                    result,
                    elapsed,
                } => {
                    config.interceptors.observe(&result, &outbound).await;
                    if let Some(metrics) = &config.metrics {
                        metrics(&outbound, result.as_ref().ok(), result.as_ref().err(), elapsed);
                    }

                    match result {
                        Ok(response) => return Ok(response),
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                attempt = retries + 1,
                                method = %outbound.method,
                                url = %outbound.url,
                                "Request failed"
                            );
                            if !config.retry_policy.should_retry(&e, retries) {
                                return Err(e);
                            }
                            retries += 1;
                            Stage::Backoff(config.retry_policy.backoff_delay(retries))
                        }
                    }
                }
                Stage::Backoff(delay) => {
                    tracing::info!(
                        delay_ms = delay.as_millis() as u64,
                        retry = retries,
                        "Retrying request after delay"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    Stage::Building
                }
            };
        }
    }

    /// Resolves the URL, merges headers and picks the body for one attempt.
    fn build_outbound(
        &self,
        request: &Request,
        query: &BTreeMap<String, String>,
    ) -> Result<OutboundRequest> {
        let config = &self.inner;
        let query = merge_query(&config.default_query, query);
        let url = resolve_url(&request.url, config.base_url.as_ref(), &query)?;

        let mut headers = config.default_headers.clone();
        for name in request.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &request.headers {
            headers.append(name.clone(), value.clone());
        }

        let mut outbound = OutboundRequest {
            method: request.method,
            url,
            headers,
            body: request.resolved_body(),
            timeout: request.timeout,
            cache_policy: request.cache_policy,
        };
        if let Some(length) = request.content_length {
            outbound.set_content_length(length);
        }
        Ok(outbound)
    }

    /// Performs a request and decodes the body as JSON.
    pub async fn perform_json<Res>(&self, request: Request) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        self.perform(request).await?.json()
    }

    /// Makes a GET request to the specified path.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fetchwire::Client;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// # async fn example() -> Result<(), fetchwire::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let user: User = client.get("/users/123").await?;
    /// println!("User: {}", user.name);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<Res>(&self, path: impl Into<String>) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        self.perform_json(Request::get(path)).await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.perform_json(Request::post(path).json(body)?).await
    }

    /// Makes a PUT request to the specified path with a JSON body.
    pub async fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.perform_json(Request::put(path).json(body)?).await
    }

    /// Makes a PATCH request to the specified path with a JSON body.
    pub async fn patch<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.perform_json(Request::patch(path).json(body)?).await
    }

    /// Makes a DELETE request to the specified path.
    pub async fn delete<Res>(&self, path: impl Into<String>) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        self.perform_json(Request::delete(path)).await
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use fetchwire::{ClientBuilder, RetryPolicy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), fetchwire::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::standard().max_retries(3))
///     .default_header("User-Agent", "my-app/1.0")?
///     .default_query("locale", "en")
///     .metrics(|request, response, error, elapsed| {
///         println!(
///             "{} {} -> {:?} / {:?} in {:?}",
///             request.method,
///             request.url,
///             response.map(|r| r.status),
///             error.map(|e| e.to_string()),
///             elapsed
///         );
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    default_query: BTreeMap<String, String>,
    retry_policy: RetryPolicy,
    transport: Option<Arc<dyn Transport>>,
    interceptors: InterceptorChain,
    metrics: Option<MetricsHook>,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            default_query: BTreeMap::new(),
            retry_policy: RetryPolicy::default(),
            transport: None,
            interceptors: InterceptorChain::default(),
            metrics: None,
            timeout: None,
        }
    }

    /// Sets the base URL relative request URLs are resolved against.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", url.as_ref(), e)))?;
        self.base_url = Some(url);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = crate::request::parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Adds a default query parameter that will be included in all requests.
    pub fn default_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_query.insert(key.into(), value.into());
        self
    }

    /// Sets the retry policy for failed requests.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Injects the transport used to send requests.
    ///
    /// Without one, `build()` creates a [`ReqwestTransport`].
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Appends an interceptor; interceptors run in the order they are added.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Sets the metrics callback, invoked once per attempt.
    pub fn metrics<F>(mut self, hook: F) -> Self
    where
        F: Fn(&OutboundRequest, Option<&Response>, Option<&Error>, Duration)
            + Send
            + Sync
            + 'static,
    {
        self.metrics = Some(Arc::new(hook));
        self
    }

    /// Sets the default request timeout of the built-in transport.
    ///
    /// Ignored when a transport is injected; use per-request timeouts instead.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the default transport cannot be created.
    pub fn build(self) -> Result<Client> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_timeout(self.timeout)?),
        };

        Ok(Client {
            inner: Arc::new(ClientConfig {
                base_url: self.base_url,
                default_headers: self.default_headers,
                default_query: self.default_query,
                retry_policy: self.retry_policy,
                transport,
                interceptors: self.interceptors,
                metrics: self.metrics,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
