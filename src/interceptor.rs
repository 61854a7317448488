//! Request interceptors.
//!
//! Interceptors run in registration order. [`adapt`](Interceptor::adapt) calls
//! form a pipeline: each receives the previous one's output, and an error
//! aborts the attempt before the transport is called.
//! [`observe`](Interceptor::observe) calls see the outcome of every attempt,
//! including attempts that are about to be retried. Observer failures are
//! logged and never change the result of a call.

use crate::request::OutboundRequest;
use crate::{BoxError, Response, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A pluggable step that can rewrite outbound requests and observe outcomes.
///
/// Both methods default to no-ops, so implementors override only what they need.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use fetchwire::{Interceptor, OutboundRequest};
///
/// struct BearerAuth(String);
///
/// #[async_trait]
/// impl Interceptor for BearerAuth {
///     async fn adapt(&self, mut request: OutboundRequest) -> fetchwire::Result<OutboundRequest> {
///         request.set_header("authorization", format!("Bearer {}", self.0))?;
///         Ok(request)
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Rewrites a request before it is sent.
    async fn adapt(&self, request: OutboundRequest) -> Result<OutboundRequest> {
        Ok(request)
    }

    /// Observes the outcome of one attempt.
    async fn observe(
        &self,
        _result: &Result<Response>,
        _request: &OutboundRequest,
    ) -> std::result::Result<(), BoxError> {
        Ok(())
    }
}

/// An ordered list of interceptors.
#[derive(Clone, Default)]
pub(crate) struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub(crate) fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub(crate) fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Runs every `adapt` in order, stopping at the first error.
    pub(crate) async fn adapt(&self, mut request: OutboundRequest) -> Result<OutboundRequest> {
        for interceptor in &self.interceptors {
            request = interceptor.adapt(request).await?;
        }
        Ok(request)
    }

    /// Runs every `observe` in order; failures are logged and dropped.
    pub(crate) async fn observe(&self, result: &Result<Response>, request: &OutboundRequest) {
        for (index, interceptor) in self.interceptors.iter().enumerate() {
            if let Err(e) = interceptor.observe(result, request).await {
                tracing::warn!(
                    error = %e,
                    interceptor = index,
                    url = %request.url,
                    "Interceptor observer failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Body;
    use crate::{Error, Method};
    use http::HeaderMap;
    use std::sync::Mutex;
    use url::Url;

    struct Append(&'static str, Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Interceptor for Append {
        async fn adapt(&self, mut request: OutboundRequest) -> Result<OutboundRequest> {
            let previous = request
                .headers
                .get("x-trail")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            request.set_header("x-trail", format!("{}{}", previous, self.0))?;
            Ok(request)
        }

        async fn observe(
            &self,
            _result: &Result<Response>,
            _request: &OutboundRequest,
        ) -> std::result::Result<(), BoxError> {
            self.1.lock().unwrap().push(self.0.to_string());
            Ok(())
        }
    }

    struct Reject;

    #[async_trait]
    impl Interceptor for Reject {
        async fn adapt(&self, _request: OutboundRequest) -> Result<OutboundRequest> {
            Err(Error::EncodingFailed("signing failed".into()))
        }

        async fn observe(
            &self,
            _result: &Result<Response>,
            _request: &OutboundRequest,
        ) -> std::result::Result<(), BoxError> {
            Err("observer exploded".into())
        }
    }

    struct Passive;

    impl Interceptor for Passive {}

    fn outbound() -> OutboundRequest {
        OutboundRequest {
            method: Method::Get,
            url: Url::parse("https://api.example.com/").unwrap(),
            headers: HeaderMap::new(),
            body: Body::Empty,
            timeout: None,
            cache_policy: None,
        }
    }

    #[tokio::test]
    async fn test_adapt_runs_sequentially_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::default();
        chain.push(Arc::new(Append("a", log.clone())));
        chain.push(Arc::new(Passive));
        chain.push(Arc::new(Append("b", log.clone())));

        let adapted = chain.adapt(outbound()).await.unwrap();
        assert_eq!(adapted.headers.get("x-trail").unwrap(), "ab");
    }

    #[tokio::test]
    async fn test_adapt_error_stops_pipeline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::default();
        chain.push(Arc::new(Reject));
        chain.push(Arc::new(Append("a", log.clone())));

        let result = chain.adapt(outbound()).await;
        assert!(matches!(result, Err(Error::EncodingFailed(_))));
    }

    #[tokio::test]
    async fn test_observer_failures_are_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::default();
        chain.push(Arc::new(Append("a", log.clone())));
        chain.push(Arc::new(Reject));
        chain.push(Arc::new(Append("b", log.clone())));

        let result: Result<Response> = Err(Error::InvalidResponse("x".into()));
        chain.observe(&result, &outbound()).await;

        assert_eq!(*log.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(chain.len(), 3);
    }
}
