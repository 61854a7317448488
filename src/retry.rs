//! Retry policy and predicates for handling transient failures.
//!
//! A [`RetryPolicy`] decides, after each failed attempt, whether another
//! attempt is made and how long to wait before it. The first attempt is not
//! counted against [`RetryPolicy::max_retries`].

use crate::transport::TransportErrorKind;
use crate::Error;
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

/// Trait for deciding whether a failed request should be retried.
///
/// When a predicate is installed with [`RetryPolicy::should_retry_with`], its
/// verdict replaces the built-in status/transport classification. The
/// `enabled` flag and `max_retries` limit still apply.
///
/// Any `Fn(&Error, usize) -> bool` closure is a predicate.
///
/// # Examples
///
/// ```
/// use fetchwire::{Error, RetryPredicate};
///
/// struct RetryOnRateLimit;
///
/// impl RetryPredicate for RetryOnRateLimit {
///     fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
///         matches!(error.status(), Some(status) if status.as_u16() == 429)
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Determines whether the request should be retried.
    ///
    /// # Arguments
    ///
    /// * `error` - The error of the failed attempt
    /// * `attempt` - The 0-based index of the failed attempt
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

impl<F> RetryPredicate for F
where
    F: Fn(&Error, usize) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self(error, attempt)
    }
}

/// Retry only on the listed status codes.
#[derive(Debug, Clone)]
pub struct RetryOnStatus(pub HashSet<u16>);

impl RetryOnStatus {
    pub fn new(codes: impl IntoIterator<Item = u16>) -> Self {
        Self(codes.into_iter().collect())
    }
}

impl RetryPredicate for RetryOnStatus {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error.status(), Some(status) if self.0.contains(&status.as_u16()))
    }
}

/// Retry only on the listed transport error categories.
#[derive(Debug, Clone)]
pub struct RetryOnTransportError(pub HashSet<TransportErrorKind>);

impl RetryOnTransportError {
    pub fn new(kinds: impl IntoIterator<Item = TransportErrorKind>) -> Self {
        Self(kinds.into_iter().collect())
    }
}

impl RetryPredicate for RetryOnTransportError {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error.transport_error_kind(), Some(kind) if self.0.contains(&kind))
    }
}

/// Combine multiple retry predicates with OR logic.
///
/// Retries if ANY of the predicates return `true`.
///
/// # Examples
///
/// ```
/// use fetchwire::retry::{OrPredicate, RetryOnStatus, RetryOnTransportError};
/// use fetchwire::TransportErrorKind;
///
/// // Retry on 503 OR timeouts
/// let predicate = OrPredicate::new(vec![
///     Box::new(RetryOnStatus::new([503])),
///     Box::new(RetryOnTransportError::new([TransportErrorKind::TimedOut])),
/// ]);
/// ```
pub struct OrPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl OrPredicate {
    /// Creates a new `OrPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for OrPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .any(|p| p.should_retry(error, attempt))
    }
}

/// Combine multiple retry predicates with AND logic.
///
/// Retries only if ALL of the predicates return `true`.
pub struct AndPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl AndPredicate {
    /// Creates a new `AndPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for AndPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .all(|p| p.should_retry(error, attempt))
    }
}

/// Status codes retried by [`RetryPolicy::standard`].
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Transport failures retried by [`RetryPolicy::standard`].
pub const DEFAULT_RETRYABLE_TRANSPORT_ERRORS: [TransportErrorKind; 6] = [
    TransportErrorKind::TimedOut,
    TransportErrorKind::CannotFindHost,
    TransportErrorKind::CannotConnectToHost,
    TransportErrorKind::NetworkConnectionLost,
    TransportErrorKind::NotConnectedToInternet,
    TransportErrorKind::DnsLookupFailed,
];

/// Defines when and how failed requests are retried.
///
/// The wait before the `n`-th retry (1-based) is
/// `initial_backoff * backoff_multiplier^(n - 1)`, multiplied by a uniform
/// draw from the jitter range when one is set.
///
/// # Examples
///
/// ```
/// use fetchwire::RetryPolicy;
/// use std::time::Duration;
///
/// // No retries
/// let disabled = RetryPolicy::disabled();
/// assert!(!disabled.enabled);
///
/// // 100ms, 200ms, 400ms
/// let policy = RetryPolicy::standard()
///     .max_retries(3)
///     .initial_backoff(Duration::from_millis(100))
///     .backoff_multiplier(2.0)
///     .no_jitter();
///
/// assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    pub enabled: bool,

    /// Retries allowed after the first attempt.
    pub max_retries: usize,

    pub initial_backoff: Duration,

    pub backoff_multiplier: f64,

    /// Range the backoff is multiplied by, drawn uniformly per retry.
    pub jitter: Option<RangeInclusive<f64>>,

    pub retryable_status_codes: HashSet<u16>,

    pub retryable_transport_errors: HashSet<TransportErrorKind>,

    /// Replaces the built-in classification when set.
    pub predicate: Option<Arc<dyn RetryPredicate>>,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::standard()
        }
    }

    /// Two retries, 500ms initial backoff doubling each time, ±20% jitter.
    pub fn standard() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter: Some(0.8..=1.2),
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
            retryable_transport_errors: DEFAULT_RETRYABLE_TRANSPORT_ERRORS.into_iter().collect(),
            predicate: None,
        }
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the jitter range. A reversed range is normalized.
    pub fn jitter(mut self, range: RangeInclusive<f64>) -> Self {
        let (lo, hi) = range.into_inner();
        self.jitter = Some(if lo <= hi { lo..=hi } else { hi..=lo });
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.jitter = None;
        self
    }

    pub fn retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    pub fn retryable_transport_errors(
        mut self,
        kinds: impl IntoIterator<Item = TransportErrorKind>,
    ) -> Self {
        self.retryable_transport_errors = kinds.into_iter().collect();
        self
    }

    /// Installs a predicate that overrides the built-in classification.
    pub fn should_retry_with(mut self, predicate: impl RetryPredicate + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Decides whether to retry after a failed attempt.
    ///
    /// `retries_so_far` is the number of retries already performed, which is
    /// also the 0-based index of the attempt that just failed.
    pub fn should_retry(&self, error: &Error, retries_so_far: usize) -> bool {
        if !self.enabled || retries_so_far >= self.max_retries {
            return false;
        }
        match &self.predicate {
            Some(predicate) => predicate.should_retry(error, retries_so_far),
            None => self.is_retryable(error),
        }
    }

    /// The built-in classification: listed status codes and transport error
    /// categories are retryable, every other failure is not.
    pub fn is_retryable(&self, error: &Error) -> bool {
        match error {
            Error::StatusCode { status, .. } => {
                self.retryable_status_codes.contains(&status.as_u16())
            }
            Error::RequestFailed(source) => {
                self.retryable_transport_errors.contains(&source.kind())
            }
            Error::InvalidUrl(_)
            | Error::InvalidResponse(_)
            | Error::EncodingFailed(_)
            | Error::DecodingFailed(_)
            | Error::MissingKeyPath(_)
            | Error::Configuration(_) => false,
        }
    }

    /// The wait before the given retry (1-based).
    pub fn backoff_delay(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as usize) as i32;
        let mut seconds =
            self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if let Some(range) = &self.jitter {
            let (lo, hi) = (*range.start(), *range.end());
            if lo.is_finite() && hi.is_finite() {
                seconds *= if lo < hi {
                    rand::thread_rng().gen_range(lo..=hi)
                } else {
                    lo
                };
            }
        }
        if !seconds.is_finite() || seconds <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("enabled", &self.enabled)
            .field("max_retries", &self.max_retries)
            .field("initial_backoff", &self.initial_backoff)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .field("retryable_status_codes", &self.retryable_status_codes)
            .field("retryable_transport_errors", &self.retryable_transport_errors)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};

    fn status_error(code: u16) -> Error {
        Error::StatusCode {
            status: StatusCode::from_u16(code).unwrap(),
            body: Bytes::new(),
            headers: HeaderMap::new(),
        }
    }

    fn transport_error(kind: TransportErrorKind) -> Error {
        Error::RequestFailed(TransportError::new(kind, "boom"))
    }

    #[test]
    fn test_exponential_backoff_delays() {
        let policy = RetryPolicy::standard()
            .initial_backoff(Duration::from_millis(100))
            .backoff_multiplier(2.0)
            .no_jitter();

        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(800));
        // retry index 0 is treated like the first retry
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::standard()
            .initial_backoff(Duration::from_millis(1000))
            .jitter(0.5..=1.5);

        for _ in 0..100 {
            let delay = policy.backoff_delay(1);
            assert!(delay >= Duration::from_millis(500), "{:?}", delay);
            assert!(delay <= Duration::from_millis(1500), "{:?}", delay);
        }
    }

    #[test]
    fn test_non_positive_delay_means_no_wait() {
        let zero = RetryPolicy::standard().initial_backoff(Duration::ZERO);
        assert_eq!(zero.backoff_delay(1), Duration::ZERO);

        let negative = RetryPolicy::standard()
            .initial_backoff(Duration::from_millis(100))
            .jitter(-1.0..=-0.5);
        assert_eq!(negative.backoff_delay(1), Duration::ZERO);
    }

    #[test]
    fn test_disabled_never_retries() {
        let policy = RetryPolicy::disabled();
        assert!(!policy.should_retry(&status_error(503), 0));
    }

    #[test]
    fn test_max_retries_limit() {
        let policy = RetryPolicy::standard().max_retries(2);
        assert!(policy.should_retry(&status_error(503), 0));
        assert!(policy.should_retry(&status_error(503), 1));
        assert!(!policy.should_retry(&status_error(503), 2));
    }

    #[test]
    fn test_builtin_classification() {
        let policy = RetryPolicy::standard();

        assert!(policy.is_retryable(&status_error(503)));
        assert!(!policy.is_retryable(&status_error(404)));
        assert!(policy.is_retryable(&transport_error(TransportErrorKind::TimedOut)));
        assert!(!policy.is_retryable(&transport_error(TransportErrorKind::Cancelled)));
        assert!(!policy.is_retryable(&Error::InvalidUrl("x".into())));
        assert!(!policy.is_retryable(&Error::InvalidResponse("x".into())));
        assert!(!policy.is_retryable(&Error::MissingKeyPath(vec!["a".into()])));
        assert!(!policy.is_retryable(&Error::DecodingFailed("bad".into())));
        assert!(!policy.is_retryable(&Error::EncodingFailed("bad".into())));
    }

    #[test]
    fn test_predicate_fully_overrides_classification() {
        // Retries a normally non-retryable error...
        let only_invalid_url =
            |error: &Error, _attempt: usize| matches!(error, Error::InvalidUrl(_));
        let permissive = RetryPolicy::standard().should_retry_with(only_invalid_url);
        assert!(permissive.should_retry(&Error::InvalidUrl("x".into()), 0));

        // ...and refuses a normally retryable one.
        assert!(!permissive.should_retry(&status_error(503), 0));

        // The retry limit still applies.
        assert!(!permissive.max_retries(0).should_retry(&Error::InvalidUrl("x".into()), 0));
    }

    #[test]
    fn test_predicate_receives_attempt_index() {
        let policy = RetryPolicy::standard()
            .max_retries(5)
            .should_retry_with(|_: &Error, attempt: usize| attempt < 1);
        assert!(policy.should_retry(&status_error(500), 0));
        assert!(!policy.should_retry(&status_error(500), 1));
    }

    #[test]
    fn test_combined_predicates() {
        let or = OrPredicate::new(vec![
            Box::new(RetryOnStatus::new([503])),
            Box::new(RetryOnTransportError::new([TransportErrorKind::TimedOut])),
        ]);
        assert!(or.should_retry(&status_error(503), 0));
        assert!(or.should_retry(&transport_error(TransportErrorKind::TimedOut), 0));
        assert!(!or.should_retry(&status_error(500), 0));

        let and = AndPredicate::new(vec![
            Box::new(RetryOnStatus::new([500, 503])),
            Box::new(|_: &Error, attempt: usize| attempt == 0),
        ]);
        assert!(and.should_retry(&status_error(500), 0));
        assert!(!and.should_retry(&status_error(500), 1));
    }
}
