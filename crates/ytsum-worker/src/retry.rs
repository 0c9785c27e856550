//! Quota-aware retry with exponential backoff.
//!
//! Collaborator errors classify themselves through [`Classify`]; the retry
//! loop only looks at that classification:
//! - `Quota` with a provider-suggested delay waits `delay + quota_buffer`
//! - `Quota` without a delay and `Transient` back off exponentially
//! - `Fatal` is returned immediately
//!
//! In test mode every wait is capped so automated runs stay fast while
//! exercising the same code path.

use std::fmt;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{info_span, warn, Instrument};

/// How a failed call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rate or usage limit, optionally with the provider's suggested wait
    Quota { suggested_delay: Option<Duration> },
    /// Worth retrying with backoff (server errors, timeouts, network)
    Transient,
    /// Retrying cannot help (auth, malformed request)
    Fatal,
}

/// Implemented by errors the retry loop can reason about.
pub trait Classify {
    fn classify(&self) -> ErrorClass;
}

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries (not including the initial attempt).
    pub max_retries: u32,
    /// Added to a provider-suggested delay.
    pub quota_buffer: Duration,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum backoff delay.
    pub max_backoff: Duration,
    /// Cap every wait at `test_mode_cap`.
    pub test_mode: bool,
    pub test_mode_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            quota_buffer: Duration::from_secs(15),
            base_delay: Duration::from_secs(2),
            max_backoff: Duration::from_secs(300),
            test_mode: false,
            test_mode_cap: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: std::env::var("SUMMARY_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            quota_buffer: std::env::var("QUOTA_RETRY_BUFFER_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.quota_buffer),
            base_delay: std::env::var("RETRY_BASE_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.base_delay),
            test_mode: std::env::var("YTSUM_TEST_MODE")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            ..defaults
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_quota_buffer(mut self, quota_buffer: Duration) -> Self {
        self.quota_buffer = quota_buffer;
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Wait before the next attempt, or `None` if the error is not retryable.
    ///
    /// `attempt` is the zero-based index of the retry about to happen.
    pub fn wait_for(&self, class: ErrorClass, attempt: u32) -> Option<Duration> {
        let wait = match class {
            ErrorClass::Fatal => return None,
            ErrorClass::Quota {
                suggested_delay: Some(delay),
            } => delay.saturating_add(self.quota_buffer),
            ErrorClass::Quota {
                suggested_delay: None,
            }
            | ErrorClass::Transient => self.backoff(attempt),
        };

        if self.test_mode {
            Some(wait.min(self.test_mode_cap))
        } else {
            Some(wait)
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Failure of a retried call.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The call failed with a non-retryable error.
    #[error("{0}")]
    Fatal(E),
    /// Every attempt failed; carries the last error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal(_) => 1,
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

/// Execute an async operation, retrying according to the error classification.
///
/// # Example
/// ```ignore
/// let policy = RetryPolicy::default().with_max_retries(3);
/// let output = call_with_retry(&policy, "summary_generation", || {
///     writer.generate(&request)
/// })
/// .await?;
/// ```
pub async fn call_with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        let span = info_span!("retry", operation = %operation, attempt = attempt + 1);

        let error = match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let class = error.classify();
        let Some(delay) = policy.wait_for(class, attempt) else {
            warn!(
                operation = %operation,
                attempt = attempt + 1,
                "Non-retryable failure: {}", error
            );
            return Err(RetryError::Fatal(error));
        };

        if attempt >= policy.max_retries {
            warn!(
                operation = %operation,
                attempts = attempt + 1,
                "Retries exhausted: {}", error
            );
            return Err(RetryError::Exhausted {
                attempts: attempt + 1,
                last: error,
            });
        }

        warn!(
            operation = %operation,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            quota = matches!(class, ErrorClass::Quota { .. }),
            "Operation failed, retrying in {:?}: {}", delay, error
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

fn retry_delay_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Matches JSON (`"retryDelay": "18s"`) and repr-style (`'retryDelay': '18s'`) payloads
        Regex::new(r#"retryDelay['"]?\s*[:=]\s*['"]?(\d+(?:\.\d+)?)s"#)
            .expect("retry delay pattern is valid")
    })
}

/// Extract a provider-suggested retry delay from an error payload.
///
/// Recognizes the `retryDelay` field of Google RPC `RetryInfo` details,
/// expressed in (possibly fractional) seconds.
pub fn parse_retry_delay(payload: &str) -> Option<Duration> {
    let captures = retry_delay_pattern().captures(payload)?;
    let secs: f64 = captures.get(1)?.as_str().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, Clone)]
    struct FakeError(ErrorClass);

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self.0 {
                ErrorClass::Quota { .. } => write!(f, "quota exceeded"),
                ErrorClass::Transient => write!(f, "server unavailable"),
                ErrorClass::Fatal => write!(f, "bad api key"),
            }
        }
    }

    impl Classify for FakeError {
        fn classify(&self) -> ErrorClass {
            self.0
        }
    }

    fn quota(secs: u64) -> FakeError {
        FakeError(ErrorClass::Quota {
            suggested_delay: Some(Duration::from_secs(secs)),
        })
    }

    #[test]
    fn test_quota_wait_adds_buffer() {
        let policy = RetryPolicy::default();
        let class = quota(18).classify();
        assert_eq!(policy.wait_for(class, 0), Some(Duration::from_secs(33)));
        // Attempt number does not matter for provider-suggested waits
        assert_eq!(policy.wait_for(class, 2), Some(Duration::from_secs(33)));
    }

    #[test]
    fn test_test_mode_caps_wait() {
        let policy = RetryPolicy::default().with_test_mode(true);
        let wait = policy.wait_for(quota(18).classify(), 0).unwrap();
        assert!(wait <= Duration::from_secs(5));

        let wait = policy.wait_for(ErrorClass::Transient, 10).unwrap();
        assert!(wait <= Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_secs(2));
        assert_eq!(policy.wait_for(ErrorClass::Transient, 0), Some(Duration::from_secs(2)));
        assert_eq!(policy.wait_for(ErrorClass::Transient, 1), Some(Duration::from_secs(4)));
        assert_eq!(policy.wait_for(ErrorClass::Transient, 2), Some(Duration::from_secs(8)));
        let no_hint = ErrorClass::Quota { suggested_delay: None };
        assert_eq!(policy.wait_for(no_hint, 3), Some(Duration::from_secs(16)));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.wait_for(ErrorClass::Transient, 40), Some(policy.max_backoff));
    }

    #[test]
    fn test_fatal_is_not_retryable() {
        assert_eq!(RetryPolicy::default().wait_for(ErrorClass::Fatal, 0), None);
    }

    #[test]
    fn test_parse_retry_delay_json() {
        let body = r#"{
          "error": {
            "code": 429,
            "status": "RESOURCE_EXHAUSTED",
            "details": [
              { "@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "18s" }
            ]
          }
        }"#;
        assert_eq!(parse_retry_delay(body), Some(Duration::from_secs(18)));
    }

    #[test]
    fn test_parse_retry_delay_variants() {
        assert_eq!(
            parse_retry_delay("429 quota. {'retryDelay': '7s'}"),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            parse_retry_delay(r#""retryDelay":"1.5s""#),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(parse_retry_delay("Resource has been exhausted"), None);
        assert_eq!(parse_retry_delay(r#""retryDelay": "soon""#), None);
    }

    #[test]
    fn test_parse_retry_delay_out_of_range() {
        assert_eq!(
            parse_retry_delay(r#""retryDelay": "99999999999999999999999s""#),
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_retry_waits_suggested_delay() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = call_with_retry(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(quota(18))
                } else {
                    Ok("summary")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "summary");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(33), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(34), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_retry_in_test_mode_is_capped() {
        let policy = RetryPolicy::default().with_test_mode(true);
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = call_with_retry(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(quota(18))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(start.elapsed() <= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let policy = RetryPolicy::default().with_max_retries(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = call_with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(quota(18)) }
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(err.to_string().contains("quota exceeded"));
        assert!(err.to_string().contains("gave up after 4 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), _> = call_with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FakeError(ErrorClass::Fatal)) }
        })
        .await;

        let err = result.unwrap_err();
        assert!(!err.is_exhausted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(err.to_string(), "bad api key");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_recover() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_secs(1));
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = call_with_retry(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FakeError(ErrorClass::Transient))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        // 1s + 2s of backoff
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
