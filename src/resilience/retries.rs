//! Retry logic.
//!
//! # Responsibilities
//! - Execute a fallible operation up to `max_retry` times (sync and async)
//! - Retry only errors whose [`ErrorKind`] is in the policy's `retry_on` set
//! - Sleep between attempts with fixed or exponential backoff
//! - Report every retried failure and the final give-up through the log sink
//!
//! Both engines make the same per-failure decision and differ only in how
//! they sleep.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::config::RetryConfig;
use crate::error::{Classify, ErrorKind};
use crate::observability::metrics;
use crate::resilience::backoff::{calculate_backoff, format_secs};

/// Sink receiving one formatted line per retry event.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Blocking sleep used by the synchronous engine.
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Immutable retry settings shared by every attempt of one retried call.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retry: u32,
    sleep_time: Duration,
    ebo: bool,
    retry_on: HashSet<ErrorKind>,
    log: LogSink,
    sleeper: Sleeper,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Kind not retryable: hand the error back untouched.
    Propagate,
    /// Sleep for the delay, then try again.
    Sleep(Duration),
    /// Last allowed attempt failed.
    Exhausted,
}

impl RetryPolicy {
    /// Retry transient failures up to `max_retry` attempts with a fixed delay.
    pub fn new(max_retry: u32, sleep_time: Duration) -> Self {
        Self {
            max_retry,
            sleep_time,
            ebo: false,
            retry_on: HashSet::from([ErrorKind::Transient]),
            log: Arc::new(|line: &str| tracing::warn!(target: "chaingate::retry", "{}", line)),
            sleeper: Arc::new(std::thread::sleep),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retry, Duration::from_millis(config.sleep_time_ms))
            .with_exponential_backoff(config.ebo)
            .retry_on(config.retry_on.iter().copied())
    }

    /// Double the delay after each failed attempt.
    pub fn with_exponential_backoff(mut self, ebo: bool) -> Self {
        self.ebo = ebo;
        self
    }

    /// Replace the set of retryable kinds.
    pub fn retry_on(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retry_on = kinds.into_iter().collect();
        self
    }

    pub fn with_log_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.log = Arc::new(sink);
        self
    }

    /// Replace the blocking sleep of the synchronous engine.
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }

    pub fn sleep_time(&self) -> Duration {
        self.sleep_time
    }

    pub fn ebo(&self) -> bool {
        self.ebo
    }

    pub fn retries(&self, kind: ErrorKind) -> bool {
        self.retry_on.contains(&kind)
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.sleep_time, self.ebo)
    }

    fn on_failure<E>(&self, name: &str, attempt: &mut u32, err: &E) -> Step
    where
        E: Classify + fmt::Display,
    {
        if !self.retries(err.kind()) {
            return Step::Propagate;
        }

        *attempt += 1;
        let delay = self.delay_for(*attempt);
        if *attempt < self.max_retry {
            (self.log)(&format!(
                "Attempt #{} of function {} failed with exception {}. Trying again in {} seconds.",
                attempt,
                name,
                err,
                format_secs(delay)
            ));
            metrics::record_retry_attempt(name);
            return Step::Sleep(delay);
        }

        (self.log)(&format!("Function {} failed after {} attempts.", name, attempt));
        metrics::record_retry_exhausted(name);
        Step::Exhausted
    }

    /// Wrap a one-argument function so every call goes through [`retry`].
    pub fn decorate<A, T, E, F>(&self, name: impl Into<String>, f: F) -> impl Fn(A) -> Result<T, E>
    where
        A: Clone,
        F: Fn(A) -> Result<T, E>,
        E: Classify + fmt::Display,
    {
        let policy = self.clone();
        let name = name.into();
        move |arg: A| retry(&policy, &name, || f(arg.clone()))
    }

    /// Wrap a one-argument async function so every call goes through [`retry_async`].
    pub fn decorate_async<A, T, E, F, Fut>(
        &self,
        name: impl Into<String>,
        f: F,
    ) -> impl Fn(A) -> BoxFuture<'static, Result<T, E>>
    where
        A: Clone + Send + Sync + 'static,
        T: Send + 'static,
        E: Classify + fmt::Display + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let policy = self.clone();
        let name: Arc<str> = Arc::from(name.into());
        let f = Arc::new(f);
        move |arg: A| {
            let policy = policy.clone();
            let name = name.clone();
            let f = f.clone();
            Box::pin(async move { retry_async(&policy, &name, || f(arg.clone())).await })
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retry", &self.max_retry)
            .field("sleep_time", &self.sleep_time)
            .field("ebo", &self.ebo)
            .field("retry_on", &self.retry_on)
            .finish()
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable kind, or
/// runs out of attempts. Sleeps block the current thread.
pub fn retry<T, E, F>(policy: &RetryPolicy, name: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Classify + fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) => match policy.on_failure(name, &mut attempt, &err) {
                Step::Sleep(delay) => (policy.sleeper)(delay),
                Step::Propagate | Step::Exhausted => return Err(err),
            },
        }
    }
}

/// Async counterpart of [`retry`]; sleeps yield to the runtime.
pub async fn retry_async<T, E, F, Fut>(
    policy: &RetryPolicy,
    name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        match policy.on_failure(name, &mut attempt, &err) {
            Step::Sleep(delay) => {
                drop(err);
                tokio::time::sleep(delay).await;
            }
            Step::Propagate | Step::Exhausted => return Err(err),
        }
    }
}

/// A request/response style collaborator with a synchronous entry point.
pub trait Invoke {
    type Input: Clone;
    type Output;
    type Error: Classify + fmt::Display;

    fn invoke(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;
}

/// A request/response style collaborator with an asynchronous entry point.
#[async_trait]
pub trait AsyncInvoke: Send + Sync {
    type Input: Clone + Send + Sync + 'static;
    type Output: Send;
    type Error: Classify + fmt::Display + Send;

    async fn ainvoke(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;
}

/// Applies one [`RetryPolicy`] around every entry point of a collaborator
/// while keeping its call signature.
#[derive(Debug, Clone)]
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
    name: String,
}

impl<S> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        let full = std::any::type_name::<S>();
        let name = full.rsplit("::").next().unwrap_or(full).to_string();
        Self { inner, policy, name }
    }

    /// Name used in retry log lines.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Invoke> Invoke for Retrying<S> {
    type Input = S::Input;
    type Output = S::Output;
    type Error = S::Error;

    fn invoke(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        retry(&self.policy, &self.name, || self.inner.invoke(input.clone()))
    }
}

#[async_trait]
impl<S: AsyncInvoke> AsyncInvoke for Retrying<S> {
    type Input = S::Input;
    type Output = S::Output;
    type Error = S::Error;

    async fn ainvoke(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        retry_async(&self.policy, &self.name, || self.inner.ainvoke(input.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;
    use std::cell::Cell;
    use std::sync::Mutex;

    type Recorded<T> = Arc<Mutex<Vec<T>>>;

    fn recording_policy(
        max_retry: u32,
        sleep: Duration,
    ) -> (RetryPolicy, Recorded<String>, Recorded<Duration>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let l = lines.clone();
        let s = sleeps.clone();
        let policy = RetryPolicy::new(max_retry, sleep)
            .with_log_sink(move |line| l.lock().unwrap().push(line.to_string()))
            .with_sleeper(move |d| s.lock().unwrap().push(d));
        (policy, lines, sleeps)
    }

    #[test]
    fn test_first_try_success_is_silent() {
        let (policy, lines, sleeps) = recording_policy(3, Duration::from_secs(1));
        let result: Result<u32, GateError> = retry(&policy, "ok", || Ok(7));
        assert_eq!(result.unwrap(), 7);
        assert!(lines.lock().unwrap().is_empty());
        assert!(sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn test_log_line_format() {
        let (policy, lines, _) = recording_policy(2, Duration::from_secs(1));
        let calls = Cell::new(0);
        let result: Result<(), GateError> = retry(&policy, "fetch", || {
            calls.set(calls.get() + 1);
            Err(GateError::Transient("connection reset".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
        assert_eq!(
            *lines.lock().unwrap(),
            vec![
                "Attempt #1 of function fetch failed with exception Transient failure: connection reset. Trying again in 1 seconds.".to_string(),
                "Function fetch failed after 2 attempts.".to_string(),
            ]
        );
    }

    #[test]
    fn test_unmatched_kind_propagates_immediately() {
        let (policy, lines, sleeps) = recording_policy(5, Duration::from_secs(1));
        let calls = Cell::new(0);
        let result: Result<(), GateError> = retry(&policy, "auth", || {
            calls.set(calls.get() + 1);
            Err(GateError::AuthService("bad signature".into()))
        });
        assert_eq!(result.unwrap_err().to_string(), "bad signature");
        assert_eq!(calls.get(), 1);
        assert!(lines.lock().unwrap().is_empty());
        assert!(sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_and_one_mean_single_attempt() {
        for max_retry in [0, 1] {
            let (policy, lines, sleeps) = recording_policy(max_retry, Duration::from_secs(1));
            let calls = Cell::new(0);
            let result: Result<(), GateError> = retry(&policy, "once", || {
                calls.set(calls.get() + 1);
                Err(GateError::Transient("down".into()))
            });
            assert!(result.is_err());
            assert_eq!(calls.get(), 1);
            assert!(sleeps.lock().unwrap().is_empty());
            assert_eq!(
                *lines.lock().unwrap(),
                vec!["Function once failed after 1 attempts.".to_string()]
            );
        }
    }

    #[test]
    fn test_from_config() {
        let config = RetryConfig {
            max_retry: 4,
            sleep_time_ms: 250,
            ebo: true,
            retry_on: vec![ErrorKind::Transient, ErrorKind::AuthService],
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_retry(), 4);
        assert!(policy.ebo());
        assert!(policy.retries(ErrorKind::AuthService));
        assert!(!policy.retries(ErrorKind::Configuration));
        assert_eq!(policy.delay_for(3), Duration::from_secs(1));
    }

    #[test]
    fn test_decorate_keeps_signature() {
        let (policy, _, sleeps) = recording_policy(3, Duration::from_millis(10));
        let calls = Cell::new(0);
        let double = policy.decorate("double", |x: u32| {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err(GateError::Transient("flaky".into()))
            } else {
                Ok(x * 2)
            }
        });
        assert_eq!(double(21).unwrap(), 42);
        assert_eq!(sleeps.lock().unwrap().len(), 1);
    }

    struct Flaky {
        failures_left: Mutex<u32>,
    }

    impl Invoke for Flaky {
        type Input = String;
        type Output = String;
        type Error = GateError;

        fn invoke(&self, input: String) -> Result<String, GateError> {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(GateError::Transient("busy".into()));
            }
            Ok(input.to_uppercase())
        }
    }

    #[test]
    fn test_retrying_wrapper_sync() {
        let (policy, lines, _) = recording_policy(3, Duration::ZERO);
        let wrapped = Retrying::new(
            Flaky {
                failures_left: Mutex::new(2),
            },
            policy,
        );
        assert_eq!(wrapped.name(), "Flaky");
        assert_eq!(wrapped.invoke("abc".to_string()).unwrap(), "ABC");
        assert_eq!(lines.lock().unwrap().len(), 2);
        assert!(lines.lock().unwrap()[0].contains("function Flaky"));
    }
}
