//! Health check strategy.
//!
//! Polls a [`HealthCheckTest`] until it passes, the retry budget is spent,
//! or the caller's context is done. Failures inside the start period are
//! free. Each attempt runs under its own timeout, and an attempt that times
//! out is a plain failure rather than an error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::Strategy;
use crate::config::HealthCheckConfig;
use crate::context::WaitContext;
use crate::error::{HealthCheckError, WaitResult};
use crate::target::StrategyTarget;

/// Default pause between attempts.
pub const DEFAULT_TEST_INTERVAL: Duration = Duration::from_secs(5);

/// Default time limit for a single attempt.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default retry budget.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default start period.
pub const DEFAULT_START_PERIOD: Duration = Duration::ZERO;

/// A single readiness test against a target.
///
/// `Ok(false)` means "not ready yet" and is retried. `Err` aborts the wait,
/// unless the error comes from the attempt's own deadline.
#[async_trait]
pub trait HealthCheckTest: Send + Sync {
    async fn test(&self, ctx: &WaitContext, target: &dyn StrategyTarget) -> WaitResult<bool>;
}

/// Health check test backed by a closure.
pub struct HealthCheckTestFn<F> {
    test_fn: F,
}

impl<F> HealthCheckTestFn<F>
where
    F: for<'a> Fn(&'a WaitContext, &'a dyn StrategyTarget) -> BoxFuture<'a, WaitResult<bool>>
        + Send
        + Sync,
{
    pub fn new(test_fn: F) -> Self {
        Self { test_fn }
    }
}

#[async_trait]
impl<F> HealthCheckTest for HealthCheckTestFn<F>
where
    F: for<'a> Fn(&'a WaitContext, &'a dyn StrategyTarget) -> BoxFuture<'a, WaitResult<bool>>
        + Send
        + Sync,
{
    async fn test(&self, ctx: &WaitContext, target: &dyn StrategyTarget) -> WaitResult<bool> {
        (self.test_fn)(ctx, target).await
    }
}

/// Strategy that repeatedly runs a health check test.
///
/// Configure it with the `with_*` builders before the first wait. The
/// strategy keeps no state between waits, so one instance can serve any
/// number of concurrent callers.
#[derive(Clone)]
pub struct HealthCheckStrategy {
    test: Arc<dyn HealthCheckTest>,
    test_interval: Duration,
    test_timeout: Duration,
    retries: u32,
    start_period: Duration,
}

impl HealthCheckStrategy {
    /// Create a strategy with default timing.
    pub fn new<T>(test: T) -> Self
    where
        T: HealthCheckTest + 'static,
    {
        Self {
            test: Arc::new(test),
            test_interval: DEFAULT_TEST_INTERVAL,
            test_timeout: DEFAULT_TEST_TIMEOUT,
            retries: DEFAULT_RETRIES,
            start_period: DEFAULT_START_PERIOD,
        }
    }

    /// Set the pause between attempts.
    pub fn with_test_interval(mut self, interval: Duration) -> Self {
        self.test_interval = interval;
        self
    }

    /// Set the time limit for a single attempt.
    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    /// Set how many counted failures are tolerated.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set a period during which failures are not counted. Useful for
    /// containers that need some time to spin up before they can be checked.
    pub fn with_start_period(mut self, period: Duration) -> Self {
        self.start_period = period;
        self
    }

    /// Apply all timing settings from a config.
    pub fn with_config(self, config: &HealthCheckConfig) -> Self {
        self.with_test_interval(config.test_interval)
            .with_test_timeout(config.test_timeout)
            .with_retries(config.retries)
            .with_start_period(config.start_period)
    }

    pub fn test_interval(&self) -> Duration {
        self.test_interval
    }

    pub fn test_timeout(&self) -> Duration {
        self.test_timeout
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn start_period(&self) -> Duration {
        self.start_period
    }

    /// Run one attempt under its own deadline.
    async fn test_target(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> WaitResult<bool> {
        let attempt_ctx = ctx.with_timeout(self.test_timeout);
        let _release = attempt_ctx.cancel_on_drop();

        let outcome =
            tokio::time::timeout(self.test_timeout, self.test.test(&attempt_ctx, target)).await;

        match outcome {
            Err(_) => {
                debug!(timeout = ?self.test_timeout, "Health check attempt timed out");
                Ok(false)
            }
            Ok(Ok(success)) => Ok(success),
            Ok(Err(err)) => match ctx.err() {
                Some(outer) => Err(outer.into()),
                None if err.is_deadline_exceeded() => {
                    debug!(error = %err, "Health check attempt hit its deadline");
                    Ok(false)
                }
                None => Err(err),
            },
        }
    }
}

#[async_trait]
impl Strategy for HealthCheckStrategy {
    #[instrument(
        skip_all,
        fields(
            retries = self.retries,
            test_interval = ?self.test_interval,
            test_timeout = ?self.test_timeout,
            start_period = ?self.start_period,
        )
    )]
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> WaitResult<()> {
        let start = Instant::now();
        let mut poll_interval = Duration::ZERO;
        let mut retry: u32 = 0;
        let mut attempt: u32 = 0;

        loop {
            tokio::select! {
                biased;
                err = ctx.done() => return Err(err.into()),
                _ = tokio::time::sleep(poll_interval) => {}
            }

            attempt = attempt.saturating_add(1);

            let success = tokio::select! {
                biased;
                err = ctx.done() => return Err(err.into()),
                outcome = self.test_target(ctx, target) => outcome?,
            };

            let elapsed = start.elapsed();

            if success {
                debug!(attempt, elapsed = ?elapsed, "Health check passed");
                return Ok(());
            }

            if elapsed >= self.start_period {
                retry = retry.saturating_add(1);
            }

            debug!(attempt, retry, elapsed = ?elapsed, "Health check not ready");

            if retry > self.retries {
                warn!(attempt, elapsed = ?elapsed, "Health check gave up");
                return Err(HealthCheckError::MaxRetriesExceeded.into());
            }

            poll_interval = self.test_interval;
        }
    }
}

impl fmt::Debug for HealthCheckStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheckStrategy")
            .field("test_interval", &self.test_interval)
            .field("test_timeout", &self.test_timeout)
            .field("retries", &self.retries)
            .field("start_period", &self.start_period)
            .finish_non_exhaustive()
    }
}

/// Create a health check strategy from a closure, with default timing.
///
/// ```rust,no_run
/// use futures::FutureExt;
/// use palm_readiness::strategy::{for_health_check, Strategy};
/// use palm_readiness::{Port, WaitContext};
///
/// # async fn example(target: &dyn palm_readiness::StrategyTarget) {
/// let strategy = for_health_check(|ctx, target| {
///     async move {
///         let port = target.mapped_port(ctx, &Port::tcp(5432)).await?;
///         Ok(port.number != 0)
///     }
///     .boxed()
/// });
///
/// strategy
///     .wait_until_ready(&WaitContext::background(), target)
///     .await
///     .unwrap();
/// # }
/// ```
pub fn for_health_check<F>(test_fn: F) -> HealthCheckStrategy
where
    F: for<'a> Fn(&'a WaitContext, &'a dyn StrategyTarget) -> BoxFuture<'a, WaitResult<bool>>
        + Send
        + Sync
        + 'static,
{
    HealthCheckStrategy::new(HealthCheckTestFn::new(test_fn))
}
