//! Fixed-delay strategy.
//!
//! Waits a set time and then reports the target ready. Nothing is probed.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::Strategy;
use crate::context::WaitContext;
use crate::error::WaitResult;
use crate::target::StrategyTarget;

/// Strategy that sleeps for a fixed duration without checking anything.
///
/// The wait fails with the context error if the context is done first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepStrategy {
    duration: Duration,
}

impl SleepStrategy {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl Strategy for SleepStrategy {
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        _target: &dyn StrategyTarget,
    ) -> WaitResult<()> {
        debug!(duration = ?self.duration, "Sleeping before marking target ready");

        tokio::select! {
            biased;
            err = ctx.done() => Err(err.into()),
            _ = tokio::time::sleep(self.duration) => Ok(()),
        }
    }
}

/// Sleep for `duration` without checking anything.
pub fn sleep(duration: Duration) -> SleepStrategy {
    SleepStrategy::new(duration)
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::error::{ContextError, WaitError};
    use crate::mock::MockTarget;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let target = MockTarget::new();
        let start = Instant::now();

        sleep(Duration::from_millis(50))
            .wait_until_ready(&WaitContext::background(), &target)
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(50));
        assert_eq!(target.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_deadline() {
        let ctx = WaitContext::background().with_timeout(Duration::from_millis(20));
        let start = Instant::now();

        let err = sleep(Duration::from_secs(1))
            .wait_until_ready(&ctx, &MockTarget::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WaitError::Context(ContextError::DeadlineExceeded)
        ));
        assert_eq!(start.elapsed(), Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_cancel() {
        let ctx = WaitContext::background();
        let canceller = ctx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            canceller.cancel();
        });

        let err = sleep(Duration::from_secs(1))
            .wait_until_ready(&ctx, &MockTarget::new())
            .await
            .unwrap_err();

        assert!(err.is_canceled());
    }
}
