//! Wait strategies.
//!
//! A strategy blocks the calling task until a target is ready, the strategy
//! gives up, or the caller's context is done:
//! - [`HealthCheckStrategy`]: polls a probe with retry budget and timeouts
//! - [`SleepStrategy`]: waits out a fixed duration

mod health;
mod health_cmd;
mod sleep;

pub use health::{
    for_health_check, HealthCheckStrategy, HealthCheckTest, HealthCheckTestFn, DEFAULT_RETRIES,
    DEFAULT_START_PERIOD, DEFAULT_TEST_INTERVAL, DEFAULT_TEST_TIMEOUT,
};
pub use health_cmd::{for_health_check_cmd, CommandTest};
pub use sleep::{sleep, SleepStrategy};

use async_trait::async_trait;

use crate::context::WaitContext;
use crate::error::WaitResult;
use crate::target::StrategyTarget;

/// Trait for readiness wait strategies.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Wait until the target is ready.
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> WaitResult<()>;
}

#[async_trait]
impl<S> Strategy for Box<S>
where
    S: Strategy + ?Sized,
{
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> WaitResult<()> {
        (**self).wait_until_ready(ctx, target).await
    }
}
