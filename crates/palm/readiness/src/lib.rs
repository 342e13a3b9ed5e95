//! # PALM Readiness - Wait Strategies for Containerized Instances
//!
//! This crate decides when a freshly started container is ready to serve.
//! A strategy probes the container until a test passes, a retry budget runs
//! out, or the caller's context is done.
//!
//! ## Key Components
//!
//! - [`WaitContext`]: cancellable context with an optional deadline
//! - [`StrategyTarget`]: capabilities of the container being probed
//! - [`HealthCheckStrategy`]: polling state machine with start period,
//!   per-attempt timeout and retry budget
//! - [`for_health_check_cmd`]: health check that runs a command in the container
//! - [`SleepStrategy`]: fixed delay, no probing
//! - [`env`]: export container endpoints as environment variables
//!
//! ## Timing Semantics
//!
//! - The first attempt runs immediately; later attempts wait `test_interval`.
//! - Each attempt runs under a child context bounded by `test_timeout`. An
//!   attempt that hits that deadline is a plain failure, not an error.
//! - Failures before `start_period` has elapsed are not counted. Once more
//!   than `retries` failures are counted the wait fails with
//!   [`HealthCheckError::MaxRetriesExceeded`].
//! - When the caller's context is done the wait stops at once and returns
//!   the context error.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use palm_readiness::{for_health_check_cmd, Strategy, StrategyTarget, WaitContext};
//!
//! # async fn example(container: &dyn StrategyTarget) {
//! let strategy = for_health_check_cmd("pg_isready", ["-U", "postgres"])
//!     .with_test_interval(Duration::from_millis(500))
//!     .with_retries(10)
//!     .with_start_period(Duration::from_secs(5));
//!
//! let ctx = WaitContext::background().with_timeout(Duration::from_secs(60));
//!
//! match strategy.wait_until_ready(&ctx, container).await {
//!     Ok(()) => println!("ready"),
//!     Err(err) if err.is_max_retries_exceeded() => println!("unhealthy: {err}"),
//!     Err(err) => println!("wait aborted: {err}"),
//! }
//! # }
//! ```

pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod strategy;
pub mod target;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Re-export main types
pub use config::HealthCheckConfig;
pub use context::WaitContext;
pub use env::{env_var_name, populate_host_port_env, EnvSetter, MemoryEnv, ProcessEnv};
pub use error::{ContextError, HealthCheckError, WaitError, WaitResult};
pub use strategy::{
    for_health_check, for_health_check_cmd, sleep, CommandTest, HealthCheckStrategy,
    HealthCheckTest, HealthCheckTestFn, SleepStrategy, Strategy,
};
pub use target::{
    ContainerState, ContainerStatus, ExecOutput, LogStream, Port, PortBinding, PortMap, Protocol,
    StrategyTarget,
};
