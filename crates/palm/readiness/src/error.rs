//! Error types for palm-readiness crate.
//!
//! Wait errors fall into four groups: hard errors that abort a wait at once,
//! retry budget exhaustion, outer context expiry, and environment plumbing
//! failures.

use thiserror::Error;

use crate::target::ContainerStatus;

/// Reason a [`WaitContext`](crate::context::WaitContext) is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ContextError {
    /// The context, or one of its ancestors, was canceled.
    #[error("context canceled")]
    Canceled,

    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Terminal health check outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HealthCheckError {
    /// More failures were counted than the strategy allows.
    #[error("max retries exceeded")]
    MaxRetriesExceeded,
}

/// Errors that can occur while waiting for a target to become ready.
#[derive(Debug, Error)]
pub enum WaitError {
    /// The retry budget was exhausted.
    #[error("health check failed: {0}")]
    HealthCheck(#[from] HealthCheckError),

    /// The outer context was canceled or its deadline passed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Container cannot be tested and its logs could not be fetched.
    #[error("container is {status} and unable to get logs: {source}")]
    LogsUnavailable {
        status: ContainerStatus,
        #[source]
        source: Box<WaitError>,
    },

    /// Container cannot be tested and its log stream failed mid-read.
    #[error("container is {status} and unable to read logs: {source}")]
    LogsUnreadable {
        status: ContainerStatus,
        #[source]
        source: std::io::Error,
    },

    /// Container cannot be tested; its logs are attached.
    #[error("container is {status}, logs:\n{logs}")]
    NotTestable {
        status: ContainerStatus,
        logs: String,
    },

    /// Container cannot be tested and produced no logs.
    #[error("container is {status} and no logs")]
    NoLogs { status: ContainerStatus },

    /// A target capability call failed.
    #[error("{0}")]
    Target(String),

    /// A user supplied probe failed.
    #[error("{reason}")]
    Probe {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A container lookup made on behalf of a named container failed.
    #[error("could not get container {name:?} {what}: {source}")]
    Container {
        name: String,
        what: &'static str,
        #[source]
        source: Box<WaitError>,
    },

    /// An environment variable could not be set.
    #[error("could not set env var {name:?}: {reason}")]
    Env { name: String, reason: String },
}

/// Result type for readiness operations.
pub type WaitResult<T> = Result<T, WaitError>;

impl WaitError {
    /// Create a probe failure without an underlying cause.
    pub fn probe(reason: impl Into<String>) -> Self {
        Self::Probe {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a probe failure wrapping an underlying cause.
    pub fn probe_with_source<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Probe {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the retry budget was exhausted.
    pub fn is_max_retries_exceeded(&self) -> bool {
        matches!(
            self,
            WaitError::HealthCheck(HealthCheckError::MaxRetriesExceeded)
        )
    }

    /// Whether a deadline expiry appears anywhere in the error chain.
    pub fn is_deadline_exceeded(&self) -> bool {
        self.chain_contains(ContextError::DeadlineExceeded)
    }

    /// Whether a cancellation appears anywhere in the error chain.
    pub fn is_canceled(&self) -> bool {
        self.chain_contains(ContextError::Canceled)
    }

    fn chain_contains(&self, needle: ContextError) -> bool {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);

        while let Some(err) = current {
            if err.downcast_ref::<ContextError>() == Some(&needle) {
                return true;
            }

            // `Context` is transparent, so its inner error never shows up as a source.
            let wait_error = err
                .downcast_ref::<WaitError>()
                .or_else(|| err.downcast_ref::<Box<WaitError>>().map(|boxed| &**boxed));
            if let Some(WaitError::Context(inner)) = wait_error {
                if *inner == needle {
                    return true;
                }
            }

            current = err.source();
        }

        false
    }
}
