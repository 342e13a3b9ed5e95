//! Cancellable, deadline-bounded context for waits.
//!
//! A [`WaitContext`] is done once it is canceled, once any ancestor is
//! canceled, or once its effective deadline passes. The effective deadline of
//! a child is the earlier of its own and its parent's.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::ContextError;

/// Context handed to strategies, probes and targets.
///
/// Cloning is cheap and every clone observes the same cancellation.
#[derive(Debug, Clone)]
pub struct WaitContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    token: CancellationToken,
    own_deadline: Option<Instant>,
    deadline: Option<Instant>,
    parent: Option<WaitContext>,
}

impl WaitContext {
    /// A root context that is never done on its own.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                token: CancellationToken::new(),
                own_deadline: None,
                deadline: None,
                parent: None,
            }),
        }
    }

    /// A child context canceled together with this one.
    pub fn child(&self) -> Self {
        self.derive(None)
    }

    /// A child context that expires `timeout` from now.
    ///
    /// A timeout too large to represent as an instant sets no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.derive(Instant::now().checked_add(timeout))
    }

    /// A child context that expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.derive(Some(deadline))
    }

    fn derive(&self, own_deadline: Option<Instant>) -> Self {
        let deadline = match (self.inner.deadline, own_deadline) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };

        Self {
            inner: Arc::new(ContextInner {
                token: self.inner.token.child_token(),
                own_deadline,
                deadline,
                parent: Some(self.clone()),
            }),
        }
    }

    /// Cancel this context and all of its children.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    /// Cancel this context when the returned guard is dropped.
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.inner.token.clone().drop_guard()
    }

    /// Effective deadline, taking ancestors into account.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if let Some(parent) = &self.inner.parent {
            if let Some(err) = parent.err() {
                return Some(err);
            }
        }

        if self.inner.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }

        match self.inner.own_deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Whether the context is done.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolve once the context is done and report why.
    pub async fn done(&self) -> ContextError {
        let cancelled = self.inner.token.cancelled();

        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = cancelled => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => cancelled.await,
        }

        self.err().unwrap_or(ContextError::DeadlineExceeded)
    }
}

impl Default for WaitContext {
    fn default() -> Self {
        Self::background()
    }
}
