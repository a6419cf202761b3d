//! Cancellation context shared by every task of a dispatch.

use crate::error::DispatchError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;

/// Cancellation signal plus optional deadline.
///
/// Contexts form a tree: [`DispatchContext::child`] is cancelled when its
/// parent is, but cancelling a child leaves the parent running. Children
/// inherit the parent's deadline.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::background()
    }
}

impl DispatchContext {
    /// Context that is never done unless cancelled explicitly.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Context driven by an externally owned token, e.g. a server shutdown signal.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    /// Why the context is done, `None` while it is still live.
    ///
    /// An expired deadline takes precedence over cancellation.
    pub fn cause(&self) -> Option<DispatchError> {
        if self.deadline_passed() {
            Some(DispatchError::DeadlineExceeded)
        } else if self.token.is_cancelled() {
            Some(DispatchError::Cancelled)
        } else {
            None
        }
    }

    /// Resolves once the context is done and returns the cause.
    pub async fn done(&self) -> DispatchError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
        self.cause().unwrap_or(DispatchError::Cancelled)
    }

    fn deadline_passed(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}
