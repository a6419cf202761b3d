//! Supervised task group with first-error-wins cancellation.

use super::DispatchContext;
use crate::error::DispatchError;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error};

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;

/// Slot holding the first error reported by any task of a group.
#[derive(Clone, Default)]
struct FirstError(Arc<Mutex<Option<DispatchError>>>);

impl FirstError {
    /// Store `error` unless an earlier one is already held.
    fn record(&self, error: DispatchError) -> bool {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(error);
        true
    }

    fn take(&self) -> Option<DispatchError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Spawns tasks that share one child context and one first-error slot.
///
/// A failing task stores its error and cancels the group context before it
/// releases its concurrency permit, so tasks that have not started yet see
/// the cancellation and return without running. [`TaskGroup::wait`] always
/// awaits every task.
pub(crate) struct TaskGroup {
    ctx: DispatchContext,
    tasks: JoinSet<()>,
    limit: Option<Arc<Semaphore>>,
    first_error: FirstError,
}

enum Next {
    Joined(Option<Result<(), JoinError>>),
    Done(DispatchError),
}

impl TaskGroup {
    pub fn new(parent: &DispatchContext) -> Self {
        Self {
            ctx: parent.child(),
            tasks: JoinSet::new(),
            limit: None,
            first_error: FirstError::default(),
        }
    }

    /// Group running at most `limit` tasks at a time.
    pub fn with_limit(parent: &DispatchContext, limit: usize) -> Self {
        Self {
            limit: Some(Arc::new(Semaphore::new(limit.max(1)))),
            ..Self::new(parent)
        }
    }

    pub fn spawn<F, Fut>(&mut self, task: F)
    where
        F: FnOnce(DispatchContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        let ctx = self.ctx.clone();
        let limit = self.limit.clone();
        let first_error = self.first_error.clone();

        self.tasks.spawn(async move {
            let permit = match limit {
                Some(semaphore) => {
                    let acquired = tokio::select! {
                        biased;
                        cause = ctx.done() => Err(cause),
                        permit = semaphore.acquire_owned() => permit.map_err(|_| DispatchError::Cancelled),
                    };
                    match acquired {
                        Ok(permit) => Some(permit),
                        Err(cause) => {
                            first_error.record(cause);
                            return;
                        }
                    }
                }
                None => None,
            };

            let result = match ctx.cause() {
                Some(cause) => Err(cause),
                None => task(ctx.clone()).await,
            };

            if let Err(error) = result {
                if first_error.record(error) {
                    ctx.cancel();
                }
            }
            drop(permit);
        });
    }

    /// Wait for every task and return the first error, if any.
    ///
    /// The group context becoming done (parent cancelled or deadline hit)
    /// counts as an error observed at that moment.
    pub async fn wait(mut self) -> Result<(), DispatchError> {
        let mut watching = true;

        loop {
            let next = if watching {
                tokio::select! {
                    biased;
                    joined = self.tasks.join_next() => Next::Joined(joined),
                    cause = self.ctx.done() => Next::Done(cause),
                }
            } else {
                Next::Joined(self.tasks.join_next().await)
            };

            match next {
                Next::Joined(None) => break,
                Next::Joined(Some(Ok(()))) => {}
                Next::Joined(Some(Err(join_error))) => {
                    let error = task_failure(join_error);
                    error!(error = %error, "Dispatch task did not complete");
                    self.first_error.record(error);
                    self.ctx.cancel();
                }
                Next::Done(cause) => {
                    debug!(
                        cause = %cause,
                        pending = self.tasks.len(),
                        "Dispatch context done; waiting for running tasks"
                    );
                    self.first_error.record(cause);
                    self.ctx.cancel();
                    watching = false;
                }
            }
        }

        match self.first_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn task_failure(join_error: JoinError) -> DispatchError {
    if join_error.is_panic() {
        let payload = join_error.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        DispatchError::TaskPanicked { message }
    } else {
        DispatchError::Cancelled
    }
}
