//! Cancellable scheduling shared by the polling components.
//!
//! A loop owns a [`CancellationToken`] that acts as its disposed flag. Disposal never aborts
//! a request that is already in flight; the loop checks the flag once the request settles and
//! drops the result if the subscription is gone.

use std::time::Duration;

use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

type DisposeHook = Box<dyn Fn() + Send + Sync>;

/// Fixed delay between two cycles of a loop, cut short by disposal.
#[derive(Clone, Debug)]
pub struct Cadence {
    interval: Duration,
    token: CancellationToken,
}

impl Cadence {
    pub fn new(interval: Duration, token: CancellationToken) -> Self {
        Self { interval, token }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleeps one interval. Returns `false` as soon as the loop is disposed.
    pub async fn wait(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = sleep(self.interval) => !self.token.is_cancelled(),
        }
    }
}

/// Handle to one running loop. Disposing is idempotent; dropping the handle disposes it.
pub struct Subscription {
    id: Uuid,
    token: CancellationToken,
    hook: Option<DisposeHook>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(id: Uuid, token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            id,
            token,
            hook: None,
            task: Some(task),
        }
    }

    /// Replaces plain token cancellation with `hook`, which must cancel the token itself.
    /// Owners use it to flip the flag under the same lock their loop checks.
    pub fn with_dispose_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dispose(&self) {
        match &self.hook {
            Some(hook) => hook(),
            None => self.token.cancel(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the loop task to exit (terminal state reached or disposed).
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Runs `action` once after `delay` unless `token` is cancelled first.
pub fn spawn_after<F>(delay: Duration, token: CancellationToken, action: F) -> JoinHandle<bool>
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = sleep(delay) => {
                if token.is_cancelled() {
                    return false;
                }
                action();
                true
            }
        }
    })
}
