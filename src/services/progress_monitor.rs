use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    domain::{
        traits::Gateway,
        value_objects::{SuccessCodes, TaskId},
    },
    dto::progress::{ProgressEnvelope, TaskProgress},
    error::AppError,
    infra::scheduler::{Cadence, Subscription},
};

const EVENTS_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorPhase {
    Idle,
    Polling,
    Completed,
    Failed,
    Disposed,
}

#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Progress(ProgressEnvelope),
    Completed(ProgressEnvelope),
    Failed { message: String },
    Disposed,
}

/// How one progress response moves the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Completed,
    Failed,
}

/// Success code and `completed` state finish the task; any other code fails it;
/// a success code with a non-terminal state keeps polling.
pub fn judge(envelope: &ProgressEnvelope, codes: &SuccessCodes) -> Verdict {
    if !envelope.is_success(codes) {
        return Verdict::Failed;
    }
    if envelope
        .data
        .as_ref()
        .is_some_and(TaskProgress::is_completed)
    {
        Verdict::Completed
    } else {
        Verdict::Continue
    }
}

struct MonitorState {
    phase: MonitorPhase,
    progress: Option<ProgressEnvelope>,
    active: Option<(Uuid, CancellationToken)>,
}

impl MonitorState {
    fn finish(&mut self, phase: MonitorPhase) {
        self.active = None;
        self.phase = phase;
    }
}

struct MonitorInner {
    gateway: Arc<dyn Gateway>,
    interval: Duration,
    success_codes: SuccessCodes,
    state: Mutex<MonitorState>,
    events: broadcast::Sender<MonitorEvent>,
}

/// Tracks one server-side task at a time until it completes or fails.
///
/// Each presentation consumer owns its own monitor; at most one polling loop runs per monitor.
#[derive(Clone)]
pub struct ProgressMonitor {
    inner: Arc<MonitorInner>,
}

impl ProgressMonitor {
    pub fn new(gateway: Arc<dyn Gateway>, interval: Duration, success_codes: SuccessCodes) -> Self {
        let (events, _) = broadcast::channel(EVENTS_CAPACITY);
        Self {
            inner: Arc::new(MonitorInner {
                gateway,
                interval,
                success_codes,
                state: Mutex::new(MonitorState {
                    phase: MonitorPhase::Idle,
                    progress: None,
                    active: None,
                }),
                events,
            }),
        }
    }

    /// Starts polling `task_id`: one fetch now, then one per interval after each response settles.
    ///
    /// Returns `None` without polling when `task_id` is empty or a loop is already active.
    /// Exactly one of the callbacks runs, at most once. Disposal suppresses the callbacks for
    /// responses that settle after it; a response already judged terminal still reports.
    /// Must be called inside a tokio runtime.
    pub fn start<C, E>(&self, task_id: &str, on_complete: C, on_error: E) -> Option<Subscription>
    where
        C: FnOnce(ProgressEnvelope) + Send + 'static,
        E: FnOnce(AppError) + Send + 'static,
    {
        let Ok(task_id) = TaskId::new(task_id) else {
            debug!("empty task id, progress polling not started");
            return None;
        };

        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        {
            let mut state = self.inner.state.lock();
            if let Some((active, _)) = &state.active {
                debug!(%task_id, active = %active, "progress polling already active, start ignored");
                return None;
            }
            state.active = Some((id, token.clone()));
            state.phase = MonitorPhase::Polling;
            state.progress = None;
        }

        let task = tokio::spawn(self.inner.clone().run(
            id,
            task_id,
            token.clone(),
            on_complete,
            on_error,
        ));

        let inner = self.inner.clone();
        let hook_token = token.clone();
        Some(
            Subscription::new(id, token, task)
                .with_dispose_hook(move || inner.dispose(id, &hook_token)),
        )
    }

    /// Disposes whatever loop is currently active.
    pub fn stop(&self) {
        let active = self.inner.state.lock().active.clone();
        if let Some((id, token)) = active {
            self.inner.dispose(id, &token);
        }
    }

    pub fn progress(&self) -> Option<ProgressEnvelope> {
        self.inner.state.lock().progress.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.state.lock().active.is_some()
    }

    pub fn phase(&self) -> MonitorPhase {
        self.inner.state.lock().phase
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }
}

impl MonitorInner {
    fn dispose(&self, id: Uuid, token: &CancellationToken) {
        let mut state = self.state.lock();
        if token.is_cancelled() {
            return;
        }
        token.cancel();
        if matches!(&state.active, Some((active, _)) if *active == id) {
            state.finish(MonitorPhase::Disposed);
            let _ = self.events.send(MonitorEvent::Disposed);
            debug!(subscription = %id, "progress polling disposed");
        }
    }

    async fn run<C, E>(
        self: Arc<Self>,
        id: Uuid,
        task_id: TaskId,
        token: CancellationToken,
        on_complete: C,
        on_error: E,
    ) where
        C: FnOnce(ProgressEnvelope) + Send + 'static,
        E: FnOnce(AppError) + Send + 'static,
    {
        let cadence = Cadence::new(self.interval, token.clone());
        debug!(%task_id, subscription = %id, "progress polling started");

        loop {
            let result = self.gateway.get_progress(&task_id).await;

            let outcome = {
                let mut state = self.state.lock();
                // disposal flips the token under this same lock
                if token.is_cancelled() {
                    debug!(%task_id, subscription = %id, "response after disposal discarded");
                    return;
                }
                self.settle(&mut state, result)
            };

            match outcome {
                None => {}
                Some(Ok(envelope)) => {
                    info!(%task_id, code = envelope.code, "task completed");
                    on_complete(envelope);
                    return;
                }
                Some(Err(err)) => {
                    warn!(%task_id, %err, "task tracking failed");
                    on_error(err);
                    return;
                }
            }

            if !cadence.wait().await {
                return;
            }
        }
    }

    /// Applies one response to the exposed state. `Some` means the subscription is terminal.
    fn settle(
        &self,
        state: &mut MonitorState,
        result: Result<ProgressEnvelope, AppError>,
    ) -> Option<Result<ProgressEnvelope, AppError>> {
        let envelope = match result {
            Ok(envelope) => envelope,
            Err(err) => {
                // sin reintentos: un backend caído termina la suscripción
                state.finish(MonitorPhase::Failed);
                let _ = self.events.send(MonitorEvent::Failed {
                    message: err.to_string(),
                });
                return Some(Err(err));
            }
        };

        debug!(code = envelope.code, state = ?envelope.data.as_ref().and_then(|d| d.state.as_ref()), "progress response");
        state.progress = Some(envelope.clone());
        let _ = self.events.send(MonitorEvent::Progress(envelope.clone()));

        match judge(&envelope, &self.success_codes) {
            Verdict::Continue => None,
            Verdict::Completed => {
                state.finish(MonitorPhase::Completed);
                let _ = self.events.send(MonitorEvent::Completed(envelope.clone()));
                Some(Ok(envelope))
            }
            Verdict::Failed => {
                let err = AppError::application(envelope.code, envelope.message());
                state.finish(MonitorPhase::Failed);
                let _ = self.events.send(MonitorEvent::Failed {
                    message: err.to_string(),
                });
                Some(Err(err))
            }
        }
    }
}
