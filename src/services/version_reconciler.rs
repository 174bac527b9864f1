use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex as AsyncMutex},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    domain::{
        models::VersionScope,
        traits::{Gateway, Reloader},
        value_objects::{should_update, SuccessCodes, UNKNOWN_VERSION},
    },
    dto::version::LocalVersion,
    error::AppError,
    infra::{
        config::AppConfig,
        scheduler::{spawn_after, Cadence, Subscription},
    },
};

use super::ServiceResult;

/// What the presentation layer renders about installed vs. published versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    pub backend_version: String,
    pub remote_version: String,
    pub build_date: String,
    pub has_backend_update: bool,
    pub show_update_prompt: bool,
    pub checked_at: Option<DateTime<Utc>>,
}

impl Default for VersionSnapshot {
    fn default() -> Self {
        Self {
            backend_version: UNKNOWN_VERSION.to_string(),
            remote_version: UNKNOWN_VERSION.to_string(),
            build_date: String::new(),
            has_backend_update: false,
            show_update_prompt: false,
            checked_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub interval: Duration,
    /// A manual refresh within this window of the last successful fetch is served from cache.
    pub stale_after: Duration,
    pub reload_grace: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(30),
            reload_grace: Duration::from_secs(3),
        }
    }
}

impl From<&AppConfig> for ReconcilerSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            interval: cfg.version_interval,
            stale_after: cfg.version_stale_after,
            reload_grace: cfg.reload_grace,
        }
    }
}

struct ReconcilerInner {
    gateway: Arc<dyn Gateway>,
    reloader: Arc<dyn Reloader>,
    settings: ReconcilerSettings,
    success_codes: SuccessCodes,
    snapshot: watch::Sender<VersionSnapshot>,
    last_success: Mutex<Option<Instant>>,
    // periodic and manual refreshes never overlap
    cycle: AsyncMutex<()>,
    shutdown: CancellationToken,
    periodic: Mutex<Option<CancellationToken>>,
}

/// Keeps the installed and published backend versions in sync and drives the upgrade action.
///
/// Only refresh cycles write the version fields; any number of readers may watch them.
#[derive(Clone)]
pub struct VersionReconciler {
    inner: Arc<ReconcilerInner>,
}

impl VersionReconciler {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        reloader: Arc<dyn Reloader>,
        settings: ReconcilerSettings,
        success_codes: SuccessCodes,
    ) -> Self {
        let (snapshot, _) = watch::channel(VersionSnapshot::default());
        Self {
            inner: Arc::new(ReconcilerInner {
                gateway,
                reloader,
                settings,
                success_codes,
                snapshot,
                last_success: Mutex::new(None),
                cycle: AsyncMutex::new(()),
                shutdown: CancellationToken::new(),
                periodic: Mutex::new(None),
            }),
        }
    }

    /// Refreshes now and then every interval. Returns `None` if the loop is already running
    /// or the reconciler was disposed.
    pub fn start(&self) -> Option<Subscription> {
        let mut periodic = self.inner.periodic.lock();
        if self.inner.shutdown.is_cancelled()
            || periodic.as_ref().is_some_and(|t| !t.is_cancelled())
        {
            return None;
        }

        let token = self.inner.shutdown.child_token();
        *periodic = Some(token.clone());

        let id = Uuid::new_v4();
        let task = tokio::spawn(self.inner.clone().run(token.clone()));
        let inner = self.inner.clone();
        let hook_token = token.clone();
        Some(
            Subscription::new(id, token, task)
                .with_dispose_hook(move || inner.cancel_locked(&hook_token)),
        )
    }

    pub fn snapshot(&self) -> VersionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Same as `snapshot()`; the name the presentation layer polls with.
    pub fn observe(&self) -> VersionSnapshot {
        self.snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<VersionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Out-of-band refresh. Served from cache when the last successful fetch is still fresh.
    pub async fn refresh_now(&self) -> ServiceResult<VersionSnapshot> {
        let token = self.inner.shutdown.clone();
        self.inner.refresh(&token, true).await?;
        Ok(self.snapshot())
    }

    pub async fn check_for_updates(&self) -> ServiceResult<VersionSnapshot> {
        self.refresh_now().await
    }

    /// Asks the backend to update itself. On success the update prompt is raised and a full
    /// reload follows after the grace period; on failure nothing is reloaded.
    pub async fn update_backend(&self) -> ServiceResult<()> {
        let result = self
            .inner
            .gateway
            .trigger_update()
            .await
            .and_then(|envelope| envelope.ensure_success(&self.inner.success_codes));

        if let Err(err) = result {
            error!(%err, "backend update failed, manual restart required");
            return Err(AppError::ManualRestartRequired(Box::new(err)));
        }

        let grace = self.inner.settings.reload_grace;
        info!(grace_ms = grace.as_millis() as u64, "backend update accepted, reload scheduled");
        self.set_show_update_prompt(true);

        let reloader = self.inner.reloader.clone();
        spawn_after(grace, self.inner.shutdown.child_token(), move || {
            info!("reloading after backend update");
            reloader.reload();
        });
        Ok(())
    }

    pub fn set_show_update_prompt(&self, show: bool) {
        self.inner.snapshot.send_if_modified(|s| {
            let changed = s.show_update_prompt != show;
            s.show_update_prompt = show;
            changed
        });
    }

    /// Stops the periodic loop and any pending reload; late responses are dropped.
    pub fn dispose(&self) {
        let shutdown = self.inner.shutdown.clone();
        self.inner.cancel_locked(&shutdown);
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl ReconcilerInner {
    /// Cancels under the snapshot lock so a cycle cannot publish after disposal.
    fn cancel_locked(&self, token: &CancellationToken) {
        self.snapshot.send_if_modified(|_| {
            token.cancel();
            false
        });
    }

    async fn run(self: Arc<Self>, token: CancellationToken) {
        let cadence = Cadence::new(self.settings.interval, token.clone());
        loop {
            // errors are already logged and reflected in the snapshot
            let _ = self.refresh(&token, false).await;
            if !cadence.wait().await {
                debug!("version refresh loop stopped");
                return;
            }
        }
    }

    fn is_fresh(&self) -> bool {
        self.last_success
            .lock()
            .is_some_and(|at| at.elapsed() < self.settings.stale_after)
    }

    async fn refresh(&self, token: &CancellationToken, allow_cached: bool) -> ServiceResult<()> {
        let _cycle = self.cycle.lock().await;
        if token.is_cancelled() {
            return Ok(());
        }
        if allow_cached && self.is_fresh() {
            debug!("version info still fresh, served from cache");
            return Ok(());
        }

        let local = match self.fetch_local().await {
            Ok(local) => local,
            Err(err) => {
                warn!(%err, "local version fetch failed, versions reset");
                // a failed cycle is never served from cache
                *self.last_success.lock() = None;
                self.snapshot.send_if_modified(|s| {
                    if token.is_cancelled() {
                        return false;
                    }
                    s.backend_version = UNKNOWN_VERSION.to_string();
                    s.remote_version = UNKNOWN_VERSION.to_string();
                    s.build_date.clear();
                    s.has_backend_update = false;
                    s.checked_at = Some(Utc::now());
                    true
                });
                return Err(err);
            }
        };

        if token.is_cancelled() {
            return Ok(());
        }

        let remote = match self.fetch_remote().await {
            Ok(remote) => Some(remote),
            Err(err) => {
                warn!(%err, "remote version fetch failed, keeping previous value");
                None
            }
        };

        let published = self.snapshot.send_if_modified(|s| {
            if token.is_cancelled() {
                return false;
            }
            s.backend_version = local
                .version
                .clone()
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
            s.build_date = local.build_date.clone().unwrap_or_default();
            if let Some(remote) = &remote {
                s.remote_version = remote.clone();
            }
            s.has_backend_update = should_update(&s.backend_version, &s.remote_version);
            s.checked_at = Some(Utc::now());
            true
        });

        if published {
            *self.last_success.lock() = Some(Instant::now());
            let current = self.snapshot.borrow();
            debug!(
                local = %current.backend_version,
                remote = %current.remote_version,
                update = current.has_backend_update,
                "versions reconciled"
            );
        }
        Ok(())
    }

    async fn fetch_local(&self) -> ServiceResult<LocalVersion> {
        let envelope = self.gateway.get_version(VersionScope::Local).await?;
        envelope.ensure_success(&self.success_codes)?;
        Ok(envelope.local_version())
    }

    async fn fetch_remote(&self) -> ServiceResult<String> {
        let envelope = self.gateway.get_version(VersionScope::Remote).await?;
        envelope.ensure_success(&self.success_codes)?;
        envelope
            .remote_version()
            .ok_or_else(|| AppError::application(envelope.code, "remote version missing"))
    }
}
