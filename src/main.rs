use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Notify;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

use copilot_panel::{
    app::bootstrap::{build_panel, PanelState},
    domain::traits::Reloader,
    infra::config::AppConfig,
};

/// "Reload" for a headless panel: rebuild everything from fresh configuration.
struct RestartSignal(Arc<Notify>);

impl Reloader for RestartSignal {
    fn reload(&self) {
        self.0.notify_one();
    }
}

enum Exit {
    Shutdown,
    Reload,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let restart = Arc::new(Notify::new());
    loop {
        let config = AppConfig::from_env().context("loading configuration")?;
        let panel = build_panel(config, Arc::new(RestartSignal(restart.clone())))
            .context("building panel")?;
        info!(base_url = %panel.config.base_url, "starting copilot panel");

        match run(&panel, &restart).await? {
            Exit::Shutdown => break,
            Exit::Reload => info!("environment reload requested"),
        }
    }

    Ok(())
}

async fn run(panel: &PanelState, restart: &Notify) -> anyhow::Result<Exit> {
    let _versions_loop = panel.reconciler.start();
    let mut versions = panel.reconciler.watch();
    let mut auth = panel.session.subscribe();

    let monitor = panel.progress_monitor();
    let _task = panel.config.track_task_id.as_deref().and_then(|task_id| {
        let done_id = task_id.to_string();
        let failed_id = task_id.to_string();
        monitor.start(
            task_id,
            move |envelope| info!(task_id = %done_id, msg = envelope.message(), "tracked task completed"),
            move |err| error!(task_id = %failed_id, %err, "tracked task failed"),
        )
    });

    let exit = loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("listening for ctrl-c")?;
                break Exit::Shutdown;
            }
            _ = restart.notified() => break Exit::Reload,
            changed = versions.changed() => {
                if changed.is_err() {
                    break Exit::Shutdown;
                }
                let snapshot = versions.borrow_and_update().clone();
                if snapshot.has_backend_update {
                    info!(
                        local = %snapshot.backend_version,
                        remote = %snapshot.remote_version,
                        "backend update available"
                    );
                } else {
                    debug!(local = %snapshot.backend_version, "backend up to date");
                }
            }
            Ok(event) = auth.recv() => info!(?event, "session changed"),
        }
    };

    panel.reconciler.dispose();
    monitor.stop();
    Ok(exit)
}
