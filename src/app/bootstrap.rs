use std::sync::Arc;

use crate::{
    domain::traits::{Gateway, Reloader},
    error::AppError,
    infra::{config::AppConfig, copilot::CopilotClient, session::SessionStore},
    services::{
        version_reconciler::ReconcilerSettings, ProgressMonitor, VersionReconciler,
    },
};

#[derive(Clone)]
pub struct PanelState {
    pub config: AppConfig,
    pub session: SessionStore,
    pub client: Arc<CopilotClient>,
    pub gateway: Arc<dyn Gateway>,
    pub reconciler: VersionReconciler,
}

impl PanelState {
    /// A new monitor for one consumer; monitors never share polling state.
    pub fn progress_monitor(&self) -> ProgressMonitor {
        ProgressMonitor::new(
            self.gateway.clone(),
            self.config.progress_interval,
            self.config.success_codes.clone(),
        )
    }
}

pub fn build_panel(config: AppConfig, reloader: Arc<dyn Reloader>) -> Result<PanelState, AppError> {
    let session = SessionStore::new(config.token.clone());
    let client = Arc::new(CopilotClient::new_from_config(&config, session.clone())?);
    let gateway: Arc<dyn Gateway> = client.clone();

    let reconciler = VersionReconciler::new(
        gateway.clone(),
        reloader,
        ReconcilerSettings::from(&config),
        config.success_codes.clone(),
    );

    Ok(PanelState {
        config,
        session,
        client,
        gateway,
        reconciler,
    })
}
