use async_trait::async_trait;

use crate::{
    domain::{models::VersionScope, value_objects::TaskId},
    dto::{progress::ProgressEnvelope, version::VersionEnvelope, ApiEnvelope},
    error::AppError,
};

/// The REST operations the task tracker and the version reconciler depend on.
///
/// Implementations return the decoded envelope as-is; envelope codes are judged by the caller
/// against its configured success codes. `Err` means no usable response was obtained.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn get_progress(&self, task_id: &TaskId) -> Result<ProgressEnvelope, AppError>;
    async fn get_version(&self, scope: VersionScope) -> Result<VersionEnvelope, AppError>;
    /// Not idempotent; callers must not retry automatically.
    async fn trigger_update(&self) -> Result<ApiEnvelope<serde_json::Value>, AppError>;
}

/// Performs a full environment reload once the backend has been updated.
pub trait Reloader: Send + Sync {
    fn reload(&self);
}
