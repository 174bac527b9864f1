use crate::error::AppError;

pub type ServiceResult<T> = Result<T, AppError>;

pub mod progress_monitor;
pub mod version_reconciler;

// Re-export para imports simples: `use crate::services::ProgressMonitor;`
pub use progress_monitor::ProgressMonitor;
pub use version_reconciler::VersionReconciler;
