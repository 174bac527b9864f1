use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::models::TaskState;

use super::ApiEnvelope;

/// `data` of `GET /api/progress/{taskId}`.
///
/// The backend names the field `status`; `state` is accepted too. Anything else
/// (percentage, messages) stays opaque in `payload`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    #[serde(default, alias = "status", skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskState>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl TaskProgress {
    pub fn is_completed(&self) -> bool {
        self.state.as_ref().is_some_and(TaskState::is_completed)
    }
}

pub type ProgressEnvelope = ApiEnvelope<TaskProgress>;
