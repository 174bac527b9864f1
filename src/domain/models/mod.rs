use std::fmt;

use serde::{Deserialize, Serialize};

pub mod task_state;

pub use task_state::TaskState;

/// Which installation a version query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionScope {
    /// Currently installed backend.
    Local,
    /// Latest published release.
    Remote,
    /// No `type` parameter at all; the backend picks its default.
    Unspecified,
}

impl VersionScope {
    /// Value of the `type` query parameter, if any.
    pub fn query_value(&self) -> Option<&'static str> {
        match self {
            VersionScope::Local => Some("local"),
            VersionScope::Remote => Some("remote"),
            VersionScope::Unspecified => None,
        }
    }
}

impl fmt::Display for VersionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value().unwrap_or(""))
    }
}
