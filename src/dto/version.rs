use serde::{Deserialize, Serialize};

use super::ApiEnvelope;

/// `data` of `GET /api/version`: either a bare version string or a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionData {
    Text(String),
    Record(VersionFields),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionFields {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub build_date: Option<String>,
    #[serde(default)]
    pub remote_version: Option<String>,
}

pub type VersionEnvelope = ApiEnvelope<VersionData>;

/// What a successful local query yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVersion {
    pub version: Option<String>,
    pub build_date: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl VersionEnvelope {
    fn text_fallback(&self) -> Option<String> {
        non_empty(self.msg.as_deref())
    }

    /// Local installation: `data.version` / `data.buildDate`, or `data` as text,
    /// falling back to `msg` when `data` is absent or empty.
    pub fn local_version(&self) -> LocalVersion {
        match &self.data {
            Some(VersionData::Record(fields)) => LocalVersion {
                version: non_empty(fields.version.as_deref()),
                build_date: non_empty(fields.build_date.as_deref()),
            },
            Some(VersionData::Text(text)) => LocalVersion {
                version: non_empty(Some(text.as_str())).or_else(|| self.text_fallback()),
                build_date: None,
            },
            None => LocalVersion {
                version: self.text_fallback(),
                build_date: None,
            },
        }
    }

    /// Latest published release: `data.remoteVersion` (or `data.version`), or `data` as text.
    pub fn remote_version(&self) -> Option<String> {
        match &self.data {
            Some(VersionData::Record(fields)) => non_empty(fields.remote_version.as_deref())
                .or_else(|| non_empty(fields.version.as_deref())),
            Some(VersionData::Text(text)) => {
                non_empty(Some(text.as_str())).or_else(|| self.text_fallback())
            }
            None => self.text_fallback(),
        }
    }
}
