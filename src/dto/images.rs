use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of `GET /api/images`. Only `id` is relied upon; the rest is passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageInfo {
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}
