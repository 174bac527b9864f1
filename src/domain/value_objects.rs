use std::{cmp::Ordering, fmt, ops::Deref, str::FromStr, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Sentinel used wherever a version could not be obtained.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Opaque identifier of a server-side task. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, AppError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation("task id cannot be empty".into()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for TaskId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for TaskId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// `MAJOR.MINOR.PATCH`, with any `-suffix` kept only in `raw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub raw: String,
}

fn semver_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-.+)?$").expect("static semver pattern compiles")
    })
}

impl SemVer {
    fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// Orders by (major, minor, patch) only; pre-release suffixes are ignored.
    pub fn precedence(&self, other: &SemVer) -> Ordering {
        self.triple().cmp(&other.triple())
    }
}

impl FromStr for SemVer {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = semver_pattern()
            .captures(s)
            .ok_or_else(|| AppError::Parse(format!("not a MAJOR.MINOR.PATCH version: {s:?}")))?;

        let component = |idx: usize| -> Result<u64, AppError> {
            caps[idx]
                .parse::<u64>()
                .map_err(|err| AppError::Parse(format!("version component out of range in {s:?}: {err}")))
        };

        Ok(SemVer {
            major: component(1)?,
            minor: component(2)?,
            patch: component(3)?,
            raw: s.to_string(),
        })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// True iff both versions parse and `latest` is strictly newer than `current`.
/// Non-comparable pairs (including the `unknown` sentinel) never signal an update.
pub fn should_update(current: &str, latest: &str) -> bool {
    if current == UNKNOWN_VERSION || latest == UNKNOWN_VERSION {
        return false;
    }
    match (current.parse::<SemVer>(), latest.parse::<SemVer>()) {
        (Ok(current), Ok(latest)) => latest.precedence(&current) == Ordering::Greater,
        _ => false,
    }
}

/// Envelope codes treated as success by the backend (`0` and `200` by default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessCodes(Vec<i64>);

impl SuccessCodes {
    pub fn new(codes: Vec<i64>) -> Result<Self, AppError> {
        if codes.is_empty() {
            return Err(AppError::Config("at least one success code is required".into()));
        }
        Ok(Self(codes))
    }

    pub fn contains(&self, code: i64) -> bool {
        self.0.contains(&code)
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }
}

impl Default for SuccessCodes {
    fn default() -> Self {
        Self(vec![0, 200])
    }
}

impl FromStr for SuccessCodes {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let codes = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i64>()
                    .map_err(|err| AppError::Config(format!("invalid success code {part:?}: {err}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(codes)
    }
}
