use std::{collections::BTreeMap, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One entry of `GET /api/containers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub using_image: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub running_time: Option<String>,
    #[serde(default)]
    pub have_update: bool,
}

impl ContainerInfo {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
}

impl ContainerAction {
    pub const fn as_path(&self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
            ContainerAction::Restart => "restart",
        }
    }
}

/// Form of `POST /api/container/{id}/update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateContainerRequest {
    pub image_name_and_tag: String,
    pub container_name: String,
    pub del_old_container: bool,
}

fn backup_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"backup-(\d{4}-\d{2}-\d{2})").expect("static backup pattern compiles")
    })
}

/// `YYYY-MM-DD` embedded in a `backup-YYYY-MM-DD...` file name.
pub fn backup_date(filename: &str) -> Option<&str> {
    backup_date_pattern()
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// File name without its `.json` / `.yaml` / `.yml` extension.
pub fn backup_display_name(filename: &str) -> &str {
    let lower = filename.to_ascii_lowercase();
    for ext in [".json", ".yaml", ".yml"] {
        if lower.ends_with(ext) {
            return &filename[..filename.len() - ext.len()];
        }
    }
    filename
}

/// Backups grouped by their date, newest date first. Undated files come last under `None`.
pub fn group_backups_by_date(backups: &[String]) -> Vec<(Option<String>, Vec<String>)> {
    let mut dated: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut undated = Vec::new();
    for backup in backups {
        match backup_date(backup) {
            Some(date) => dated.entry(date.to_string()).or_default().push(backup.clone()),
            None => undated.push(backup.clone()),
        }
    }

    let mut groups: Vec<(Option<String>, Vec<String>)> = dated
        .into_iter()
        .rev()
        .map(|(date, files)| (Some(date), files))
        .collect();
    if !undated.is_empty() {
        groups.push((None, undated));
    }
    groups
}
