use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::core::model::TabId;

/// Per-site inclusion pattern: on pages whose URL matches `site`, only
/// sources matching `pattern` are collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteFilter {
    pub site: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Crawl depth, 0 (page only) to 3 (expand linked pages and harvest
    /// their links too).
    pub deep: u8,
    /// Base network timeout; payload fetches scale it with declared size.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub default_download_dir: PathBuf,
    /// Individual-mode settling delay in milliseconds.
    pub settle_ms: u64,
    /// Archive release delay in milliseconds.
    pub grace_ms: u64,
    #[serde(default)]
    pub filters: Vec<SiteFilter>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            deep: 1,
            timeout_secs: 10,
            user_agent: "imgsweep/0.1".to_string(),
            default_download_dir: app_dirs().join("downloads"),
            settle_ms: 3000,
            grace_ms: 10_000,
            filters: Vec::new(),
        }
    }
}

/// First site filter whose pattern matches the page URL wins; filters with
/// invalid site patterns are skipped.
pub fn filter_for<'a>(settings: &'a Settings, url: &str) -> Option<&'a str> {
    for filter in &settings.filters {
        if let Ok(re) = regex::Regex::new(&filter.site) {
            if re.is_match(url) {
                return Some(&filter.pattern);
            }
        }
    }
    None
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: String,
    pub tab: TabId,
    pub filename: String,
    pub count: usize,
    pub mode: String, // zip | files
    pub created_at: i64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct History {
    pub items: Vec<DownloadRecord>,
}

pub fn app_dirs() -> PathBuf {
    let proj = ProjectDirs::from("com", "imgsweep", "imgsweep").expect("project dirs");
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).ok();
    data_dir.to_path_buf()
}

fn settings_path() -> PathBuf {
    app_dirs().join("settings.json")
}

pub fn history_path() -> PathBuf {
    app_dirs().join("history.json")
}

pub fn load_settings() -> Settings {
    read_settings(&settings_path())
}

fn read_settings(path: &Path) -> Settings {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => Settings::default(),
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let json = serde_json::to_vec_pretty(settings)?;
    fs::write(settings_path(), json)?;
    Ok(())
}

pub fn load_history() -> History {
    match fs::read(history_path()) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => History::default(),
    }
}

pub fn save_history(history: &History) -> Result<()> {
    let json = serde_json::to_vec_pretty(history)?;
    fs::write(history_path(), json)?;
    Ok(())
}

pub fn append_history(record: DownloadRecord) -> Result<()> {
    let mut history = load_history();
    history.items.push(record);
    save_history(&history)
}
