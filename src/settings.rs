use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dataset::{COMPANIES_DATASET, FIRST_YEAR};
use crate::error::{CeapError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Where the yearly reimbursement and companies files live. Empty means
    /// `<data_dir>/datasets`.
    #[serde(default)]
    pub datasets_dir: String,
    #[serde(default = "default_companies_dataset")]
    pub companies_dataset: String,
    #[serde(default = "default_first_year")]
    pub first_year: i32,
}

fn default_companies_dataset() -> String {
    COMPANIES_DATASET.to_string()
}

fn default_first_year() -> i32 {
    FIRST_YEAR
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            datasets_dir: String::new(),
            companies_dataset: default_companies_dataset(),
            first_year: default_first_year(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("ceap.db")
    }

    pub fn datasets_path(&self) -> PathBuf {
        if self.datasets_dir.is_empty() {
            PathBuf::from(&self.data_dir).join("datasets")
        } else {
            PathBuf::from(&self.datasets_dir)
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ceap")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("ceap")
}

/// Settings from disk, falling back to defaults when the file is missing or
/// unreadable.
pub fn load_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    let content = std::fs::read_to_string(&path).unwrap_or_default();
    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
        Settings::default()
    })
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CeapError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
