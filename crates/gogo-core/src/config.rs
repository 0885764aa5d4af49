use std::path::Path;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GogoError, Result};

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub suggestion: SuggestionConfig,
    pub workspace: WorkspaceConfig,
}

impl Config {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|err| GogoError::Config {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;
        toml::from_str(&text).map_err(|err| GogoError::Config {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SuggestionConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub preamble_path: Option<PathBuf>,
    pub postamble_path: Option<PathBuf>,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            program: "gh".to_string(),
            args: ["copilot", "suggest", "--type", "code", "--no-interactive"]
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
            env: vec![
                (
                    "GH_COPILOT_NO_USAGE_STATS_PROMPT".to_string(),
                    "1".to_string(),
                ),
                ("GH_COPILOT_INTERACTIVE".to_string(), "false".to_string()),
            ],
            preamble_path: None,
            postamble_path: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub base_dir: PathBuf,
    pub interactive: bool,
    pub branch_per_issue: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            interactive: false,
            branch_per_issue: true,
        }
    }
}
