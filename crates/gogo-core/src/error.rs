use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GogoError>;

/// Every failure a pipeline run can end with. None of these are retried.
#[derive(Debug, Error)]
pub enum GogoError {
    #[error("malformed structured response: {source}")]
    MalformedResponse {
        raw: String,
        source: serde_json::Error,
    },

    #[error("proposal violates schema contract: {detail}")]
    SchemaViolation { detail: String },

    #[error("path {path} resolves outside {}", target.display())]
    PathEscape { path: String, target: PathBuf },

    #[error("failed to install {}: {source}", path.display())]
    InstallFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("patch did not apply: {diagnostic}")]
    PatchApplyFailure { diagnostic: String },

    #[error("failed to stage {path}: {diagnostic}")]
    StageFailure { path: String, diagnostic: String },

    #[error("invalid selection {input:?}: {detail}")]
    SelectionError { input: String, detail: String },

    #[error("commit failed: {detail}")]
    CommitFailure { detail: String },

    #[error("suggestion source failed: {detail}")]
    Upstream { detail: String },

    #[error("configuration error in {}: {detail}", path.display())]
    Config { path: PathBuf, detail: String },
}

impl GogoError {
    /// Name of the pipeline step that detected the failure.
    pub fn step(&self) -> &'static str {
        match self {
            Self::MalformedResponse { .. } => "parse",
            Self::SchemaViolation { .. } => "validate",
            Self::PathEscape { .. } | Self::InstallFailure { .. } => "install",
            Self::PatchApplyFailure { .. } => "apply",
            Self::StageFailure { .. } => "stage",
            Self::SelectionError { .. } => "select",
            Self::CommitFailure { .. } => "commit",
            Self::Upstream { .. } => "suggest",
            Self::Config { .. } => "config",
        }
    }

    pub fn schema(detail: impl Into<String>) -> Self {
        Self::SchemaViolation {
            detail: detail.into(),
        }
    }
}
