use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::{GogoError, Result};
use crate::schema::validate_document;

pub const DEFAULT_VERSION: &str = "v0.1";

/// Notes the suggestion source reported about its own output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorNotes {
    Text(String),
    Fields(BTreeMap<String, Value>),
}

impl std::fmt::Display for ErrorNotes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Fields(fields) => {
                let mut first = true;
                for (key, value) in fields {
                    if !first {
                        f.write_str("; ")?;
                    }
                    first = false;
                    match value {
                        Value::String(text) => write!(f, "{key}: {text}")?,
                        other => write!(f, "{key}: {other}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// What a caller is about to do with a proposal. Each use has its own required fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalUse {
    Install,
    Patch,
    Commit,
}

/// How a proposal mutates the working tree. A patch wins when both are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMechanism {
    Patch,
    Files,
}

/// Canonical representation of one suggested change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    explanation: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    files: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    commit_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    install: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    errors: Option<ErrorNotes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gadget: Option<String>,
    #[serde(default = "default_version")]
    version: String,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl Default for Proposal {
    fn default() -> Self {
        Self {
            explanation: String::new(),
            files: BTreeMap::new(),
            patch: None,
            commit_message: None,
            install: None,
            errors: None,
            gadget: None,
            version: default_version(),
        }
    }
}

impl Proposal {
    /// Build a proposal from an already parsed JSON document, validating it first.
    pub fn from_document(document: Value) -> Result<Self> {
        validate_document(&document)?;
        serde_json::from_value(document).map_err(|e| GogoError::schema(e.to_string()))
    }

    /// Canonical pretty JSON form. Parsing it back yields an equal proposal.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Check the fields the given use depends on.
    pub fn require(&self, intended: ProposalUse) -> Result<()> {
        match intended {
            ProposalUse::Install if self.files.is_empty() => Err(GogoError::schema(
                "files is required to install a proposal",
            )),
            ProposalUse::Patch if self.patch().is_none() => Err(GogoError::schema(
                "patch is required to apply a proposal",
            )),
            ProposalUse::Commit if self.commit_message().is_none() => {
                Err(GogoError::CommitFailure {
                    detail: "proposal has no commit message".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn mechanism(&self) -> Option<InstallMechanism> {
        if self.patch().is_some() {
            Some(InstallMechanism::Patch)
        } else if !self.files.is_empty() {
            Some(InstallMechanism::Files)
        } else {
            None
        }
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    /// The patch text, or `None` when absent or blank.
    pub fn patch(&self) -> Option<&str> {
        non_blank(self.patch.as_deref())
    }

    /// The commit message, or `None` when absent or blank.
    pub fn commit_message(&self) -> Option<&str> {
        non_blank(self.commit_message.as_deref())
    }

    pub fn install(&self) -> Option<&str> {
        self.install.as_deref()
    }

    pub fn errors(&self) -> Option<&ErrorNotes> {
        self.errors.as_ref()
    }

    pub fn gadget(&self) -> Option<&str> {
        self.gadget.as_deref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    // Setters do not re-run validation.

    pub fn set_explanation(&mut self, explanation: impl Into<String>) {
        tracing::debug!("setting proposal explanation");
        self.explanation = explanation.into();
    }

    pub fn set_files(&mut self, files: BTreeMap<String, String>) {
        tracing::debug!(count = files.len(), "setting proposal files");
        self.files = files;
    }

    pub fn set_patch(&mut self, patch: Option<String>) {
        tracing::debug!("setting proposal patch");
        self.patch = patch;
    }

    pub fn set_commit_message(&mut self, message: Option<String>) {
        tracing::debug!("setting proposal commit message");
        self.commit_message = message;
    }

    pub fn set_install(&mut self, install: Option<String>) {
        self.install = install;
    }

    pub fn set_errors(&mut self, errors: Option<ErrorNotes>) {
        self.errors = errors;
    }

    pub fn set_gadget(&mut self, gadget: Option<String>) {
        self.gadget = gadget;
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}
