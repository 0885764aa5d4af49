use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use gogo_core::Result;

/// A version-control invocation that did not succeed, with the tool's own output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub command: String,
    pub diagnostic: String,
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` failed: {}", self.command, self.diagnostic)
    }
}

impl std::error::Error for ToolFailure {}

/// The narrow slice of a version-control system the pipeline relies on.
///
/// Every call blocks until the underlying tool has finished.
pub trait VersionControl {
    /// Root of the working tree.
    fn root(&self) -> &Path;

    /// Directory the tool keeps its own state in; never part of the tracked tree.
    fn control_dir(&self) -> std::result::Result<PathBuf, ToolFailure>;

    fn apply(&self, patch_file: &Path) -> std::result::Result<(), ToolFailure>;

    fn add(&self, path: &str) -> std::result::Result<(), ToolFailure>;

    /// Commit what is staged and return the new commit identifier.
    fn commit(&self, message: &str) -> std::result::Result<String, ToolFailure>;

    /// Paths with working-tree changes that are not staged, untracked files included.
    fn unstaged_paths(&self) -> std::result::Result<Vec<String>, ToolFailure>;

    fn has_staged_changes(&self) -> std::result::Result<bool, ToolFailure>;
}

/// Asks a human which of the listed paths to stage. Returns the raw answer.
pub trait SelectionPrompt {
    fn select(&self, candidates: &[String]) -> std::io::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    pub org: String,
    pub repo: String,
    pub issue: u64,
}

impl IssueRef {
    pub fn fix_branch(&self) -> String {
        format!("copilot-proposed-fixes-for-issue-{}", self.issue)
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.org, self.repo, self.issue)
    }
}

/// Produces raw suggestion text for an issue. Failures are opaque `Upstream` errors.
pub trait SuggestionSource {
    fn suggest(&self, request: &IssueRef) -> Result<String>;
}

/// The account the external tooling is authenticated as.
pub trait AuthenticatedIdentity {
    fn username(&self) -> Result<String>;
}
