use std::path::Path;

use gogo_core::conversation::CONVERSATION_LOG_FILE;
use gogo_core::{GogoError, Proposal, ProposalUse, Result};

use crate::contracts::SelectionPrompt;
use crate::contracts::VersionControl;

const NULL_DEVICE: &str = "/dev/null";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub commit_id: String,
    pub staged: Vec<String>,
}

/// Destination paths named by a unified diff, in order of first appearance.
///
/// Only `+++` lines directly following a `---` header count, so added content
/// that happens to start with `++` is not mistaken for a header. Deletions
/// (`+++ /dev/null`) contribute nothing.
pub fn changed_paths_from_patch(patch: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let mut after_old_header = false;
    for line in patch.lines() {
        if let Some(target) = line.strip_prefix("+++ ").filter(|_| after_old_header) {
            let target = target.split('\t').next().unwrap_or(target).trim();
            let target = target.trim_matches('"');
            if target != NULL_DEVICE {
                let path = target.strip_prefix("b/").unwrap_or(target).to_string();
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        after_old_header = line.starts_with("--- ");
    }
    paths
}

/// Paths a proposal is expected to touch: the patch's targets, or the installed files.
pub fn change_set(proposal: &Proposal) -> Vec<String> {
    match proposal.patch() {
        Some(patch) => changed_paths_from_patch(patch),
        None => proposal.files().keys().cloned().collect(),
    }
}

/// Turn a selection answer into 0-based indices of the `listed` candidates.
///
/// Accepts `all`, `none` (or an empty answer) and comma-separated 1-based
/// numbers. Numbers outside the list are ignored; anything non-numeric fails.
pub fn parse_selection(input: &str, listed: usize) -> Result<Vec<usize>> {
    let answer = input.trim();
    if answer.eq_ignore_ascii_case("all") {
        return Ok((0..listed).collect());
    }
    if answer.is_empty() || answer.eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }

    let mut indices = Vec::new();
    for token in answer.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let number: usize = token.parse().map_err(|_| GogoError::SelectionError {
            input: input.to_string(),
            detail: format!("{token:?} is not a number, `all` or `none`"),
        })?;
        if (1..=listed).contains(&number) {
            let index = number - 1;
            if !indices.contains(&index) {
                indices.push(index);
            }
        } else {
            tracing::debug!(number, listed, "ignoring selection outside the list");
        }
    }
    Ok(indices)
}

/// Stages the change set of a proposal and commits it.
pub struct StagingOrchestrator<'a> {
    vcs: &'a dyn VersionControl,
    prompt: Option<&'a dyn SelectionPrompt>,
}

impl<'a> StagingOrchestrator<'a> {
    pub fn new(vcs: &'a dyn VersionControl) -> Self {
        Self { vcs, prompt: None }
    }

    /// Offer unstaged changes outside the change set for selection before committing.
    pub fn with_prompt(mut self, prompt: &'a dyn SelectionPrompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn stage_and_commit(&self, proposal: &Proposal) -> Result<CommitOutcome> {
        proposal.require(ProposalUse::Commit)?;
        let message = proposal.commit_message().unwrap_or_default();

        let mut staged = Vec::new();
        for path in change_set(proposal) {
            self.stage(&path, &mut staged)?;
        }

        if self.vcs.root().join(CONVERSATION_LOG_FILE).is_file() {
            self.stage(CONVERSATION_LOG_FILE, &mut staged)?;
        }

        if let Some(prompt) = self.prompt {
            self.stage_selected(prompt, &mut staged)?;
        }

        let has_staged = self
            .vcs
            .has_staged_changes()
            .map_err(|failure| GogoError::CommitFailure {
                detail: failure.to_string(),
            })?;
        if !has_staged {
            return Err(GogoError::CommitFailure {
                detail: "nothing staged to commit".to_string(),
            });
        }

        let commit_id = self
            .vcs
            .commit(message)
            .map_err(|failure| GogoError::CommitFailure {
                detail: failure.diagnostic,
            })?;
        tracing::info!(%commit_id, staged = staged.len(), "committed proposal");
        Ok(CommitOutcome { commit_id, staged })
    }

    fn stage(&self, path: &str, staged: &mut Vec<String>) -> Result<()> {
        if staged.iter().any(|done| done == path) {
            return Ok(());
        }
        self.vcs
            .add(path)
            .map_err(|failure| GogoError::StageFailure {
                path: path.to_string(),
                diagnostic: failure.diagnostic,
            })?;
        tracing::info!(%path, "staged");
        staged.push(path.to_string());
        Ok(())
    }

    fn stage_selected(
        &self,
        prompt: &dyn SelectionPrompt,
        staged: &mut Vec<String>,
    ) -> Result<()> {
        let candidates: Vec<String> = self
            .vcs
            .unstaged_paths()
            .map_err(|failure| GogoError::StageFailure {
                path: display_root(self.vcs.root()),
                diagnostic: failure.diagnostic,
            })?
            .into_iter()
            .filter(|path| !staged.contains(path))
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        let answer = prompt
            .select(&candidates)
            .map_err(|err| GogoError::SelectionError {
                input: String::new(),
                detail: err.to_string(),
            })?;
        for index in parse_selection(&answer, candidates.len())? {
            self.stage(&candidates[index], staged)?;
        }
        Ok(())
    }
}

fn display_root(root: &Path) -> String {
    root.display().to_string()
}
