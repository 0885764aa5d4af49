use gogo_core::{GogoError, InstallMechanism, Proposal, ProposalUse, Result};
use tracing::Dispatch;

use crate::contracts::SelectionPrompt;
use crate::contracts::VersionControl;
use crate::install::install_files;
use crate::patch::apply_patch;
use crate::staging::StagingOrchestrator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub mechanism: InstallMechanism,
    pub staged: Vec<String>,
    pub commit_id: String,
}

/// Applies one proposal to a working tree and commits it.
///
/// Steps run in order and stop at the first failure. Completed steps are not undone.
pub struct Pipeline<'a> {
    vcs: &'a dyn VersionControl,
    prompt: Option<&'a dyn SelectionPrompt>,
    dispatch: Option<Dispatch>,
}

impl<'a> Pipeline<'a> {
    pub fn new(vcs: &'a dyn VersionControl) -> Self {
        Self {
            vcs,
            prompt: None,
            dispatch: None,
        }
    }

    pub fn interactive(mut self, prompt: &'a dyn SelectionPrompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Route this pipeline's events to `dispatch` instead of the ambient subscriber.
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn run(&self, proposal: &Proposal) -> Result<PipelineReport> {
        match &self.dispatch {
            Some(dispatch) => {
                tracing::dispatcher::with_default(dispatch, || self.run_steps(proposal))
            }
            None => self.run_steps(proposal),
        }
    }

    fn run_steps(&self, proposal: &Proposal) -> Result<PipelineReport> {
        let root = self.vcs.root();
        let span = tracing::info_span!("pipeline", root = %root.display());
        let _entered = span.enter();

        if let Some(install) = proposal.install() {
            tracing::info!(notes = %install, "manual install instructions");
        }
        if let Some(errors) = proposal.errors() {
            tracing::warn!(notes = %errors, "suggestion source reported problems");
        }

        // An uncommittable proposal must not touch the tree.
        proposal.require(ProposalUse::Commit)?;
        let mechanism = proposal.mechanism().ok_or_else(|| {
            GogoError::schema("proposal carries neither a patch nor files to install")
        })?;
        match mechanism {
            InstallMechanism::Patch => {
                proposal.require(ProposalUse::Patch)?;
                apply_patch(proposal.patch().unwrap_or_default(), self.vcs)?;
            }
            InstallMechanism::Files => {
                proposal.require(ProposalUse::Install)?;
                install_files(proposal.files(), root)?;
            }
        }

        let mut orchestrator = StagingOrchestrator::new(self.vcs);
        if let Some(prompt) = self.prompt {
            orchestrator = orchestrator.with_prompt(prompt);
        }
        let outcome = orchestrator.stage_and_commit(proposal)?;

        Ok(PipelineReport {
            mechanism,
            staged: outcome.staged,
            commit_id: outcome.commit_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::Mutex;

    use gogo_core::parse;
    use gogo_core::parse_structured;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::git::GitCli;
    use crate::test_support::add_file_patch;
    use crate::test_support::leftover_scratch_files;
    use crate::test_support::make_repo_fixture;
    use crate::test_support::modify_app_patch;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("lock")).into_owned()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capturing_dispatch() -> (Dispatch, CapturedLogs) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        (Dispatch::new(subscriber), logs)
    }

    #[test]
    fn structured_patch_end_to_end() {
        let fixture = make_repo_fixture();
        let git = GitCli::open(fixture.path()).expect("open");
        let document = json!({
            "patch": add_file_patch("file.txt", "hello"),
            "commit_message": "fix bug"
        });
        let proposal = parse_structured(&document.to_string()).expect("structured");

        let report = Pipeline::new(&git).run(&proposal).expect("run");
        assert_eq!(report.mechanism, InstallMechanism::Patch);
        assert_eq!(report.staged, vec!["file.txt".to_string()]);
        assert!(!report.commit_id.is_empty());
        assert_eq!(
            fs::read_to_string(fixture.path().join("file.txt")).expect("read"),
            "hello\n"
        );
        let control = git.control_dir().expect("git dir");
        assert_eq!(leftover_scratch_files(&control), Vec::<String>::new());
    }

    #[test]
    fn text_mode_files_end_to_end() {
        let fixture = make_repo_fixture();
        let git = GitCli::open(fixture.path()).expect("open");
        let mut proposal = parse("Use this fix:\n```src/app.py\nprint('x')\n```\n");
        proposal.set_commit_message(Some("apply text suggestion".to_string()));

        let report = Pipeline::new(&git).run(&proposal).expect("run");
        assert_eq!(report.mechanism, InstallMechanism::Files);
        assert_eq!(report.staged, vec!["src/app.py".to_string()]);
        assert_eq!(
            fs::read_to_string(fixture.path().join("src/app.py")).expect("read"),
            "print('x')"
        );
    }

    #[test]
    fn missing_commit_message_fails_before_the_tree_is_touched() {
        let fixture = make_repo_fixture();
        let git = GitCli::open(fixture.path()).expect("open");
        let proposal = parse_structured(&json!({ "patch": modify_app_patch() }).to_string())
            .expect("structured");

        let err = Pipeline::new(&git).run(&proposal).unwrap_err();
        assert!(matches!(err, GogoError::CommitFailure { .. }));
        assert_eq!(err.step(), "commit");
        assert!(git.is_clean().expect("status"));
    }

    #[test]
    fn proposal_without_changes_fails_validation() {
        let fixture = make_repo_fixture();
        let git = GitCli::open(fixture.path()).expect("open");
        let mut proposal = parse("Nothing to do.");
        proposal.set_commit_message(Some("m".to_string()));
        let err = Pipeline::new(&git).run(&proposal).unwrap_err();
        assert_eq!(err.step(), "validate");
    }

    #[test]
    fn escaping_file_stops_before_staging() {
        let fixture = make_repo_fixture();
        let git = GitCli::open(fixture.path()).expect("open");
        let proposal = parse_structured(
            &json!({
                "files": { "../outside.txt": "x" },
                "commit_message": "escape"
            })
            .to_string(),
        )
        .expect("structured");
        let err = Pipeline::new(&git).run(&proposal).unwrap_err();
        assert!(matches!(err, GogoError::PathEscape { .. }));
        assert!(git.is_clean().expect("status"));
    }

    #[test]
    fn files_aimed_at_the_control_dir_never_reach_it() {
        let fixture = make_repo_fixture();
        let git = GitCli::open(fixture.path()).expect("open");
        let config_path = fixture.path().join(".git/config");
        let before = fs::read_to_string(&config_path).expect("read config");
        let marker = fixture.path().join("marker");
        let hostile = format!(
            "[core]\n\tfsmonitor = \"touch {}; false\"\n",
            marker.display()
        );
        let proposal = parse_structured(
            &json!({
                "files": { ".git/config": hostile, "new.txt": "x" },
                "commit_message": "innocent"
            })
            .to_string(),
        )
        .expect("structured");

        let err = Pipeline::new(&git).run(&proposal).unwrap_err();
        assert!(matches!(err, GogoError::PathEscape { .. }));
        assert_eq!(fs::read_to_string(&config_path).expect("read config"), before);
        assert!(!marker.exists());
        assert!(git.is_clean().expect("status"));
    }

    #[test]
    fn events_go_to_the_supplied_dispatch() {
        let fixture = make_repo_fixture();
        let git = GitCli::open(fixture.path()).expect("open");
        let proposal = parse_structured(
            &json!({
                "patch": modify_app_patch(),
                "commit_message": "logged",
                "install": "pip install -e .",
                "errors": "tests not run"
            })
            .to_string(),
        )
        .expect("structured");

        let (dispatch, logs) = capturing_dispatch();
        Pipeline::new(&git)
            .dispatch(dispatch)
            .run(&proposal)
            .expect("run");

        let text = logs.text();
        assert!(text.contains("manual install instructions"), "{text}");
        assert!(text.contains("suggestion source reported problems"), "{text}");
        assert!(text.contains("patch applied"), "{text}");
        assert!(text.contains("committed proposal"), "{text}");
    }
}
