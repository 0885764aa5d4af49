use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use gogo_core::config::SuggestionConfig;
use gogo_core::{GogoError, Result};

use crate::contracts::AuthenticatedIdentity;
use crate::contracts::IssueRef;
use crate::contracts::SuggestionSource;

fn upstream(detail: impl Into<String>) -> GogoError {
    GogoError::Upstream {
        detail: detail.into(),
    }
}

/// Build the request sent to the suggestion source for `request`.
pub fn compose_prompt(preamble: &str, request: &IssueRef, postamble: &str) -> String {
    let IssueRef { org, repo, issue } = request;
    let body = format!(
        "Please review the issue at @{org}/{repo}/issue/{issue} including all of the comments. \
Examine the contents of branch {branch} of the repo at {org}/{repo} if it exists, \
and use it as a basis for a proposed or modified solution to the issue. \
The proposed solution should include an EXPLANATION of the approach and any files needed to implement the proposed solution.",
        branch = request.fix_branch(),
    );
    format!("{preamble}\n{body}\n{postamble}")
}

fn read_prompt_file(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(String::new());
    };
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "prompt file missing, using empty text");
            Ok(String::new())
        }
        Err(err) => Err(GogoError::Config {
            path: path.to_path_buf(),
            detail: err.to_string(),
        }),
    }
}

/// Runs an external program with the composed prompt on stdin and returns its stdout.
#[derive(Debug, Clone)]
pub struct CommandSuggestionSource {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    preamble: String,
    postamble: String,
}

impl CommandSuggestionSource {
    pub fn from_config(config: &SuggestionConfig) -> Result<Self> {
        Ok(Self {
            program: config.program.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            preamble: read_prompt_file(config.preamble_path.as_deref())?,
            postamble: read_prompt_file(config.postamble_path.as_deref())?,
        })
    }

    pub fn prompt_for(&self, request: &IssueRef) -> String {
        compose_prompt(&self.preamble, request, &self.postamble)
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl SuggestionSource for CommandSuggestionSource {
    fn suggest(&self, request: &IssueRef) -> Result<String> {
        let prompt = self.prompt_for(request);
        tracing::info!(%request, command = %self.command_line(), "requesting suggestion");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.env.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| upstream(format!("failed to start {}: {err}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A source that exits without reading its input is judged by its status below.
            if let Err(err) = stdin.write_all(prompt.as_bytes()) {
                tracing::debug!(error = %err, "suggestion source closed stdin early");
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|err| upstream(format!("failed to wait for {}: {err}", self.program)))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if !stderr.is_empty() {
                stderr
            } else if !stdout.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                format!("`{}` exited with {}", self.command_line(), output.status)
            };
            tracing::error!(%request, %detail, "suggestion source failed");
            return Err(upstream(detail));
        }

        tracing::info!(%request, bytes = stdout.len(), "received suggestion");
        Ok(stdout)
    }
}

/// Reads the GitHub login the `gh` tool is authenticated as.
#[derive(Debug, Clone)]
pub struct GhIdentity {
    program: String,
}

impl Default for GhIdentity {
    fn default() -> Self {
        Self {
            program: "gh".to_string(),
        }
    }
}

impl GhIdentity {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl AuthenticatedIdentity for GhIdentity {
    fn username(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["api", "user", "--jq", ".login"])
            .output()
            .map_err(|err| upstream(format!("failed to start {}: {err}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(upstream(if stderr.is_empty() {
                format!("{} api user exited with {}", self.program, output.status)
            } else {
                stderr
            }));
        }
        let login = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if login.is_empty() {
            return Err(upstream("authenticated user has no login"));
        }
        Ok(login)
    }
}
