use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use crate::contracts::ToolFailure;
use crate::contracts::VersionControl;

/// [`VersionControl`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    /// Open the working tree containing `path`. Fails when it is not inside a repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ToolFailure> {
        let path = path.as_ref();
        let output = run_git_checked(path, ["rev-parse", "--show-toplevel"])?;
        let root = PathBuf::from(stdout_text(&output).trim());
        tracing::info!(root = %root.display(), "opened git repository");
        Ok(Self { root })
    }

    fn run<I, S>(&self, args: I) -> Result<Output, ToolFailure>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        run_git_checked(&self.root, args)
    }

    pub fn is_clean(&self) -> Result<bool, ToolFailure> {
        let output = self.run(["status", "--porcelain"])?;
        Ok(stdout_text(&output).trim().is_empty())
    }

    pub fn branch_exists(&self, branch: &str) -> bool {
        let reference = format!("refs/heads/{branch}");
        self.run(["show-ref", "--verify", "--quiet", reference.as_str()])
            .is_ok()
    }

    /// Check out `branch`, creating it from the current HEAD when it does not exist yet.
    pub fn switch_or_create_branch(&self, branch: &str) -> Result<(), ToolFailure> {
        if self.branch_exists(branch) {
            self.run(["checkout", branch])?;
        } else {
            tracing::info!(%branch, "branch does not exist, creating it");
            self.run(["checkout", "-b", branch])?;
        }
        Ok(())
    }

    /// Push the checked-out branch to `origin` and track it there.
    pub fn push_current_branch(&self) -> Result<(), ToolFailure> {
        self.run(["push", "--set-upstream", "origin", "HEAD"])?;
        tracing::info!(root = %self.root.display(), "pushed current branch");
        Ok(())
    }
}

impl VersionControl for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    fn control_dir(&self) -> Result<PathBuf, ToolFailure> {
        let output = self.run(["rev-parse", "--absolute-git-dir"])?;
        Ok(PathBuf::from(stdout_text(&output).trim()))
    }

    fn apply(&self, patch_file: &Path) -> Result<(), ToolFailure> {
        self.run([OsStr::new("apply"), patch_file.as_os_str()])?;
        Ok(())
    }

    fn add(&self, path: &str) -> Result<(), ToolFailure> {
        self.run(["add", "--", path])?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String, ToolFailure> {
        self.run(["commit", "-m", message])?;
        let output = self.run(["rev-parse", "HEAD"])?;
        Ok(stdout_text(&output).trim().to_string())
    }

    fn unstaged_paths(&self) -> Result<Vec<String>, ToolFailure> {
        let output = self.run(["status", "--porcelain=v1", "-z", "--untracked-files=all"])?;
        Ok(parse_unstaged(&stdout_text(&output)))
    }

    fn has_staged_changes(&self) -> Result<bool, ToolFailure> {
        let output = run_git(&self.root, ["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(failure(["diff", "--cached", "--quiet"], &output)),
        }
    }
}

const GITHUB_REMOTE: &str = "git@github.com:";

/// Resolve `base_dir/org/repo`, cloning it from GitHub when it is missing.
pub fn ensure_checkout(base_dir: &Path, org: &str, repo: &str) -> Result<PathBuf, ToolFailure> {
    ensure_checkout_from(GITHUB_REMOTE, base_dir, org, repo)
}

/// As [`ensure_checkout`], cloning from `{remote}{org}/{repo}.git`. Returns an absolute path.
pub fn ensure_checkout_from(
    remote: &str,
    base_dir: &Path,
    org: &str,
    repo: &str,
) -> Result<PathBuf, ToolFailure> {
    let org_dir = base_dir.join(org);
    let repo_path = org_dir.join(repo);
    if !repo_path.exists() {
        std::fs::create_dir_all(&org_dir).map_err(|err| ToolFailure {
            command: format!("mkdir {}", org_dir.display()),
            diagnostic: err.to_string(),
        })?;
        let url = format!("{remote}{org}/{repo}.git");
        tracing::info!(%url, path = %repo_path.display(), "cloning repository");
        // The destination is relative to the clone's working directory.
        run_git_checked(&org_dir, ["clone", url.as_str(), repo])?;
    } else if !repo_path.join(".git").exists() {
        return Err(ToolFailure {
            command: format!("open {}", repo_path.display()),
            diagnostic: "path exists but is not a git repository".to_string(),
        });
    }
    repo_path.canonicalize().map_err(|err| ToolFailure {
        command: format!("open {}", repo_path.display()),
        diagnostic: err.to_string(),
    })
}

/// Paths from `git status --porcelain=v1 -z` output whose work-tree column shows a change.
///
/// Entries are NUL-terminated and unquoted. A rename or copy entry is followed by
/// its source path, which is skipped.
fn parse_unstaged(status: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut entries = status.split('\0');
    while let Some(entry) = entries.next() {
        let bytes = entry.as_bytes();
        if bytes.len() < 4 {
            continue;
        }
        if matches!(bytes[0], b'R' | b'C') {
            entries.next();
        }
        if bytes[1] != b' ' {
            paths.push(entry[3..].to_string());
        }
    }
    paths
}

fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn run_git<I, S>(cwd: &Path, args: I) -> Result<Output, ToolFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    tracing::debug!(command = %command_line(&args), cwd = %cwd.display(), "running git");
    Command::new("git")
        .current_dir(cwd)
        .args(&args)
        .output()
        .map_err(|err| ToolFailure {
            command: command_line(&args),
            diagnostic: err.to_string(),
        })
}

fn run_git_checked<I, S>(cwd: &Path, args: I) -> Result<Output, ToolFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let output = run_git(cwd, &args)?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(failure(&args, &output))
    }
}

fn failure<I, S>(args: I, output: &Output) -> ToolFailure
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let diagnostic = if stderr.is_empty() {
        let stdout = stdout_text(output).trim().to_string();
        if stdout.is_empty() {
            format!("git exited with status {}", output.status)
        } else {
            stdout
        }
    } else {
        stderr
    };
    ToolFailure {
        command: command_line(&args),
        diagnostic,
    }
}

fn command_line<S: AsRef<OsStr>>(args: &[S]) -> String {
    let mut line = String::from("git");
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}
