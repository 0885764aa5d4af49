use std::fs;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use tempfile::TempDir;

pub(crate) fn run_git_ok(cwd: &Path, args: &[&str]) {
    let status = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("git command should execute");
    assert!(status.success(), "git {args:?} failed with {status}");
}

/// A clean repository with one commit containing `README.md` and `src/app.py`.
pub(crate) fn make_repo_fixture() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    run_git_ok(dir.path(), &["init"]);
    run_git_ok(dir.path(), &["config", "user.name", "Test User"]);
    run_git_ok(dir.path(), &["config", "user.email", "test@example.com"]);
    run_git_ok(dir.path(), &["config", "commit.gpgsign", "false"]);

    fs::write(dir.path().join("README.md"), "fixture\n").expect("write README");
    fs::create_dir_all(dir.path().join("src")).expect("mkdir src");
    fs::write(dir.path().join("src/app.py"), "print('old')\n").expect("write app");
    run_git_ok(dir.path(), &["add", "."]);
    run_git_ok(dir.path(), &["commit", "-m", "init"]);
    dir
}

/// Unified diff creating `path` with a single line.
pub(crate) fn add_file_patch(path: &str, line: &str) -> String {
    format!(
        "diff --git a/{path} b/{path}\nnew file mode 100644\n--- /dev/null\n+++ b/{path}\n@@ -0,0 +1 @@\n+{line}\n"
    )
}

/// Unified diff rewriting the fixture's `src/app.py`.
pub(crate) fn modify_app_patch() -> String {
    "diff --git a/src/app.py b/src/app.py\n--- a/src/app.py\n+++ b/src/app.py\n@@ -1 +1 @@\n-print('old')\n+print('new')\n"
        .to_string()
}

/// Names of scratch patch files left in the repository's control directory.
pub(crate) fn leftover_scratch_files(control_dir: &Path) -> Vec<String> {
    fs::read_dir(control_dir)
        .expect("read control dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(crate::patch::SCRATCH_PREFIX))
        .collect()
}
