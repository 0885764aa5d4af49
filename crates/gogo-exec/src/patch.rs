//! Applies unified diffs through a scratch file kept in the repository's control directory.
//!
//! The scratch file is a [`tempfile::NamedTempFile`], so it is removed when this
//! module returns, whether the apply succeeded, failed, or unwound.

use std::io::Write;

use gogo_core::{GogoError, Result};
use tempfile::NamedTempFile;

use crate::contracts::VersionControl;

pub(crate) const SCRATCH_PREFIX: &str = ".gogo-patch-";

fn apply_failure(diagnostic: impl ToString) -> GogoError {
    GogoError::PatchApplyFailure {
        diagnostic: diagnostic.to_string(),
    }
}

/// Apply `patch_text` to the working tree of `vcs`.
///
/// A rejected patch is reported as-is for manual resolution; nothing is retried.
pub fn apply_patch(patch_text: &str, vcs: &dyn VersionControl) -> Result<()> {
    if patch_text.trim().is_empty() {
        return Err(GogoError::schema("patch is required to apply a proposal"));
    }

    let control_dir = vcs.control_dir().map_err(apply_failure)?;
    let mut scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .suffix(".diff")
        .tempfile_in(&control_dir)
        .map_err(apply_failure)?;
    write_patch(&mut scratch, patch_text).map_err(apply_failure)?;

    tracing::info!(
        scratch = %scratch.path().display(),
        bytes = patch_text.len(),
        "applying patch"
    );
    let applied = vcs.apply(scratch.path());

    let scratch_path = scratch.path().to_path_buf();
    if let Err(err) = scratch.close() {
        tracing::warn!(path = %scratch_path.display(), error = %err, "failed to remove scratch patch");
    }

    match applied {
        Ok(()) => {
            tracing::info!("patch applied");
            Ok(())
        }
        Err(failure) => {
            tracing::error!(diagnostic = %failure.diagnostic, "patch rejected");
            Err(GogoError::PatchApplyFailure {
                diagnostic: failure.diagnostic,
            })
        }
    }
}

// `git apply` rejects a final hunk line without its newline as a corrupt patch.
fn write_patch(scratch: &mut NamedTempFile, patch_text: &str) -> std::io::Result<()> {
    scratch.write_all(patch_text.as_bytes())?;
    if !patch_text.ends_with('\n') {
        scratch.write_all(b"\n")?;
    }
    scratch.flush()
}
