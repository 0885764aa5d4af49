use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use gogo_core::{GogoError, Result};

/// Name of the repository control directory, which proposals may never write into.
const CONTROL_DIR: &str = ".git";

fn escape(relative: &str, target: &Path) -> GogoError {
    GogoError::PathEscape {
        path: relative.to_string(),
        target: target.to_path_buf(),
    }
}

fn is_control_dir(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|name| name.eq_ignore_ascii_case(CONTROL_DIR))
}

/// Resolve `relative` under `target`, refusing anything that would land outside it
/// or inside its control directory.
pub fn contained_path(target: &Path, relative: &str) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                normalized.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(escape(relative, target));
                }
                normalized.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return Err(escape(relative, target)),
        }
    }
    if depth == 0 {
        return Err(escape(relative, target));
    }
    if normalized
        .components()
        .next()
        .is_some_and(|first| is_control_dir(first.as_os_str()))
    {
        return Err(escape(relative, target));
    }
    Ok(target.join(normalized))
}

// `resolved` and `canonical_target` must both be canonical.
fn resolves_inside(resolved: &Path, canonical_target: &Path) -> bool {
    resolved.starts_with(canonical_target)
        && !resolved.starts_with(canonical_target.join(CONTROL_DIR))
}

/// Write every file under `target`, in path order, overwriting existing content.
///
/// Stops at the first failure. Files written before it stay written.
pub fn install_files(files: &BTreeMap<String, String>, target: &Path) -> Result<Vec<PathBuf>> {
    if files.is_empty() {
        return Err(GogoError::schema("files is required to install a proposal"));
    }

    let canonical_target = target
        .canonicalize()
        .map_err(|source| GogoError::InstallFailure {
            path: target.to_path_buf(),
            source,
        })?;

    let mut written = Vec::with_capacity(files.len());
    for (relative, content) in files {
        let destination = contained_path(target, relative)?;
        if let Some(parent) = destination.parent() {
            // A symlinked directory inside the target can still point elsewhere,
            // so the existing part of the parent chain is checked before anything is created.
            let existing = parent
                .ancestors()
                .find(|ancestor| ancestor.exists())
                .unwrap_or(target);
            let resolved = existing
                .canonicalize()
                .map_err(|source| GogoError::InstallFailure {
                    path: existing.to_path_buf(),
                    source,
                })?;
            if !resolves_inside(&resolved, &canonical_target) {
                return Err(escape(relative, target));
            }
            std::fs::create_dir_all(parent).map_err(|source| GogoError::InstallFailure {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        // Writing through a symlinked file follows the link.
        let is_link = std::fs::symlink_metadata(&destination)
            .is_ok_and(|meta| meta.file_type().is_symlink());
        if is_link {
            let resolved = destination
                .canonicalize()
                .map_err(|_| escape(relative, target))?;
            if !resolves_inside(&resolved, &canonical_target) {
                return Err(escape(relative, target));
            }
        }
        std::fs::write(&destination, content).map_err(|source| GogoError::InstallFailure {
            path: destination.clone(),
            source,
        })?;
        tracing::info!(path = %destination.display(), "installed file");
        written.push(destination);
    }
    Ok(written)
}
