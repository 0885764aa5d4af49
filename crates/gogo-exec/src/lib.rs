pub mod contracts;
pub mod git;
pub mod install;
pub mod patch;
pub mod pipeline;
pub mod staging;
pub mod suggest;

#[cfg(test)]
mod test_support;

pub use contracts::*;
pub use git::{ensure_checkout, ensure_checkout_from, GitCli};
pub use install::{contained_path, install_files};
pub use patch::apply_patch;
pub use pipeline::{Pipeline, PipelineReport};
pub use staging::{change_set, changed_paths_from_patch, parse_selection, CommitOutcome, StagingOrchestrator};
pub use suggest::{compose_prompt, CommandSuggestionSource, GhIdentity};
