//! The structured proposal contract, embedded as a JSON Schema document.
//!
//! The schema only checks field types. Which fields must be present depends on
//! what the caller is about to do with the proposal, see [`crate::ProposalUse`].

use std::sync::OnceLock;

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::error::{GogoError, Result};

const PROPOSAL_SCHEMA: &str = include_str!("schemas/proposal.schema.json");

fn compiled() -> std::result::Result<&'static JSONSchema, String> {
    static SCHEMA: OnceLock<std::result::Result<JSONSchema, String>> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            let value: Value = serde_json::from_str(PROPOSAL_SCHEMA)
                .map_err(|e| format!("failed to parse proposal schema: {e}"))?;
            JSONSchema::options()
                .with_draft(Draft::Draft7)
                .compile(&value)
                .map_err(|e| format!("failed to compile proposal schema: {e}"))
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// Validate a parsed document against the proposal contract.
///
/// All violations are collected into one `SchemaViolation` so the whole list can
/// be shown to a human at once.
pub fn validate_document(document: &Value) -> Result<()> {
    let schema = compiled().map_err(GogoError::schema)?;

    if let Err(errors) = schema.validate(document) {
        let messages: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                let path = if path.is_empty() {
                    "root".to_string()
                } else {
                    path
                };
                format!("{e} at '{path}'")
            })
            .collect();

        return Err(GogoError::schema(format!(
            "{} error{}:\n  - {}",
            messages.len(),
            if messages.len() == 1 { "" } else { "s" },
            messages.join("\n  - ")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn embedded_schema_compiles() {
        assert!(compiled().is_ok());
    }

    #[test]
    fn empty_object_is_accepted() {
        assert!(validate_document(&json!({})).is_ok());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let doc = json!({ "patch": "diff", "confidence": 0.4, "extra": { "a": 1 } });
        assert!(validate_document(&doc).is_ok());
    }

    #[test]
    fn errors_accepts_text_or_mapping() {
        assert!(validate_document(&json!({ "errors": "tests were skipped" })).is_ok());
        assert!(validate_document(&json!({ "errors": { "build": "failed" } })).is_ok());
        assert!(validate_document(&json!({ "errors": ["a", "b"] })).is_err());
    }

    #[test]
    fn wrong_types_are_reported_with_their_location() {
        let doc = json!({ "files": { "a.txt": 3 }, "commit_message": false });
        let err = validate_document(&doc).unwrap_err();
        let detail = match err {
            GogoError::SchemaViolation { detail } => detail,
            other => panic!("unexpected error {other:?}"),
        };
        assert!(detail.starts_with("2 errors"), "{detail}");
        assert!(detail.contains("/files/a.txt"), "{detail}");
        assert!(detail.contains("/commit_message"), "{detail}");
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(validate_document(&json!(["patch"])).is_err());
        assert!(validate_document(&json!("patch")).is_err());
    }
}
