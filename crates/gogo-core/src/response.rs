use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{GogoError, Result};
use crate::proposal::Proposal;
use crate::text::parse_text;

#[allow(clippy::expect_used)] // literal pattern
fn json_fence() -> &'static Regex {
    static JSON_FENCE: OnceLock<Regex> = OnceLock::new();
    JSON_FENCE.get_or_init(|| {
        // Both fences must open a line, so backticks inside JSON strings do not close it.
        Regex::new(r"(?ms)^[ \t]*```json[^\n]*\n(?P<json>.*?)^[ \t]*```[ \t]*\r?$")
            .expect("json fence pattern compiles")
    })
}

/// The recognized shape of a raw suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// A `json` fence is present, or the text itself looks like a JSON object.
    Structured,
    Freeform,
}

impl ResponseShape {
    pub fn detect(raw: &str) -> Self {
        if json_fence().is_match(raw) || raw.trim_start().starts_with('{') {
            Self::Structured
        } else {
            Self::Freeform
        }
    }
}

/// Candidate JSON document: the interior of the first `json` fence, or the whole input.
fn candidate_document(raw: &str) -> &str {
    json_fence()
        .captures(raw)
        .and_then(|caps| caps.name("json"))
        .map_or(raw, |m| m.as_str())
        .trim()
}

/// Strict structured parsing: locate, decode and validate the JSON document.
pub fn parse_structured(raw: &str) -> Result<Proposal> {
    let candidate = candidate_document(raw);
    let document: Value =
        serde_json::from_str(candidate).map_err(|source| GogoError::MalformedResponse {
            raw: raw.to_string(),
            source,
        })?;
    let proposal = Proposal::from_document(document)?;
    tracing::info!(
        gadget = proposal.gadget().unwrap_or("unknown"),
        version = proposal.version(),
        files = proposal.files().len(),
        has_patch = proposal.patch().is_some(),
        "parsed structured proposal"
    );
    Ok(proposal)
}

/// Best-effort parsing: structured first when the text looks structured, text mode otherwise.
pub fn parse(raw: &str) -> Proposal {
    match ResponseShape::detect(raw) {
        ResponseShape::Structured => match parse_structured(raw) {
            Ok(proposal) => proposal,
            Err(err) => {
                tracing::warn!(error = %err, "structured parse failed, falling back to text mode");
                parse_text(raw).into_proposal()
            }
        },
        ResponseShape::Freeform => parse_text(raw).into_proposal(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::proposal::DEFAULT_VERSION;
    use crate::text::TEXT_GADGET;

    #[test]
    fn detect_recognizes_json_fence_and_bare_object() {
        assert_eq!(
            ResponseShape::detect("Here:\n```json\n{}\n```"),
            ResponseShape::Structured
        );
        assert_eq!(
            ResponseShape::detect("  {\"patch\": \"x\"}"),
            ResponseShape::Structured
        );
        assert_eq!(
            ResponseShape::detect("Use this:\n```app.py\nx\n```"),
            ResponseShape::Freeform
        );
    }

    #[test]
    fn fenced_document_is_extracted_from_surrounding_prose() {
        let raw = "Sure, here is the fix.\n```json\n{\"commit_message\": \"fix bug\", \"patch\": \"+++ b/a\\n\"}\n```\nGood luck!";
        let proposal = parse_structured(raw).expect("structured");
        assert_eq!(proposal.commit_message(), Some("fix bug"));
        assert_eq!(proposal.patch(), Some("+++ b/a\n"));
        assert_eq!(proposal.version(), DEFAULT_VERSION);
    }

    #[test]
    fn backticks_inside_json_strings_do_not_end_the_fence() {
        let raw = "Here you go:\n```json\n{\"explanation\": \"Wrap it in ```rust``` blocks.\", \"commit_message\": \"docs\"}\n```\nThanks.";
        let proposal = parse_structured(raw).expect("structured");
        assert_eq!(proposal.explanation(), "Wrap it in ```rust``` blocks.");
        assert_eq!(proposal.commit_message(), Some("docs"));
    }

    #[test]
    fn failed_json_fence_does_not_become_a_file() {
        let proposal = parse("```json\n{\"patch\": }\n```\nSee above.");
        assert_eq!(proposal.gadget(), Some(TEXT_GADGET));
        assert!(proposal.files().is_empty());
        assert_eq!(proposal.explanation(), "See above.");
    }

    #[test]
    fn bare_document_is_parsed_whole() {
        let proposal =
            parse_structured("\n  {\"explanation\": \"why\", \"gadget\": \"copilot\"}  \n")
                .expect("structured");
        assert_eq!(proposal.explanation(), "why");
        assert_eq!(proposal.gadget(), Some("copilot"));
    }

    #[test]
    fn malformed_json_keeps_original_text() {
        let raw = "```json\n{\"patch\": }\n```";
        match parse_structured(raw) {
            Err(GogoError::MalformedResponse { raw: kept, .. }) => assert_eq!(kept, raw),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn type_mismatch_is_a_schema_violation() {
        let raw = "{\"files\": [\"a.txt\"]}";
        assert!(matches!(
            parse_structured(raw),
            Err(GogoError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn parse_falls_back_to_text_mode_on_broken_structure() {
        let raw = "{ this is not json\n```app.py\nprint('x')\n```";
        let proposal = parse(raw);
        assert_eq!(proposal.gadget(), Some(TEXT_GADGET));
        assert_eq!(
            proposal.files().get("app.py").map(String::as_str),
            Some("print('x')")
        );
    }

    #[test]
    fn parse_prefers_structured_when_valid() {
        let proposal = parse("```json\n{\"patch\": \"+++ b/x\\n\", \"gadget\": \"copilot\"}\n```");
        assert_eq!(proposal.gadget(), Some("copilot"));
        assert!(proposal.files().is_empty());
    }

    #[test]
    fn parse_of_freeform_text_never_fails() {
        let proposal = parse("Nothing to change here.");
        assert_eq!(proposal.explanation(), "Nothing to change here.");
        assert!(proposal.mechanism().is_none());
    }
}
