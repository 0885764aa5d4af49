//! Recovery of explanation and files from loosely structured markdown.
//!
//! Prose outside fences becomes the explanation. A fence whose opening line
//! carries a name (```` ```src/app.py ````) becomes a file; anonymous fences,
//! `json` payload fences and fences left open at the end of input are dropped.
//! This parser never fails.

use std::collections::BTreeMap;

use crate::proposal::Proposal;

const FENCE: &str = "```";

// Tag of a structured payload fence; never a file name.
const JSON_TAG: &str = "json";

/// Gadget name recorded on proposals recovered from free-form text.
pub const TEXT_GADGET: &str = "text";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextResponse {
    pub explanation: String,
    pub files: BTreeMap<String, String>,
}

impl TextResponse {
    pub fn into_proposal(self) -> Proposal {
        let mut proposal = Proposal::default();
        proposal.set_explanation(self.explanation);
        proposal.set_files(self.files);
        proposal.set_gadget(Some(TEXT_GADGET.to_string()));
        proposal
    }
}

enum Block {
    Outside,
    Named { path: String, lines: Vec<String> },
    Anonymous,
}

pub fn parse_text(raw: &str) -> TextResponse {
    let mut explanation: Vec<&str> = Vec::new();
    let mut files = BTreeMap::new();
    let mut block = Block::Outside;

    for line in raw.lines() {
        let is_fence = line.trim_start().starts_with(FENCE);
        block = match block {
            Block::Outside if is_fence => {
                let name = line.trim_start()[FENCE.len()..].trim();
                if name.is_empty() || name == JSON_TAG {
                    Block::Anonymous
                } else {
                    Block::Named {
                        path: name.to_string(),
                        lines: Vec::new(),
                    }
                }
            }
            Block::Outside => {
                explanation.push(line);
                Block::Outside
            }
            Block::Named { path, lines } if is_fence => {
                files.insert(path, lines.join("\n"));
                Block::Outside
            }
            Block::Named { path, mut lines } => {
                lines.push(line.to_string());
                Block::Named { path, lines }
            }
            Block::Anonymous if is_fence => Block::Outside,
            Block::Anonymous => Block::Anonymous,
        };
    }

    if let Block::Named { path, .. } = &block {
        tracing::warn!(%path, "discarding unterminated code block");
    }

    let explanation = explanation.join("\n").trim().to_string();
    if files.is_empty() && explanation.is_empty() {
        return TextResponse {
            explanation: raw.trim().to_string(),
            files,
        };
    }

    TextResponse { explanation, files }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(path, body)| (path.to_string(), body.to_string()))
            .collect()
    }

    #[test]
    fn prose_then_named_block() {
        let parsed = parse_text("Use this fix:\n```app.py\nprint('x')\n```\n");
        assert_eq!(parsed.explanation, "Use this fix:");
        assert_eq!(parsed.files, files(&[("app.py", "print('x')")]));
    }

    #[test]
    fn no_fences_yields_trimmed_input_as_explanation() {
        for raw in ["  just prose\nsecond line \n", "one", "\n\nA\n\nB\n\n", "  \n\t\n", ""] {
            let parsed = parse_text(raw);
            assert!(parsed.files.is_empty());
            assert_eq!(parsed.explanation, raw.trim());
        }
    }

    #[test]
    fn single_named_block_has_empty_explanation() {
        let parsed = parse_text("```src/lib.rs\nfn a() {}\n\nfn b() {}\n```");
        assert_eq!(parsed.explanation, "");
        assert_eq!(parsed.files, files(&[("src/lib.rs", "fn a() {}\n\nfn b() {}")]));
    }

    #[test]
    fn anonymous_blocks_are_dropped_entirely() {
        let raw = "Run this:\n```\nrm -rf build\n```\nthen rebuild.\n";
        let parsed = parse_text(raw);
        assert_eq!(parsed.explanation, "Run this:\nthen rebuild.");
        assert!(parsed.files.is_empty());
    }

    #[test]
    fn prose_between_several_files_is_kept_in_order() {
        let raw = "First:\n```a.txt\nA\n```\nSecond:\n```b/c.txt\nC\n```\nDone.";
        let parsed = parse_text(raw);
        assert_eq!(parsed.explanation, "First:\nSecond:\nDone.");
        assert_eq!(parsed.files, files(&[("a.txt", "A"), ("b/c.txt", "C")]));
    }

    #[test]
    fn unterminated_block_is_discarded() {
        let parsed = parse_text("Intro\n```half.py\nprint(1)\n");
        assert_eq!(parsed.explanation, "Intro");
        assert!(parsed.files.is_empty());
    }

    #[test]
    fn empty_result_falls_back_to_raw_input() {
        let raw = "```\nonly anonymous\n```\n";
        let parsed = parse_text(raw);
        assert_eq!(parsed.explanation, raw.trim());
        assert!(parsed.files.is_empty());
    }

    #[test]
    fn json_payload_fence_is_not_a_file() {
        let parsed = parse_text("Broken:\n```json\n{\"patch\": }\n```\n```json.txt\nkept\n```");
        assert_eq!(parsed.explanation, "Broken:");
        assert_eq!(parsed.files, files(&[("json.txt", "kept")]));
    }

    #[test]
    fn fence_tag_is_trimmed_into_the_path() {
        let parsed = parse_text("```  docs/guide.md  \n# Guide\n```");
        assert_eq!(parsed.files, files(&[("docs/guide.md", "# Guide")]));
    }

    #[test]
    fn into_proposal_marks_text_gadget() {
        let proposal = parse_text("Use this fix:\n```app.py\nprint('x')\n```\n").into_proposal();
        assert_eq!(proposal.gadget(), Some(TEXT_GADGET));
        assert_eq!(proposal.explanation(), "Use this fix:");
        assert_eq!(proposal.files().get("app.py").map(String::as_str), Some("print('x')"));
        assert!(proposal.patch().is_none());
    }
}
