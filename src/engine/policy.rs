//! Plan-level policy checks.
//!
//! Every patch must be fully specified and cite at least one source before
//! any edit is applied. The checks run in a fixed order per patch so the
//! first failure reported is stable for a given plan.

use crate::engine::errors::ReviseError;
use crate::plan::{tokenize, FootnoteRef, PatchPlan, Segment};
use std::collections::BTreeSet;

/// Validate a plan against the footnote ids already present in the document.
///
/// Returns the distinct new footnote keys in order of first use across the
/// plan, which fixes the id assignment order for materialization.
pub fn validate_plan(
    plan: &PatchPlan,
    existing_ids: &BTreeSet<i64>,
) -> Result<Vec<String>, ReviseError> {
    let mut seen_labels: BTreeSet<String> = BTreeSet::new();
    let mut new_keys: Vec<String> = Vec::new();

    for patch in &plan.patches {
        if patch.label.is_empty() {
            return Err(ReviseError::EmptyLabel);
        }
        if !seen_labels.insert(patch.label.clone()) {
            return Err(ReviseError::DuplicateLabel {
                label: patch.label.clone(),
            });
        }
        if patch.anchor.is_empty() {
            return Err(ReviseError::EmptyAnchor {
                label: patch.label.clone(),
            });
        }
        if patch.replacement.trim().is_empty() {
            return Err(ReviseError::EmptyReplacement {
                label: patch.label.clone(),
            });
        }
        if patch.reason.is_empty() {
            return Err(ReviseError::EmptyReason {
                label: patch.label.clone(),
            });
        }

        let mut citations = 0usize;
        for segment in tokenize(&patch.replacement) {
            let reference = match segment {
                Segment::Text(_) => continue,
                Segment::Footnote(reference) => reference,
            };
            citations += 1;
            match reference {
                FootnoteRef::New { key } => {
                    if !plan.footnote_sources.contains_key(&key) {
                        return Err(ReviseError::UnknownFootnoteKey {
                            label: patch.label.clone(),
                            key,
                        });
                    }
                    if !new_keys.contains(&key) {
                        new_keys.push(key);
                    }
                }
                FootnoteRef::Existing { id } => {
                    let parsed = match id.parse::<i64>() {
                        Ok(value) if value >= 0 => value,
                        _ => {
                            return Err(ReviseError::InvalidFootnoteId {
                                label: patch.label.clone(),
                                value: id,
                            })
                        }
                    };
                    if !existing_ids.contains(&parsed) {
                        return Err(ReviseError::MissingFootnoteId {
                            label: patch.label.clone(),
                            id: parsed,
                        });
                    }
                }
            }
        }

        if citations == 0 {
            return Err(ReviseError::UnverifiedEdit {
                label: patch.label.clone(),
            });
        }
    }

    Ok(new_keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::load_from_str;

    fn ids(values: &[i64]) -> BTreeSet<i64> {
        values.iter().copied().collect()
    }

    fn plan_with_patches(patches_json: &str) -> PatchPlan {
        let raw = format!(
            "{{\"patches\": {patches_json}, \"footnote_sources\": {{\"src_a\": \"Report A.\", \"src_b\": \"Report B.\"}}}}"
        );
        load_from_str(&raw).unwrap()
    }

    fn single_patch(replacement: &str) -> PatchPlan {
        plan_with_patches(&format!(
            "[{{\"label\": \"P1\", \"anchor\": \"old\", \"replacement\": \"{replacement}\", \"reason\": \"Because.\"}}]"
        ))
    }

    #[test]
    fn test_valid_plan_returns_keys_in_first_use_order() {
        let plan = plan_with_patches(
            "[{\"label\": \"P1\", \"anchor\": \"a\", \"replacement\": \"x [[fn:src_b]] y [[fn:src_a]]\", \"reason\": \"r\"},\
              {\"label\": \"P2\", \"anchor\": \"b\", \"replacement\": \"z [[fn:src_a]]\", \"reason\": \"r\"}]",
        );
        let keys = validate_plan(&plan, &ids(&[])).unwrap();
        assert_eq!(keys, vec!["src_b".to_string(), "src_a".to_string()]);
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let plan = plan_with_patches(
            "[{\"label\": \"P1\", \"anchor\": \"a\", \"replacement\": \"x [[fn:src_a]]\", \"reason\": \"r\"},\
              {\"label\": \"P1\", \"anchor\": \"b\", \"replacement\": \"y [[fn:src_a]]\", \"reason\": \"r\"}]",
        );
        let err = validate_plan(&plan, &ids(&[])).unwrap_err();
        assert!(matches!(err, ReviseError::DuplicateLabel { label } if label == "P1"));
    }

    #[test]
    fn test_whitespace_replacement_rejected() {
        let plan = plan_with_patches(
            "[{\"label\": \"P1\", \"anchor\": \"a\", \"replacement\": \"   \", \"reason\": \"r\"}]",
        );
        let err = validate_plan(&plan, &ids(&[])).unwrap_err();
        assert!(matches!(err, ReviseError::EmptyReplacement { .. }));
    }

    #[test]
    fn test_unknown_footnote_key_rejected() {
        let plan = single_patch("Fixed. [[fn:nope]]");
        let err = validate_plan(&plan, &ids(&[])).unwrap_err();
        assert!(matches!(err, ReviseError::UnknownFootnoteKey { key, .. } if key == "nope"));
    }

    #[test]
    fn test_existing_footnote_id_must_be_defined() {
        let plan = single_patch("Fixed. [[fnid:9]]");
        let err = validate_plan(&plan, &ids(&[2, 3])).unwrap_err();
        assert!(matches!(err, ReviseError::MissingFootnoteId { id: 9, .. }));

        let keys = validate_plan(&single_patch("Fixed. [[fnid:3]]"), &ids(&[2, 3])).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_replacement_without_citation_rejected() {
        let plan = single_patch("Fixed with no source.");
        let err = validate_plan(&plan, &ids(&[])).unwrap_err();
        assert!(matches!(err, ReviseError::UnverifiedEdit { label } if label == "P1"));
    }

    #[test]
    fn test_token_only_replacement_is_verifiable() {
        let plan = single_patch("[[fn:src_a]]");
        let keys = validate_plan(&plan, &ids(&[])).unwrap();
        assert_eq!(keys, vec!["src_a".to_string()]);
    }
}
