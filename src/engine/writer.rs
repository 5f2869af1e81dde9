//! Tracked-change rewriting of a single paragraph.

use crate::dom::{wml, XmlElement, XmlNode};
use crate::engine::errors::ReviseError;
use crate::plan::{FootnoteRef, Segment};
use std::collections::BTreeMap;

/// Replace a paragraph's content with a tracked deletion of its current text
/// followed by a tracked insertion of the replacement segments.
///
/// Paragraph properties survive in place; every other child is dropped. The
/// deletion takes `change_id_start` and the insertion `change_id_start + 1`;
/// the next free change id is returned.
pub fn apply_tracked_replacement(
    paragraph: &mut XmlElement,
    label: &str,
    segments: &[Segment],
    new_footnote_ids: &BTreeMap<String, i64>,
    change_id_start: i64,
    author: &str,
    date: &str,
) -> Result<i64, ReviseError> {
    let old_text = wml::paragraph_text(paragraph);

    let mut kept_properties = false;
    paragraph.children.retain(|node| {
        if kept_properties {
            return false;
        }
        if let XmlNode::Element(element) = node {
            if element.is("pPr") {
                kept_properties = true;
                return true;
            }
        }
        false
    });

    paragraph.push(wml::del_block(change_id_start, author, date, &old_text));

    let mut insertion = wml::ins_block(change_id_start + 1, author, date);
    for segment in segments {
        match segment {
            Segment::Text(text) => {
                if !text.is_empty() {
                    insertion.push(wml::text_run(text));
                }
            }
            Segment::Footnote(FootnoteRef::New { key }) => {
                let id = new_footnote_ids.get(key).copied().ok_or_else(|| {
                    ReviseError::UnknownFootnoteKey {
                        label: label.to_string(),
                        key: key.clone(),
                    }
                })?;
                insertion.push(wml::footnote_ref_run(id));
            }
            Segment::Footnote(FootnoteRef::Existing { id }) => {
                let parsed = id
                    .parse::<i64>()
                    .map_err(|_| ReviseError::InvalidFootnoteId {
                        label: label.to_string(),
                        value: id.clone(),
                    })?;
                insertion.push(wml::footnote_ref_run(parsed));
            }
        }
    }
    paragraph.push(insertion);

    Ok(change_id_start + 2)
}
