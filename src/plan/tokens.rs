//! Replacement-text tokenizer.
//!
//! Replacement strings interleave literal text with footnote tokens:
//!
//! - `[[fn:key]]`   cites a new footnote whose text the plan supplies
//! - `[[fnid:123]]` cites a footnote already present in the document
//!
//! Token values are drawn from `[A-Za-z0-9_]`. Anything that merely looks
//! like a token (wrong kind, empty or illegal value, unterminated bracket)
//! is kept as literal text; tokenizing never fails.

use std::fmt;

/// A reference to a footnote inside a replacement.
///
/// Existing ids stay as written here; the policy validator is responsible
/// for checking that they are numeric and present in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FootnoteRef {
    New { key: String },
    Existing { id: String },
}

impl fmt::Display for FootnoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FootnoteRef::New { key } => write!(f, "fn:{key}"),
            FootnoteRef::Existing { id } => write!(f, "fnid:{id}"),
        }
    }
}

/// One piece of a tokenized replacement, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Footnote(FootnoteRef),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Text(text) => f.write_str(text),
            Segment::Footnote(reference) => write!(f, "[[{reference}]]"),
        }
    }
}

/// Split a replacement string into ordered segments.
pub fn tokenize(replacement: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = replacement;

    while !rest.is_empty() {
        if let Some((segment, remainder)) = scan_token(rest) {
            if !literal.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut literal)));
            }
            segments.push(segment);
            rest = remainder;
        } else {
            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                literal.push(ch);
                rest = chars.as_str();
            }
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Text(literal));
    }
    segments
}

/// Try to scan one complete token at the start of `rest`.
fn scan_token(rest: &str) -> Option<(Segment, &str)> {
    let body = rest.strip_prefix("[[")?;
    // "fnid:" must be tried first; "fn:" is its prefix.
    let (existing, tail) = if let Some(tail) = body.strip_prefix("fnid:") {
        (true, tail)
    } else if let Some(tail) = body.strip_prefix("fn:") {
        (false, tail)
    } else {
        return None;
    };

    let end = tail.find("]]")?;
    let value = &tail[..end];
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return None;
    }

    let reference = if existing {
        FootnoteRef::Existing {
            id: value.to_string(),
        }
    } else {
        FootnoteRef::New {
            key: value.to_string(),
        }
    };
    Some((Segment::Footnote(reference), &tail[end + 2..]))
}
