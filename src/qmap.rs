//! Question-to-source mapping over a revised document.
//!
//! Questions are numbered by their order in the document body. Each question
//! owns the paragraphs up to the next question, and the footnotes referenced
//! by those paragraphs are the question's sources. References sitting on the
//! question paragraph itself are not counted.
//!
//! The map builder recognizes questions only by their trailing question mark
//! so the numbering stays stable across runs. The single-question query also
//! accepts numbered headings that merely contain an interrogative cue, which
//! tolerates bodies where some question marks were edited away.

use crate::dom::{wml, DocxPackage, DomError, XmlElement, DOCUMENT_PART, FOOTNOTES_PART};
use crate::engine::ids;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QmapError {
    #[error(transparent)]
    Dom(#[from] DomError),

    #[error("invalid question pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to build question map: {source}")]
    Csv { source: csv::Error },

    #[error("failed to write question map {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Minimum length, in characters, for a paragraph to count as a question.
const MIN_QUESTION_CHARS: usize = 6;

/// A body paragraph that carries text, with the footnote ids it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyParagraph {
    pub text: String,
    pub footnote_ids: Vec<i64>,
}

/// One row of the question map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRow {
    pub number: usize,
    pub question: String,
    pub footnote_ids: Vec<i64>,
    /// Rendered `[id] text` entries for ids defined in the footnote part.
    pub sources: Vec<String>,
}

impl QuestionRow {
    pub fn has_source(&self) -> bool {
        !self.footnote_ids.is_empty()
    }
}

/// Sources resolved for one queried question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSources {
    pub number: i64,
    pub question: String,
    /// Referenced ids with their footnote text, `None` for ids the footnote
    /// part does not define.
    pub sources: Vec<(i64, Option<String>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Found(QuestionSources),
    OutOfRange { requested: i64, available: usize },
}

/// Compiled patterns for the wide question heuristic.
pub struct QuestionHeuristics {
    prefix: Regex,
    hint: Regex,
}

impl QuestionHeuristics {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            prefix: Regex::new(
                r"(?i)^\s*(?:Q\s*\d+|Question\s*\d+|\d+[.)]|[一二三四五六七八九十]+[、.])\s*",
            )?,
            hint: Regex::new(
                r"(?i)(?:\?|？|what|how|why|when|where|which|who|whether|是否|如何|为什么|什么|哪|谁|何时|多少)",
            )?,
        })
    }

    /// Trailing question mark, or a numbered heading containing an
    /// interrogative cue.
    pub fn is_question_wide(&self, text: &str) -> bool {
        let stripped = text.trim();
        if stripped.chars().count() < MIN_QUESTION_CHARS {
            return false;
        }
        if is_question_strict(stripped) {
            return true;
        }
        self.prefix.is_match(stripped) && self.hint.is_match(stripped)
    }
}

/// Trailing question mark only, halfwidth or fullwidth. The text before
/// the mark must reach the minimum length on its own.
pub fn is_question_strict(text: &str) -> bool {
    let body = match text
        .strip_suffix('？')
        .or_else(|| text.strip_suffix('?'))
    {
        Some(body) => body,
        None => return false,
    };
    body.chars().count() >= MIN_QUESTION_CHARS
}

/// Non-empty body paragraphs in order, with trimmed text and the
/// non-negative footnote ids referenced anywhere inside each paragraph.
pub fn body_paragraphs(document: &XmlElement) -> Vec<BodyParagraph> {
    let body = match wml::body(document) {
        Some(body) => body,
        None => return Vec::new(),
    };
    let mut paragraphs = Vec::new();
    for paragraph in wml::body_paragraphs(body) {
        let text = wml::paragraph_text(paragraph).trim().to_string();
        if text.is_empty() {
            continue;
        }
        let footnote_ids = wml::footnote_reference_ids(paragraph)
            .into_iter()
            .filter(|id| *id >= 0)
            .collect();
        paragraphs.push(BodyParagraph { text, footnote_ids });
    }
    paragraphs
}

fn question_positions(paragraphs: &[BodyParagraph], is_question: impl Fn(&str) -> bool) -> Vec<usize> {
    paragraphs
        .iter()
        .enumerate()
        .filter(|(_, paragraph)| is_question(&paragraph.text))
        .map(|(index, _)| index)
        .collect()
}

/// Sorted distinct footnote ids referenced strictly after the question
/// paragraph and before the next question.
fn owned_footnote_ids(paragraphs: &[BodyParagraph], start: usize, end: usize) -> Vec<i64> {
    let mut ids: Vec<i64> = paragraphs[start + 1..end]
        .iter()
        .flat_map(|paragraph| paragraph.footnote_ids.iter().copied())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Build the full question map from document and footnote trees.
pub fn build_question_rows(document: &XmlElement, footnotes: &XmlElement) -> Vec<QuestionRow> {
    let paragraphs = body_paragraphs(document);
    let footnote_texts = ids::footnote_text_map(footnotes);
    let positions = question_positions(&paragraphs, is_question_strict);

    let mut rows = Vec::with_capacity(positions.len());
    for (index, &start) in positions.iter().enumerate() {
        let end = positions.get(index + 1).copied().unwrap_or(paragraphs.len());
        let footnote_ids = owned_footnote_ids(&paragraphs, start, end);
        let sources = footnote_ids
            .iter()
            .filter_map(|id| {
                footnote_texts
                    .get(id)
                    .map(|text| format!("[{id}] {text}"))
            })
            .collect();
        rows.push(QuestionRow {
            number: index + 1,
            question: paragraphs[start].text.clone(),
            footnote_ids,
            sources,
        });
    }
    rows
}

/// Resolve the sources for question `number` using the wide heuristic.
pub fn query_question(
    document: &XmlElement,
    footnotes: &XmlElement,
    number: i64,
    heuristics: &QuestionHeuristics,
) -> QueryOutcome {
    let paragraphs = body_paragraphs(document);
    let footnote_texts = ids::footnote_text_map(footnotes);
    let positions = question_positions(&paragraphs, |text| heuristics.is_question_wide(text));

    if number < 1 || number as usize > positions.len() {
        return QueryOutcome::OutOfRange {
            requested: number,
            available: positions.len(),
        };
    }

    let index = (number - 1) as usize;
    let start = positions[index];
    let end = positions.get(index + 1).copied().unwrap_or(paragraphs.len());
    let sources = owned_footnote_ids(&paragraphs, start, end)
        .into_iter()
        .map(|id| {
            let text = footnote_texts.get(&id).cloned();
            (id, text)
        })
        .collect();

    QueryOutcome::Found(QuestionSources {
        number,
        question: paragraphs[start].text.clone(),
        sources,
    })
}

fn read_trees(input: &Path) -> Result<(XmlElement, XmlElement), QmapError> {
    let mut package = DocxPackage::open(input)?;
    let document = package.read_part(DOCUMENT_PART)?;
    let footnotes = package.read_part(FOOTNOTES_PART)?;
    Ok((document, footnotes))
}

/// Build the question map for a package on disk.
pub fn build_question_map(input: &Path) -> Result<Vec<QuestionRow>, QmapError> {
    let (document, footnotes) = read_trees(input)?;
    Ok(build_question_rows(&document, &footnotes))
}

/// Query one question's sources from a package on disk.
pub fn query_package_question(input: &Path, number: i64) -> Result<QueryOutcome, QmapError> {
    let (document, footnotes) = read_trees(input)?;
    let heuristics = QuestionHeuristics::new()?;
    Ok(query_question(&document, &footnotes, number, &heuristics))
}

const QUESTION_MAP_HEADER: [&str; 5] = [
    "Q_no",
    "Question",
    "Footnote_IDs",
    "Sources",
    "Has_Source",
];

/// Write the question map as a CSV with a UTF-8 byte order mark. The header
/// row is written even when no questions were found.
pub fn write_question_map_csv(path: &Path, rows: &[QuestionRow]) -> Result<(), QmapError> {
    let mut encoded: Vec<u8> = vec![0xef, 0xbb, 0xbf];
    {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(&mut encoded);
        writer
            .write_record(QUESTION_MAP_HEADER)
            .map_err(|source| QmapError::Csv { source })?;
        for row in rows {
            let footnote_ids = row
                .footnote_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            writer
                .write_record([
                    row.number.to_string().as_str(),
                    row.question.as_str(),
                    footnote_ids.as_str(),
                    row.sources.join(" | ").as_str(),
                    if row.has_source() { "YES" } else { "NO" },
                ])
                .map_err(|source| QmapError::Csv { source })?;
        }
        writer.flush().map_err(|source| QmapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, &encoded).map_err(|source| QmapError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse;

    const W: &str = "xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"";

    fn document_fixture() -> XmlElement {
        parse(&format!(
            "<w:document {W}><w:body>\
               <w:p><w:r><w:t>Frequently asked questions</w:t></w:r></w:p>\
               <w:p><w:r><w:t>Q1. What is the retention period?</w:t></w:r></w:p>\
               <w:p><w:r><w:t>Records are kept for five years.</w:t></w:r>\
                 <w:r><w:footnoteReference w:id=\"2\"/></w:r></w:p>\
               <w:p><w:r><w:t xml:space=\"preserve\">   </w:t></w:r></w:p>\
               <w:p><w:r><w:t>Q2. Who approves exceptions?</w:t></w:r>\
                 <w:r><w:footnoteReference w:id=\"9\"/></w:r></w:p>\
               <w:p><w:r><w:t>The committee approves them.</w:t></w:r>\
                 <w:r><w:footnoteReference w:id=\"5\"/></w:r>\
                 <w:r><w:footnoteReference w:id=\"2\"/></w:r></w:p>\
               <w:p><w:r><w:t>Unsourced trailing note.</w:t></w:r></w:p>\
             </w:body></w:document>"
        ))
        .unwrap()
    }

    fn footnotes_fixture() -> XmlElement {
        parse(&format!(
            "<w:footnotes {W}>\
               <w:footnote w:id=\"2\"><w:p><w:r><w:t>Retention policy, s. 3.</w:t></w:r></w:p></w:footnote>\
               <w:footnote w:id=\"5\"><w:p><w:r><w:t>Charter, art. 7.</w:t></w:r></w:p></w:footnote>\
             </w:footnotes>"
        ))
        .unwrap()
    }

    #[test]
    fn test_strict_heuristic_requires_trailing_mark() {
        assert!(is_question_strict("What is the policy?"));
        assert!(is_question_strict("什么是保留期限？"));
        assert!(!is_question_strict("Short?"));
        assert!(is_question_strict("Really?"));
        assert!(!is_question_strict("A statement without a mark."));
    }

    #[test]
    fn test_wide_heuristic_accepts_numbered_headings() {
        let heuristics = QuestionHeuristics::new().unwrap();
        assert!(heuristics.is_question_wide("Q3 what the policy covers"));
        assert!(heuristics.is_question_wide("12. How the review works"));
        assert!(heuristics.is_question_wide("三、如何处理例外情况"));
        assert!(!heuristics.is_question_wide("12. Annual summary"));
        assert!(!heuristics.is_question_wide("What about structure"));
        assert!(heuristics.is_question_wide("Plain trailing question mark?"));
    }

    #[test]
    fn test_rows_scope_refs_to_owning_question() {
        let rows = build_question_rows(&document_fixture(), &footnotes_fixture());
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].number, 1);
        assert_eq!(rows[0].question, "Q1. What is the retention period?");
        assert_eq!(rows[0].footnote_ids, vec![2]);
        assert_eq!(rows[0].sources, vec!["[2] Retention policy, s. 3.".to_string()]);
        assert!(rows[0].has_source());

        // Reference on the question paragraph itself (id 9) is not owned.
        assert_eq!(rows[1].footnote_ids, vec![2, 5]);
        assert_eq!(
            rows[1].sources,
            vec![
                "[2] Retention policy, s. 3.".to_string(),
                "[5] Charter, art. 7.".to_string()
            ]
        );
    }

    #[test]
    fn test_undefined_footnote_id_still_counts_as_sourced() {
        let document = parse(&format!(
            "<w:document {W}><w:body>\
               <w:p><w:r><w:t>Q1. What backs this claim?</w:t></w:r></w:p>\
               <w:p><w:r><w:t>A claim.</w:t></w:r>\
                 <w:r><w:footnoteReference w:id=\"77\"/></w:r></w:p>\
             </w:body></w:document>"
        ))
        .unwrap();
        let rows = build_question_rows(&document, &footnotes_fixture());
        assert_eq!(rows[0].footnote_ids, vec![77]);
        assert!(rows[0].sources.is_empty());
        assert!(rows[0].has_source());
    }

    #[test]
    fn test_query_resolves_and_flags_missing_footnotes() {
        let heuristics = QuestionHeuristics::new().unwrap();
        let outcome = query_question(&document_fixture(), &footnotes_fixture(), 2, &heuristics);
        match outcome {
            QueryOutcome::Found(found) => {
                assert_eq!(found.question, "Q2. Who approves exceptions?");
                assert_eq!(
                    found.sources,
                    vec![
                        (2, Some("Retention policy, s. 3.".to_string())),
                        (5, Some("Charter, art. 7.".to_string()))
                    ]
                );
            }
            other => panic!("expected a resolved question, got {other:?}"),
        }
    }

    #[test]
    fn test_query_out_of_range() {
        let heuristics = QuestionHeuristics::new().unwrap();
        let outcome = query_question(&document_fixture(), &footnotes_fixture(), 5, &heuristics);
        assert_eq!(
            outcome,
            QueryOutcome::OutOfRange {
                requested: 5,
                available: 2
            }
        );
        let outcome = query_question(&document_fixture(), &footnotes_fixture(), 0, &heuristics);
        assert!(matches!(outcome, QueryOutcome::OutOfRange { .. }));
    }

    #[test]
    fn test_csv_writes_header_without_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q_source_map.csv");
        write_question_map_csv(&path, &[]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..3], &[0xef, 0xbb, 0xbf]);
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(text, "Q_no,Question,Footnote_IDs,Sources,Has_Source\r\n");
    }
}
