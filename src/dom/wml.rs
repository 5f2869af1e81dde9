//! WordprocessingML accessors and builders.
//!
//! Readers match on local element names, so any prefix bound to the
//! WordprocessingML namespace is accepted. Builders emit the conventional
//! `w:` prefix and stamp the run formatting the revision template uses.

use crate::dom::tree::XmlElement;

/// The WordprocessingML main namespace. Producers of new packages must bind
/// the `w:` prefix to this URI on the document root.
pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const DEFAULT_FONT: &str = "Times New Roman";

// Style ids carried by the revision template: footnote text paragraph style
// and footnote reference character style.
const FOOTNOTE_PARAGRAPH_STYLE: &str = "af7";
const FOOTNOTE_REFERENCE_STYLE: &str = "af9";

/// The `w:body` child of a document root.
pub fn body(document: &XmlElement) -> Option<&XmlElement> {
    document.find_child("body")
}

pub fn body_mut(document: &mut XmlElement) -> Option<&mut XmlElement> {
    document.find_child_mut("body")
}

/// Direct paragraph children of the body, in document order.
pub fn body_paragraphs(body: &XmlElement) -> impl Iterator<Item = &XmlElement> {
    body.child_elements().filter(|el| el.is("p"))
}

/// Plain text of every body paragraph, in document order.
pub fn paragraph_texts(body: &XmlElement) -> Vec<String> {
    body_paragraphs(body).map(paragraph_text).collect()
}

/// Mutable access to the paragraph at `index` among the body's paragraphs.
pub fn paragraph_at_mut(body: &mut XmlElement, index: usize) -> Option<&mut XmlElement> {
    body.child_elements_mut().filter(|el| el.is("p")).nth(index)
}

/// Concatenated text of every `w:t` under a paragraph.
///
/// `w:delText` spans are not included, so a paragraph that already carries a
/// tracked replacement reads as its inserted text.
pub fn paragraph_text(paragraph: &XmlElement) -> String {
    let mut out = String::new();
    for t in paragraph.descendants().filter(|el| el.is("t")) {
        out.push_str(&t.text());
    }
    out
}

/// Parsed `w:id` of every footnote reference under a paragraph.
pub fn footnote_reference_ids(paragraph: &XmlElement) -> Vec<i64> {
    paragraph
        .descendants()
        .filter(|el| el.is("footnoteReference"))
        .filter_map(|el| el.attr("id"))
        .filter_map(|raw| raw.parse::<i64>().ok())
        .collect()
}

/// Direct footnote entries of the footnote collection root.
pub fn footnote_entries(footnotes: &XmlElement) -> impl Iterator<Item = &XmlElement> {
    footnotes.child_elements().filter(|el| el.is("footnote"))
}

/// Parsed `w:id` of a footnote entry.
pub fn footnote_id(entry: &XmlElement) -> Option<i64> {
    entry.attr("id").and_then(|raw| raw.parse::<i64>().ok())
}

/// Whitespace-trimmed text of a footnote entry.
pub fn footnote_text(entry: &XmlElement) -> String {
    let mut out = String::new();
    for t in entry.descendants().filter(|el| el.is("t")) {
        out.push_str(&t.text());
    }
    out.trim().to_string()
}

fn run_fonts() -> XmlElement {
    XmlElement::new("w:rFonts")
        .with_attr("w:ascii", DEFAULT_FONT)
        .with_attr("w:hAnsi", DEFAULT_FONT)
        .with_attr("w:cs", DEFAULT_FONT)
}

/// A formatted text run. `xml:space` is preserved when the text carries
/// leading, trailing, or doubled spaces.
pub fn text_run(text: &str) -> XmlElement {
    let mut props = XmlElement::new("w:rPr");
    props.push(run_fonts());

    let mut t = XmlElement::new("w:t");
    if needs_space_preserve(text) {
        t.set_attr("xml:space", "preserve");
    }
    t.push_text(text);

    let mut run = XmlElement::new("w:r");
    run.push(props);
    run.push(t);
    run
}

fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(' ') || text.ends_with(' ') || text.contains("  ")
}

/// A run holding a `w:footnoteReference` to the given footnote id.
pub fn footnote_ref_run(footnote_id: i64) -> XmlElement {
    let mut props = XmlElement::new("w:rPr");
    props.push(XmlElement::new("w:rStyle").with_attr("w:val", FOOTNOTE_REFERENCE_STYLE));
    props.push(run_fonts());

    let mut run = XmlElement::new("w:r");
    run.push(props);
    run.push(XmlElement::new("w:footnoteReference").with_attr("w:id", footnote_id.to_string()));
    run
}

/// A complete footnote entry: one paragraph with the footnote mark run
/// followed by the citation text run.
pub fn footnote_entry(footnote_id: i64, text: &str) -> XmlElement {
    let mut paragraph = XmlElement::new("w:p");

    let mut para_props = XmlElement::new("w:pPr");
    para_props.push(XmlElement::new("w:pStyle").with_attr("w:val", FOOTNOTE_PARAGRAPH_STYLE));
    let mut para_run_props = XmlElement::new("w:rPr");
    para_run_props.push(run_fonts());
    para_props.push(para_run_props);
    paragraph.push(para_props);

    let mut mark_props = XmlElement::new("w:rPr");
    mark_props.push(XmlElement::new("w:rStyle").with_attr("w:val", FOOTNOTE_REFERENCE_STYLE));
    mark_props.push(run_fonts());
    let mut mark_run = XmlElement::new("w:r");
    mark_run.push(mark_props);
    mark_run.push(XmlElement::new("w:footnoteRef"));
    paragraph.push(mark_run);

    let mut text_props = XmlElement::new("w:rPr");
    text_props.push(run_fonts());
    let mut text_el = XmlElement::new("w:t");
    text_el.push_text(text);
    let mut text_run = XmlElement::new("w:r");
    text_run.push(text_props);
    text_run.push(text_el);
    paragraph.push(text_run);

    let mut entry = XmlElement::new("w:footnote").with_attr("w:id", footnote_id.to_string());
    entry.push(paragraph);
    entry
}

/// A tracked deletion block wrapping the paragraph's previous text.
/// `xml:space` is always preserved on the deleted span.
pub fn del_block(change_id: i64, author: &str, date: &str, old_text: &str) -> XmlElement {
    let mut props = XmlElement::new("w:rPr");
    props.push(run_fonts());

    let mut del_text = XmlElement::new("w:delText").with_attr("xml:space", "preserve");
    del_text.push_text(old_text);

    let mut run = XmlElement::new("w:r");
    run.push(props);
    run.push(del_text);

    let mut block = XmlElement::new("w:del")
        .with_attr("w:id", change_id.to_string())
        .with_attr("w:author", author)
        .with_attr("w:date", date);
    block.push(run);
    block
}

/// An empty tracked insertion block; the caller appends the new runs.
pub fn ins_block(change_id: i64, author: &str, date: &str) -> XmlElement {
    XmlElement::new("w:ins")
        .with_attr("w:id", change_id.to_string())
        .with_attr("w:author", author)
        .with_attr("w:date", date)
}

/// A plain body paragraph holding one unstyled run, or an empty paragraph
/// when `text` is empty.
pub fn paragraph(text: &str) -> XmlElement {
    let mut p = XmlElement::new("w:p");
    if !text.is_empty() {
        let mut t = XmlElement::new("w:t");
        if needs_space_preserve(text) {
            t.set_attr("xml:space", "preserve");
        }
        t.push_text(text);
        let mut run = XmlElement::new("w:r");
        run.push(t);
        p.push(run);
    }
    p
}
