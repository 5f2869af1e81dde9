//! Shared DOCX fixtures for integration tests.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
<Override PartName=\"/word/footnotes.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.footnotes+xml\"/>\
</Types>";

const APP_PROPS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\">\
<Application>fixture</Application></Properties>";

/// Body with two numbered questions, each followed by one answer paragraph.
pub fn faq_document_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"{W_NS}\"><w:body>\
         <w:p><w:r><w:t>Q1. What is the current risk level?</w:t></w:r></w:p>\
         <w:p><w:r><w:t>Risk is low.</w:t></w:r></w:p>\
         <w:p><w:r><w:t>Q2. Is the control tested?</w:t></w:r></w:p>\
         <w:p><w:r><w:t>Controls were not tested.</w:t></w:r></w:p>\
         <w:sectPr/></w:body></w:document>"
    )
}

/// Separator entries plus one citable footnote with id 2.
pub fn faq_footnotes_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:footnotes xmlns:w=\"{W_NS}\">\
         <w:footnote w:type=\"separator\" w:id=\"0\"><w:p><w:r><w:separator/></w:r></w:p></w:footnote>\
         <w:footnote w:type=\"continuationSeparator\" w:id=\"1\"><w:p><w:r><w:continuationSeparator/></w:r></w:p></w:footnote>\
         <w:footnote w:id=\"2\"><w:p><w:r><w:footnoteRef/></w:r>\
         <w:r><w:t xml:space=\"preserve\"> ECB Annual Report 2025, p. 14.</w:t></w:r></w:p></w:footnote>\
         </w:footnotes>"
    )
}

/// Write a minimal well-formed package with the given body and footnote
/// parts plus an unrelated member for passthrough checks.
pub fn write_docx(path: &Path, document_xml: &str, footnotes_xml: &str) {
    let file = File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(CONTENT_TYPES.as_bytes()).unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document_xml.as_bytes()).unwrap();
    writer.start_file("word/footnotes.xml", options).unwrap();
    writer.write_all(footnotes_xml.as_bytes()).unwrap();
    writer.start_file("docProps/app.xml", options).unwrap();
    writer.write_all(APP_PROPS.as_bytes()).unwrap();
    writer.finish().unwrap();
}

pub fn write_faq_docx(path: &Path) {
    write_docx(path, &faq_document_xml(), &faq_footnotes_xml());
}

/// Raw bytes of one member of a package on disk.
pub fn read_member(path: &Path, name: &str) -> Vec<u8> {
    let file = File::open(path).unwrap();
    let mut archive = ZipArchive::new(file).unwrap();
    let mut member = archive.by_name(name).unwrap();
    let mut buf = Vec::new();
    member.read_to_end(&mut buf).unwrap();
    buf
}

pub fn read_member_string(path: &Path, name: &str) -> String {
    String::from_utf8(read_member(path, name)).unwrap()
}

/// Patch plan used by the end-to-end scenarios: one patch cites a new
/// footnote, the other cites the existing footnote 2.
pub fn faq_patch_spec() -> String {
    r#"{
  "patches": [
    {
      "label": "p1",
      "anchor": "Risk is low.",
      "replacement": "Risk is moderate. [[fn:report]]",
      "reason": "Reflects the 2025 assessment."
    },
    {
      "label": "p2",
      "anchor": "Controls were not tested.",
      "question_anchor": "Q2.",
      "replacement": "Controls were tested in 2025. [[fnid:2]]",
      "reason": "Testing completed in December."
    }
  ],
  "footnote_sources": {
    "report": "Supervisory Review 2026, section 3.1."
  }
}"#
    .to_string()
}
