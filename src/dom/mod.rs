//! Document model: zip package access, an owned XML tree, and the
//! WordprocessingML layer on top of it.

pub mod errors;
pub mod package;
pub mod tree;
pub mod wml;

pub use errors::DomError;
pub use package::{DocxPackage, DOCUMENT_PART, FOOTNOTES_PART};
pub use tree::{parse, serialize, XmlElement, XmlNode};
