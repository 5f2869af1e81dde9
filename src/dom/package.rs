//! DOCX package access.
//!
//! A package is an ordinary zip archive. Reads pull individual parts out by
//! member name; writes stream every member of the source archive into a new
//! archive, substituting only the replaced parts, so untouched members ride
//! through unchanged. The source package is never opened for writing.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::dom::errors::DomError;
use crate::dom::tree::{self, XmlElement};

/// Zip member holding the body content.
pub const DOCUMENT_PART: &str = "word/document.xml";
/// Zip member holding the footnote collection.
pub const FOOTNOTES_PART: &str = "word/footnotes.xml";

/// An opened document package.
pub struct DocxPackage {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl DocxPackage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DomError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| DomError::Io {
            path: path.clone(),
            source,
        })?;
        let archive = ZipArchive::new(file).map_err(|source| DomError::Archive {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, archive })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Raw bytes of one package part.
    pub fn read_part_bytes(&mut self, name: &str) -> Result<Vec<u8>, DomError> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(DomError::MissingPart {
                    name: name.to_string(),
                })
            }
            Err(source) => {
                return Err(DomError::Archive {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .map_err(|source| DomError::PartIo {
                name: name.to_string(),
                source,
            })?;
        Ok(buf)
    }

    /// Parse one XML part into an owned tree.
    pub fn read_part(&mut self, name: &str) -> Result<XmlElement, DomError> {
        let bytes = self.read_part_bytes(name)?;
        let text = String::from_utf8_lossy(&bytes);
        tree::parse(&text).map_err(|error| error.with_part(name))
    }

    /// Write a copy of this package to `output`, substituting the given parts.
    ///
    /// Member order and member timestamps are preserved and every member is
    /// deflate-compressed, so the same input and replacements always produce
    /// the same bytes. The archive is assembled in memory and lands on disk
    /// via an atomic tempfile-then-rename, so a crash never leaves a
    /// truncated package.
    pub fn save_with_replacements(
        &mut self,
        output: &Path,
        replacements: &BTreeMap<String, Vec<u8>>,
    ) -> Result<(), DomError> {
        let archive_error = |source: ZipError| DomError::Archive {
            path: self.path.clone(),
            source,
        };

        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));

        for index in 0..self.archive.len() {
            let mut entry = self.archive.by_index(index).map_err(archive_error)?;
            let name = entry.name().to_string();
            let mut options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            // Carry the source member's timestamp so output bytes do not
            // depend on the wall clock.
            if let Some(modified) = entry.last_modified() {
                options = options.last_modified_time(modified);
            }
            writer
                .start_file(name.as_str(), options)
                .map_err(archive_error)?;
            match replacements.get(&name) {
                Some(bytes) => {
                    writer.write_all(bytes).map_err(|source| DomError::Io {
                        path: output.to_path_buf(),
                        source,
                    })?;
                }
                None => {
                    std::io::copy(&mut entry, &mut writer).map_err(|source| DomError::PartIo {
                        name: name.clone(),
                        source,
                    })?;
                }
            }
        }

        let cursor = writer.finish().map_err(archive_error)?;
        atomic_write(output, &cursor.into_inner()).map_err(|source| DomError::Io {
            path: output.to_path_buf(),
            source,
        })
    }
}

/// Atomic file write: tempfile in the target directory, fsync, rename.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        )
    })?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|error| error.error)?;
    Ok(())
}
