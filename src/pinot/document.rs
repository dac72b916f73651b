//! Document & DocumentInfo (spec §4.1).
//!
//! A `Document` owns at most one of an owned buffer or a memory map; the
//! `Buffer` enum dispatches release correctly on drop either way (spec §9,
//! "memory-mapped document buffers").

use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::mime::Mime;

/// Files larger than this get a memory-reclaim hint once released (spec §4.4).
pub const LARGE_DOCUMENT_THRESHOLD: usize = 5 * 1024 * 1024;

/// A byte payload owned either as a heap allocation or a read-only mapping.
/// Exactly one variant is ever live for a given `Document`; consumers only
/// ever see a byte slice via `Deref`.
pub enum Buffer {
    /// No data has been set.
    Empty,
    /// A heap-owned copy of the data.
    Owned(Vec<u8>),
    /// A read-only memory map of an on-disk file.
    Mapped(Mmap),
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Buffer::Empty => &[],
            Buffer::Owned(v) => v.as_slice(),
            Buffer::Mapped(m) => m.as_ref(),
        }
    }
}

/// Metadata-only view of a document: everything but the byte payload. This
/// is what gets serialized into the stored record (spec §3) and what
/// survives a metadata-backup/restore cycle (spec §4.7 "Reindex mode").
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Document title / caption.
    pub title: String,
    /// Canonical location (URL).
    pub location: String,
    /// Detected or declared MIME type.
    pub mime_type: String,
    /// ISO-style language name, empty if undetected.
    pub language: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Size in bytes.
    pub size: u64,
    /// `&next&`-delimited path into nested containers, empty for top-level
    /// documents (spec §3, "ipath").
    pub internal_path: String,
    /// User-applied labels.
    pub labels: Vec<String>,
}

impl DocumentInfo {
    /// A new, empty `DocumentInfo`.
    pub fn new() -> DocumentInfo {
        DocumentInfo::default()
    }

    /// True once both type and location are set (spec §3 invariant).
    pub fn is_valid(&self) -> bool {
        !self.mime_type.is_empty() && !self.location.is_empty()
    }
}

/// A document flowing through the pipeline: metadata plus payload.
pub struct Document {
    pub info: DocumentInfo,
    buffer: Buffer,
    /// Path backing `buffer` when it was sourced from a file, used by the
    /// filter dispatch layer's feeding rules (spec §4.4).
    source_path: Option<PathBuf>,
}

impl Document {
    /// Constructs an empty document.
    pub fn new() -> Document {
        Document {
            info: DocumentInfo::new(),
            buffer: Buffer::Empty,
            source_path: None,
        }
    }

    /// Constructs a document carrying only metadata (no payload).
    pub fn from_info(info: DocumentInfo) -> Document {
        Document {
            info,
            buffer: Buffer::Empty,
            source_path: None,
        }
    }

    /// The document's byte payload.
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Whether a payload is present (possibly empty, for container entries).
    pub fn has_data(&self) -> bool {
        !matches!(self.buffer, Buffer::Empty)
    }

    /// The filesystem path this document was sourced from, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Takes ownership of `bytes` as the document's payload.
    pub fn set_data(&mut self, bytes: Vec<u8>) {
        self.info.size = bytes.len() as u64;
        self.buffer = Buffer::Owned(bytes);
        self.source_path = None;
    }

    /// Memory-maps `path` read-only, sets `timestamp`/`size` from the file's
    /// metadata, and, when present, reads the `user.mime_type` extended
    /// attribute to override type detection.
    pub fn set_data_from_file(&mut self, path: &Path) -> std::io::Result<()> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        self.info.size = metadata.len();
        self.info.timestamp = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        if metadata.len() > 0 {
            // SAFETY: the file is not modified for the lifetime of the mapping;
            // pinot does not hold mappings across external edits of the source tree.
            let mmap = unsafe { Mmap::map(&file)? };
            self.buffer = Buffer::Mapped(mmap);
        } else {
            self.buffer = Buffer::Owned(Vec::new());
        }
        self.source_path = Some(path.to_path_buf());

        if let Ok(Some(attr)) = xattr::get(path, "user.mime_type") {
            if let Ok(mime) = String::from_utf8(attr) {
                self.info.mime_type = Mime::new(mime).as_str().to_string();
            }
        }

        Ok(())
    }

    /// Releases the owned buffer or mapping, whichever is live.
    pub fn reset_data(&mut self) {
        self.buffer = Buffer::Empty;
        self.source_path = None;
        self.info.size = 0;
    }

    /// Advisory only: inspects up to the first 100 bytes for a non-ASCII
    /// byte and reports it as a binary hint (spec §4.1).
    pub fn is_binary(&self) -> bool {
        let sample = &self.data()[..self.data().len().min(100)];
        sample.iter().any(|b| *b >= 0x80)
    }

    /// Whether this document should hint the allocator to reclaim memory
    /// once released (spec §4.4).
    pub fn is_large(&self) -> bool {
        self.data().len() > LARGE_DOCUMENT_THRESHOLD
    }
}

impl Default for Document {
    fn default() -> Document {
        Document::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn set_data_takes_ownership() {
        let mut doc = Document::new();
        doc.set_data(b"Hello world".to_vec());
        assert_eq!(doc.data(), b"Hello world");
        assert_eq!(doc.info.size, 11);
    }

    #[test]
    fn reset_data_releases_buffer() {
        let mut doc = Document::new();
        doc.set_data(b"abc".to_vec());
        doc.reset_data();
        assert!(!doc.has_data());
        assert_eq!(doc.data(), b"");
    }

    #[test]
    fn set_data_from_file_maps_and_stamps_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"Hello world").unwrap();
        drop(f);

        let mut doc = Document::new();
        doc.set_data_from_file(&path).unwrap();
        assert_eq!(doc.data(), b"Hello world");
        assert_eq!(doc.info.size, 11);
        assert!(doc.info.timestamp > 0);
        assert_eq!(doc.source_path(), Some(path.as_path()));
    }

    #[test]
    fn is_binary_is_advisory() {
        let mut doc = Document::new();
        doc.set_data(b"plain ascii text".to_vec());
        assert!(!doc.is_binary());
        doc.set_data(vec![0xFF, 0xFE, 0x00, 0x01]);
        assert!(doc.is_binary());
    }
}
