//! MIME type representation and detection (spec §4.2).
//!
//! Detection order: filename extension, then magic-byte sniffing, then an
//! `http://` fallback to `text/html`, then the unsupported-type sentinel.
//! Callers that already know the type skip detection entirely.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A parsed `type/subtype` MIME value. Comparison and hashing are
/// case-insensitive over the raw string, matching the cache usage in
/// [`crate::context::Context`].
#[derive(Debug, Clone, Serialize, Deserialize, Eq)]
pub struct Mime(String);

/// Sentinel used when no type could be determined at all (spec §4.2(iv)).
pub const UNKNOWN_MIME: &str = "application/x-unsupported";

impl Mime {
    /// Builds a `Mime` from an already-lowercased, already-validated string.
    pub fn new<S: Into<String>>(s: S) -> Mime {
        Mime(s.into().to_ascii_lowercase())
    }

    /// The full `type/subtype` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The top-level class, e.g. `text` for `text/plain` (used for the
    /// `XCLASS:` prefix term).
    pub fn class(&self) -> &str {
        self.0.split('/').next().unwrap_or("")
    }

    /// The subtype, e.g. `plain` for `text/plain`.
    pub fn subtype(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or("")
    }

    /// Whether this type is, or begins with, `text/plain` (the filter
    /// dispatch reduction target, spec §4.4).
    pub fn is_reduced_text(&self) -> bool {
        self.0.starts_with("text/plain")
    }

    /// The unknown-type sentinel.
    pub fn unknown() -> Mime {
        Mime::new(UNKNOWN_MIME)
    }

    /// Computes the parent chain used for filter fallback lookups (spec
    /// §4.2): `text/html` -> `text/plain` -> `text/*`. Returns the immediate
    /// parent only; callers that need the whole chain call this repeatedly.
    pub fn parent(&self) -> Option<Mime> {
        match self.0.as_str() {
            "text/html" | "text/xml" | "text/x-markdown" => Some(Mime::new("text/plain")),
            "message/rfc822" => Some(Mime::new("text/plain")),
            _ => {
                if self.0.ends_with("/*") {
                    None
                } else if self.subtype() != "*" && !self.0.is_empty() {
                    Some(Mime::new(format!("{}/*", self.class())))
                } else {
                    None
                }
            }
        }
    }
}

impl PartialEq for Mime {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::hash::Hash for Mime {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl FromStr for Mime {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Mime::new(s))
    }
}

impl std::fmt::Display for Mime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Detects MIME type by filename extension using a small built-in glob
/// table. Returns `None` when the extension is not recognized.
pub fn detect_by_extension(path: &Path) -> Option<Mime> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" | "text" | "log" | "md" | "rst" => "text/plain",
        "html" | "htm" => "text/html",
        "xml" => "text/xml",
        "mbox" | "mbx" => "application/mbox",
        "eml" => "message/rfc822",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "csv" => "text/csv",
        _ => return None,
    };
    Some(Mime::new(mime))
}

/// Sniffs a MIME type from the first bytes of content, using a handful of
/// well-known magic numbers. Falls back to a UTF-8 validity check to
/// distinguish `text/plain` from unclassifiable binary content.
pub fn sniff_magic(bytes: &[u8]) -> Option<Mime> {
    const PDF_MAGIC: &[u8] = b"%PDF-";
    const MBOX_MAGIC: &[u8] = b"From ";

    if bytes.starts_with(PDF_MAGIC) {
        return Some(Mime::new("application/pdf"));
    }
    if bytes.starts_with(MBOX_MAGIC) {
        return Some(Mime::new("application/mbox"));
    }
    if bytes.starts_with(b"<?xml") {
        return Some(Mime::new("text/xml"));
    }
    if bytes.starts_with(b"<html") || bytes.starts_with(b"<!DOCTYPE html") {
        return Some(Mime::new("text/html"));
    }
    if std::str::from_utf8(&bytes[..bytes.len().min(512)]).is_ok() {
        return Some(Mime::new("text/plain"));
    }
    None
}

/// Full MIME detection per spec §4.2: extension, then magic sniffing (if
/// content is available), then an http fallback, then the unknown sentinel.
pub fn detect(path: Option<&Path>, bytes: Option<&[u8]>, is_http: bool) -> Mime {
    if let Some(path) = path {
        if let Some(mime) = detect_by_extension(path) {
            return mime;
        }
    }
    if let Some(bytes) = bytes {
        if let Some(mime) = sniff_magic(bytes) {
            return mime;
        }
    }
    if is_http {
        return Mime::new("text/html");
    }
    Mime::unknown()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_detection() {
        assert_eq!(
            detect_by_extension(Path::new("a.txt")).unwrap().as_str(),
            "text/plain"
        );
        assert!(detect_by_extension(Path::new("a.bin")).is_none());
    }

    #[test]
    fn magic_sniffing() {
        assert_eq!(sniff_magic(b"%PDF-1.4").unwrap().as_str(), "application/pdf");
        assert_eq!(
            sniff_magic(b"From someone@example.com Mon Jan  1").unwrap().as_str(),
            "application/mbox"
        );
    }

    #[test]
    fn full_detection_order() {
        let mime = detect(Some(Path::new("a.txt")), Some(b"whatever"), false);
        assert_eq!(mime.as_str(), "text/plain");

        let mime = detect(None, None, true);
        assert_eq!(mime.as_str(), "text/html");

        let mime = detect(None, None, false);
        assert_eq!(mime.as_str(), UNKNOWN_MIME);
    }

    #[test]
    fn parent_chain_walks_to_text_plain() {
        let html = Mime::new("text/html");
        assert_eq!(html.parent().unwrap().as_str(), "text/plain");
        let unrelated = Mime::new("application/x-made-up");
        assert_eq!(unrelated.parent().unwrap().as_str(), "application/*");
    }
}
