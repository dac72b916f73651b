//! Term prefixes and the 230-byte length limit (spec §3, §6).
//!
//! The choice of hashed vs. truncated overflow handling is per-prefix and is
//! applied from a single function so indexing and querying never disagree
//! (spec §3: "a mismatch silently breaks lookup").

use sha2::{Digest, Sha256};

/// Maximum term length in bytes (spec §3, §6).
pub const MAX_TERM_LEN: usize = 230;

/// The constant "all documents" term (spec §3 "magic term").
pub const MAGIC_TERM: &str = "Xallxdocumentsx";

/// Body term, unstemmed or stemmed depending on the index's stemming mode.
pub const PREFIX_BODY: &str = "";
/// Raw-cased body term, kept when the original token started uppercase.
pub const PREFIX_RAW: &str = "R";
/// Title term, unstemmed.
pub const PREFIX_TITLE: &str = "S";
/// Full canonical URL of the document (unique).
pub const PREFIX_URL: &str = "U";
/// Host name and each domain suffix.
pub const PREFIX_HOST: &str = "H";
/// Basename of the location.
pub const PREFIX_FILE: &str = "P";
/// Language code.
pub const PREFIX_LANGUAGE: &str = "L";
/// MIME type.
pub const PREFIX_TYPE: &str = "T";
/// Each directory prefix of the location.
pub const PREFIX_DIR: &str = "XDIR:";
/// Base file path for URLs with a query string.
pub const PREFIX_FILE_PATH: &str = "XFILE:";
/// File extension (lowercased).
pub const PREFIX_EXT: &str = "XEXT:";
/// MIME top-level class.
pub const PREFIX_CLASS: &str = "XCLASS:";
/// A user label applied to the document.
pub const PREFIX_LABEL: &str = "XLABEL:";

/// Whether overflowing values under this prefix must be hashed (to preserve
/// uniqueness) rather than truncated.
fn requires_hash(prefix: &str) -> bool {
    matches!(
        prefix,
        PREFIX_URL | PREFIX_HOST | PREFIX_FILE | PREFIX_DIR | PREFIX_FILE_PATH | PREFIX_LABEL
    )
}

/// Deterministically hashes `value` to a 16 hex character (64 bit) digest,
/// used for every overflow-prone unique-valued prefix. Must be the single
/// implementation used at both index and query time.
pub fn hash_overflow(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// Builds a complete, length-limited term from a prefix and a value,
/// truncating or hashing the value as the prefix requires (spec §3, §6).
pub fn build_term(prefix: &str, value: &str) -> String {
    let candidate = format!("{prefix}{value}");
    if candidate.len() <= MAX_TERM_LEN {
        return candidate;
    }
    if requires_hash(prefix) {
        format!("{prefix}{}", hash_overflow(value))
    } else {
        // Truncate on a char boundary so we never split a UTF-8 sequence.
        let budget = MAX_TERM_LEN - prefix.len();
        let mut end = budget.min(value.len());
        while end > 0 && !value.is_char_boundary(end) {
            end -= 1;
        }
        format!("{prefix}{}", &value[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_value_is_kept_verbatim() {
        assert_eq!(build_term(PREFIX_TYPE, "text/plain"), "Ttext/plain");
    }

    #[test]
    fn overflow_on_unique_prefix_is_hashed() {
        let long = "a".repeat(300);
        let term = build_term(PREFIX_URL, &long);
        assert!(term.len() <= MAX_TERM_LEN);
        assert!(term.starts_with(PREFIX_URL));
        // Deterministic: hashing twice gives the same term.
        assert_eq!(term, build_term(PREFIX_URL, &long));
    }

    #[test]
    fn overflow_on_non_unique_prefix_is_truncated() {
        let long = "b".repeat(300);
        let term = build_term(PREFIX_BODY, &long);
        assert_eq!(term.len(), MAX_TERM_LEN);
        assert!(term.chars().all(|c| c == 'b'));
    }

    #[test]
    fn every_term_obeys_the_length_limit() {
        for prefix in [
            PREFIX_BODY,
            PREFIX_RAW,
            PREFIX_TITLE,
            PREFIX_URL,
            PREFIX_HOST,
            PREFIX_FILE,
            PREFIX_DIR,
            PREFIX_FILE_PATH,
            PREFIX_EXT,
            PREFIX_CLASS,
            PREFIX_LABEL,
        ] {
            let long = "z".repeat(1000);
            assert!(build_term(prefix, &long).len() <= MAX_TERM_LEN);
        }
    }
}
