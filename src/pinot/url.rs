//! URL canonicalization (spec §4.2).
//!
//! Two locations that canonicalize to the same string are treated as the
//! same document; [`canonicalize`] must be idempotent (spec §8 invariant 1).

use url::Url;

/// Canonicalizes a location string: lowercases the host, strips default
/// ports, drops fragments, resolves `.`/`..` segments, preserves the query
/// string, and trims surrounding whitespace.
pub fn canonicalize(location: &str) -> String {
    let trimmed = location.trim();

    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            strip_default_port(&mut url);
            url.to_string()
        }
        Err(_) => {
            // Not a URL understood by the `url` crate (e.g. a bare path).
            // Treat it as a file:// location, which also normalizes `.`/`..`.
            match Url::from_file_path(trimmed) {
                Ok(mut url) => {
                    url.set_fragment(None);
                    url.to_string()
                }
                Err(_) => trimmed.to_string(),
            }
        }
    }
}

fn strip_default_port(url: &mut url::Url) {
    let default_port = match url.scheme() {
        "http" => Some(80u16),
        "https" => Some(443u16),
        "ftp" => Some(21u16),
        _ => None,
    };
    if let (Some(default_port), Some(port)) = (default_port, url.port()) {
        if port == default_port {
            let _ = url.set_port(None);
        }
    }
}

/// Returns the host name of a canonicalized location, lowercased, or `None`
/// for locations without an authority component (e.g. `file://` paths).
pub fn host(location: &str) -> Option<String> {
    Url::parse(location)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// Returns the basename of the location's path component, used for the `P`
/// prefix term (spec §3).
pub fn basename(location: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    let segments: Vec<&str> = url.path_segments()?.collect();
    segments.last().filter(|s| !s.is_empty()).map(|s| s.to_string())
}

/// Returns the lowercased file extension of the location's path, used for
/// the `XEXT:` prefix term.
pub fn extension(location: &str) -> Option<String> {
    let name = basename(location)?;
    let dot = name.rfind('.')?;
    if dot == 0 || dot == name.len() - 1 {
        return None;
    }
    Some(name[dot + 1..].to_ascii_lowercase())
}

/// Returns every directory prefix of the location's path, used for the
/// `XDIR:` prefix term, e.g. `file:///a/b/c.txt` -> `["/a", "/a/b"]`.
pub fn directory_prefixes(location: &str) -> Vec<String> {
    let url = match Url::parse(location) {
        Ok(u) => u,
        Err(_) => return Vec::new(),
    };
    let segments: Vec<&str> = match url.path_segments() {
        Some(s) => s.collect(),
        None => return Vec::new(),
    };
    let mut prefixes = Vec::new();
    let mut current = String::new();
    // All but the last segment are directory components.
    if segments.len() <= 1 {
        return prefixes;
    }
    for segment in &segments[..segments.len() - 1] {
        current.push('/');
        current.push_str(segment);
        prefixes.push(current.clone());
    }
    prefixes
}

/// Returns the base file path for a URL with a query string, used for the
/// `XFILE:` prefix term (this is also how nested documents are matched and
/// unindexed, spec §4.4 "nested-document policy").
pub fn file_part(location: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    let mut without_query = url.clone();
    without_query.set_query(None);
    without_query.set_fragment(None);
    Some(without_query.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_is_idempotent() {
        let raw = "HTTP://Example.COM:80/a/../b/./c.html?x=1#frag  ";
        let once = canonicalize(raw);
        let twice = canonicalize(&once);
        assert_eq!(once, twice);
        assert!(!once.contains('#'));
        assert!(once.contains("example.com"));
        assert!(!once.contains(":80"));
    }

    #[test]
    fn basename_and_extension() {
        let loc = "file:///tmp/dir/report.PDF";
        assert_eq!(basename(loc).unwrap(), "report.PDF");
        assert_eq!(extension(loc).unwrap(), "pdf");
    }

    #[test]
    fn directory_prefixes_of_nested_path() {
        let loc = "file:///a/b/c.txt";
        assert_eq!(
            directory_prefixes(loc),
            vec!["/a".to_string(), "/a/b".to_string()]
        );
    }

    #[test]
    fn file_part_drops_query() {
        let loc = "http://example.com/search?q=1";
        assert_eq!(file_part(loc).unwrap(), "http://example.com/search");
    }
}
