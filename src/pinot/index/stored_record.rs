//! Stored record format (spec §3, §6): ASCII, newline-delimited `key=value`
//! lines. `=` never appears inside a value — it is replaced with a space at
//! write time so the record stays parseable (spec §6).

use crate::document::DocumentInfo;

fn sanitize_value(value: &str) -> String {
    value.replace('=', " ")
}

/// Serializes a `DocumentInfo` into the stored record text. `sample` is
/// always written empty: it is populated at query time by the highlighter,
/// never persisted (spec §9 open question, resolved as directed).
pub fn serialize(info: &DocumentInfo) -> String {
    let mut lines = Vec::new();
    lines.push(format!("url={}", sanitize_value(&info.location)));
    lines.push("sample=".to_string());
    lines.push(format!("caption={}", sanitize_value(&info.title)));
    lines.push(format!("type={}", sanitize_value(&info.mime_type)));
    lines.push(format!("modtime={}", info.timestamp));
    lines.push(format!("language={}", sanitize_value(&info.language.to_lowercase())));
    lines.push(format!("size={}", info.size));
    lines.join("\n")
}

/// Parses a stored record back into a `DocumentInfo`. Unrecognized lines are
/// ignored; missing fields default to empty/zero. Round-trips with
/// `serialize` on all recognized fields (spec §8 invariant 6), modulo the
/// `sample` field which is never persisted and so is always empty on parse.
pub fn parse(record: &str) -> DocumentInfo {
    let mut info = DocumentInfo::new();
    for line in record.split('\n') {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "url" => info.location = value.to_string(),
            "caption" => info.title = value.to_string(),
            "type" => info.mime_type = value.to_string(),
            "modtime" => info.timestamp = value.parse().unwrap_or(0),
            "language" => info.language = value.to_string(),
            "size" => info.size = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_recognized_fields() {
        let mut info = DocumentInfo::new();
        info.location = "file:///a.txt".to_string();
        info.title = "A title".to_string();
        info.mime_type = "text/plain".to_string();
        info.timestamp = 1_700_000_000;
        info.language = "english".to_string();
        info.size = 42;

        let record = serialize(&info);
        let parsed = parse(&record);

        assert_eq!(parsed.location, info.location);
        assert_eq!(parsed.title, info.title);
        assert_eq!(parsed.mime_type, info.mime_type);
        assert_eq!(parsed.timestamp, info.timestamp);
        assert_eq!(parsed.language, info.language);
        assert_eq!(parsed.size, info.size);
    }

    #[test]
    fn sample_is_always_empty_at_write_time() {
        let info = DocumentInfo::new();
        let record = serialize(&info);
        assert!(record.contains("sample=\n") || record.ends_with("sample="));
    }

    #[test]
    fn equals_signs_in_values_are_stripped() {
        let mut info = DocumentInfo::new();
        info.title = "a=b=c".to_string();
        let record = serialize(&info);
        assert!(record.contains("caption=a b c"));
    }
}
