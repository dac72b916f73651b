//! Splits text into terms (spec §4.5 step 4, §4.6 CJKV handling).
//!
//! A token is a maximal run of Unicode alphanumeric characters. Runs made
//! entirely of CJKV characters are not sub-segmented (no dictionary is
//! available per spec §1's scope), which already satisfies "adjacent CJKV
//! characters form one token" for the common case of unsegmented CJK text.

use unicode_normalization::UnicodeNormalization;

/// One raw token extracted from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token text, original casing preserved.
    pub text: String,
    /// Whether the first character was uppercase (drives the `R` prefix,
    /// spec §3/§4.5).
    pub starts_uppercase: bool,
    /// Whether every character in the token is a CJKV character.
    pub is_cjkv: bool,
}

/// Returns true for characters in the common CJK Unified Ideographs,
/// Hiragana, Katakana, Hangul, and CJK symbol ranges.
pub fn is_cjkv_char(c: char) -> bool {
    matches!(c as u32,
        0x2E80..=0x2EFF   // CJK Radicals Supplement
        | 0x3040..=0x30FF // Hiragana + Katakana
        | 0x3400..=0x4DBF // CJK Extension A
        | 0x4E00..=0x9FFF // CJK Unified Ideographs
        | 0xAC00..=0xD7A3 // Hangul Syllables
        | 0xF900..=0xFAFF // CJK Compatibility Ideographs
    )
}

/// Tokenizes `text` into maximal runs of alphanumeric Unicode characters.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_cjkv = true;

    let mut flush = |current: &mut String, current_is_cjkv: &mut bool, tokens: &mut Vec<Token>| {
        if !current.is_empty() {
            let first = current.chars().next().unwrap();
            tokens.push(Token {
                text: std::mem::take(current),
                starts_uppercase: first.is_uppercase(),
                is_cjkv: *current_is_cjkv,
            });
        }
        *current_is_cjkv = true;
    };

    for c in text.chars() {
        if c.is_alphanumeric() {
            current_is_cjkv &= is_cjkv_char(c);
            current.push(c);
        } else {
            flush(&mut current, &mut current_is_cjkv, &mut tokens);
        }
    }
    flush(&mut current, &mut current_is_cjkv, &mut tokens);

    tokens
}

/// Whether `text` contains at least one CJKV character.
pub fn contains_cjkv(text: &str) -> bool {
    text.chars().any(is_cjkv_char)
}

/// Whether `text`, once tokenized, consists only of CJKV tokens ("pure
/// CJKV", spec §4.6): no stemming pass is attempted for such queries.
pub fn is_pure_cjkv(text: &str) -> bool {
    let tokens = tokenize(text);
    !tokens.is_empty() && tokens.iter().all(|t| t.is_cjkv)
}

/// Strips diacritics via NFKD decomposition, dropping combining marks. Used
/// when diacritic-sensitive mode is off (spec §4.6).
pub fn strip_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_whitespace() {
        let tokens = tokenize("Hello, world! ...100");
        let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["Hello", "world", "100"]);
        assert!(tokens[0].starts_uppercase);
        assert!(!tokens[1].starts_uppercase);
    }

    #[test]
    fn cjkv_run_is_one_token() {
        let tokens = tokenize("日本語 test");
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].is_cjkv);
        assert_eq!(tokens[0].text, "日本語");
        assert!(!tokens[1].is_cjkv);
    }

    #[test]
    fn pure_cjkv_query_detection() {
        assert!(is_pure_cjkv("日本語"));
        assert!(!is_pure_cjkv("日本語 test"));
        assert!(!is_pure_cjkv(""));
    }

    #[test]
    fn diacritics_are_stripped() {
        assert_eq!(strip_diacritics("café"), "cafe");
    }
}
