//! Hand-rolled recursive-descent parser for the QP query grammar (spec §4.6).
//!
//! No query-parser crate appears anywhere in the retrieval pack for this
//! kind of grammar, so this is written from scratch the way the rest of the
//! crate's hand-rolled parsers (e.g. the stored-record line format) are:
//! a small lexer feeding a straightforward descent over precedence levels
//! `or > and > not > primary`.

use crate::error::{PinotError, Result};
use crate::tokenizer;

/// A recognized `field:value` prefix (spec §4.6 field table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Site,
    File,
    Ext,
    Title,
    Url,
    Dir,
    Lang,
    Type,
    Class,
    Label,
}

impl FieldKind {
    fn from_name(name: &str) -> Option<FieldKind> {
        Some(match name {
            "site" => FieldKind::Site,
            "file" => FieldKind::File,
            "ext" => FieldKind::Ext,
            "title" => FieldKind::Title,
            "url" => FieldKind::Url,
            "dir" => FieldKind::Dir,
            "lang" => FieldKind::Lang,
            "type" => FieldKind::Type,
            "class" => FieldKind::Class,
            "label" => FieldKind::Label,
            _ => return None,
        })
    }

    /// The term prefix this field resolves to (spec §3).
    pub fn prefix(self) -> &'static str {
        match self {
            FieldKind::Site => crate::term::PREFIX_HOST,
            FieldKind::File => crate::term::PREFIX_FILE,
            FieldKind::Ext => crate::term::PREFIX_EXT,
            FieldKind::Title => crate::term::PREFIX_TITLE,
            FieldKind::Url => crate::term::PREFIX_URL,
            FieldKind::Dir => crate::term::PREFIX_DIR,
            FieldKind::Lang => crate::term::PREFIX_LANGUAGE,
            FieldKind::Type => crate::term::PREFIX_TYPE,
            FieldKind::Class => crate::term::PREFIX_CLASS,
            FieldKind::Label => crate::term::PREFIX_LABEL,
        }
    }
}

/// Which value slot a range filter targets (spec §3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Date,
    Size,
    Time,
}

/// Parsed query AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    /// A single unstemmed word in the default (body) field.
    Term(String),
    /// A quoted phrase: words must occur at consecutive positions.
    Phrase(Vec<String>),
    /// A prefix before a trailing `*`, expanded via the term dictionary.
    Wildcard(String),
    /// `field:value` or `field:"value with spaces"`.
    Field(FieldKind, Box<QueryNode>),
    /// A whole, untokenized value for a boolean (non-positional) field
    /// filter — the literal basename/directory/url/label/etc. string,
    /// built into one term the same way index-time common terms are.
    Literal(String),
    /// `min..max` over a value slot.
    Range(RangeKind, i64, i64),
    And(Vec<QueryNode>),
    Or(Vec<QueryNode>),
    Not(Box<QueryNode>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexeme {
    Word(String),
    Quoted(String),
    LParen,
    RParen,
    And,
    Or,
}

fn lex(input: &str) -> Vec<Lexeme> {
    let mut lexemes = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                lexemes.push(Lexeme::LParen);
                i += 1;
            }
            ')' => {
                lexemes.push(Lexeme::RParen);
                i += 1;
            }
            '"' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '"' {
                    end += 1;
                }
                let text: String = chars[start..end].iter().collect();
                lexemes.push(Lexeme::Quoted(text));
                i = (end + 1).min(chars.len());
            }
            _ => {
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '(' && chars[i] != ')' && chars[i] != '"' {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "AND" => lexemes.push(Lexeme::And),
                    "OR" => lexemes.push(Lexeme::Or),
                    _ => lexemes.push(Lexeme::Word(word)),
                }
            }
        }
        // A word immediately followed by a quote with no separating space
        // (`dir:"a b"`) is re-joined: if the previous lexeme was a bare word
        // ending in ':' and we just lexed a quote, fuse them into one field
        // filter lexeme represented as Word("field:\0value").
        if let [.., Lexeme::Word(w), Lexeme::Quoted(q)] = lexemes.as_slice() {
            if w.ends_with(':') {
                let field = w.clone();
                let quoted = q.clone();
                lexemes.pop();
                lexemes.pop();
                lexemes.push(Lexeme::Word(format!("{field}\u{0}{quoted}")));
            }
        }
    }
    lexemes
}

struct Parser {
    lexemes: Vec<Lexeme>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn next(&mut self) -> Option<Lexeme> {
        let item = self.lexemes.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn parse_or(&mut self) -> Result<QueryNode> {
        let mut terms = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Lexeme::Or)) {
            self.next();
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 { terms.pop().unwrap() } else { QueryNode::Or(terms) })
    }

    fn parse_and(&mut self) -> Result<QueryNode> {
        let mut terms = vec![self.parse_unary()?];
        loop {
            match self.peek() {
                Some(Lexeme::And) => {
                    self.next();
                    terms.push(self.parse_unary()?);
                }
                Some(Lexeme::Or) | Some(Lexeme::RParen) | None => break,
                _ => terms.push(self.parse_unary()?),
            }
        }
        Ok(if terms.len() == 1 { terms.pop().unwrap() } else { QueryNode::And(terms) })
    }

    fn parse_unary(&mut self) -> Result<QueryNode> {
        if let Some(Lexeme::Word(w)) = self.peek() {
            if w == "NOT" {
                self.next();
                return Ok(QueryNode::Not(Box::new(self.parse_unary()?)));
            }
            if let Some(rest) = w.strip_prefix('-') {
                if !rest.is_empty() {
                    let rest = rest.to_string();
                    self.next();
                    return Ok(QueryNode::Not(Box::new(self.parse_word_or_field(&rest)?)));
                }
            }
            if let Some(rest) = w.strip_prefix('+') {
                if !rest.is_empty() {
                    let rest = rest.to_string();
                    self.next();
                    return self.parse_word_or_field(&rest);
                }
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<QueryNode> {
        match self.next() {
            Some(Lexeme::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Lexeme::RParen) => Ok(inner),
                    _ => Err(PinotError::QuerySyntax("expected ')'".to_string())),
                }
            }
            Some(Lexeme::Quoted(text)) => Ok(QueryNode::Phrase(phrase_words(&text))),
            Some(Lexeme::Word(w)) => self.parse_word_or_field(&w),
            Some(Lexeme::RParen) => Err(PinotError::QuerySyntax("unexpected ')'".to_string())),
            Some(Lexeme::And) | Some(Lexeme::Or) => Err(PinotError::QuerySyntax("unexpected operator".to_string())),
            None => Err(PinotError::QuerySyntax("unexpected end of query".to_string())),
        }
    }

    fn parse_word_or_field(&mut self, word: &str) -> Result<QueryNode> {
        if let Some((field_part, rest)) = word.split_once(':') {
            if let Some(field) = FieldKind::from_name(field_part) {
                return Ok(QueryNode::Field(field, Box::new(self.parse_field_value(field, rest)?)));
            }
            if let Some(range_kind) = range_kind_for(field_part) {
                return parse_range(range_kind, &rest.replace('\u{0}', ""));
            }
        }
        if let Some(prefix) = word.strip_suffix('*') {
            if !prefix.is_empty() {
                return Ok(QueryNode::Wildcard(prefix.to_string()));
            }
        }
        Ok(QueryNode::Term(word.to_string()))
    }

    /// Builds the inner node of a `field:value` filter. `title` is a real
    /// positional text field (its quoted value is a phrase of tokenized
    /// words, matching the `S`-prefixed postings written at index time);
    /// every other recognized field holds one literal, untokenized value
    /// (spec §4.6: "the same escape-and-hash transform used at indexing
    /// time", which operates on the whole basename/directory/label string,
    /// never on its individual words).
    fn parse_field_value(&mut self, field: FieldKind, rest: &str) -> Result<QueryNode> {
        let is_quoted = rest.starts_with('\u{0}');
        let raw = rest.strip_prefix('\u{0}').unwrap_or(rest);

        if !is_quoted {
            if let Some(prefix) = raw.strip_suffix('*') {
                if !prefix.is_empty() {
                    return Ok(QueryNode::Wildcard(prefix.to_string()));
                }
            }
        }

        if field == FieldKind::Title {
            return Ok(if is_quoted {
                QueryNode::Phrase(phrase_words(raw))
            } else {
                QueryNode::Term(raw.to_string())
            });
        }
        Ok(QueryNode::Literal(raw.to_string()))
    }
}

fn range_kind_for(name: &str) -> Option<RangeKind> {
    match name {
        "date" => Some(RangeKind::Date),
        "size" => Some(RangeKind::Size),
        "time" => Some(RangeKind::Time),
        _ => None,
    }
}

fn parse_range(kind: RangeKind, raw: &str) -> Result<QueryNode> {
    let (min_raw, max_raw) = raw
        .split_once("..")
        .ok_or_else(|| PinotError::QuerySyntax(format!("expected 'min..max' in '{raw}'")))?;
    let (min, max) = match kind {
        RangeKind::Date => (parse_digits(min_raw)?, parse_digits(max_raw)?),
        RangeKind::Size => (parse_size(min_raw)?, parse_size(max_raw)?),
        RangeKind::Time => (parse_digits(min_raw)?, parse_digits(max_raw)?),
    };
    Ok(QueryNode::Range(kind, min, max))
}

fn parse_digits(raw: &str) -> Result<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits
        .parse()
        .map_err(|_| PinotError::QuerySyntax(format!("invalid range bound '{raw}'")))
}

fn parse_size(raw: &str) -> Result<i64> {
    let trimmed = raw.trim_end_matches(['b', 'B']);
    trimmed
        .parse()
        .map_err(|_| PinotError::QuerySyntax(format!("invalid size bound '{raw}'")))
}

/// Splits a phrase into its constituent words using the same tokenizer as
/// indexing, so phrase term text matches indexed term text exactly.
fn phrase_words(text: &str) -> Vec<String> {
    tokenizer::tokenize(text).into_iter().map(|t| t.text).collect()
}

/// Parses `query` into a [`QueryNode`] tree (spec §4.6).
pub fn parse(query: &str) -> Result<QueryNode> {
    let lexemes = lex(query);
    if lexemes.is_empty() {
        return Err(PinotError::QuerySyntax("empty query".to_string()));
    }
    let mut parser = Parser { lexemes, pos: 0 };
    let node = parser.parse_or()?;
    if parser.pos != parser.lexemes.len() {
        return Err(PinotError::QuerySyntax("trailing tokens after query".to_string()));
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_word() {
        assert_eq!(parse("hello").unwrap(), QueryNode::Term("hello".to_string()));
    }

    #[test]
    fn parses_implicit_and() {
        let node = parse("hello world").unwrap();
        assert_eq!(
            node,
            QueryNode::And(vec![QueryNode::Term("hello".to_string()), QueryNode::Term("world".to_string())])
        );
    }

    #[test]
    fn parses_or() {
        let node = parse("hello OR world").unwrap();
        assert_eq!(
            node,
            QueryNode::Or(vec![QueryNode::Term("hello".to_string()), QueryNode::Term("world".to_string())])
        );
    }

    #[test]
    fn parses_not_and_minus() {
        assert_eq!(parse("NOT hello").unwrap(), QueryNode::Not(Box::new(QueryNode::Term("hello".to_string()))));
        assert_eq!(parse("-hello").unwrap(), QueryNode::Not(Box::new(QueryNode::Term("hello".to_string()))));
    }

    #[test]
    fn parses_quoted_phrase() {
        let node = parse("\"hello world\"").unwrap();
        assert_eq!(node, QueryNode::Phrase(vec!["hello".to_string(), "world".to_string()]));
    }

    #[test]
    fn parses_wildcard() {
        assert_eq!(parse("tele*").unwrap(), QueryNode::Wildcard("tele".to_string()));
    }

    #[test]
    fn parses_field_filter() {
        let node = parse("site:example.com").unwrap();
        assert_eq!(
            node,
            QueryNode::Field(FieldKind::Site, Box::new(QueryNode::Term("example.com".to_string())))
        );
    }

    #[test]
    fn parses_quoted_field_filter() {
        let node = parse("dir:\"My Documents\"").unwrap();
        assert_eq!(
            node,
            QueryNode::Field(FieldKind::Dir, Box::new(QueryNode::Literal("My Documents".to_string())))
        );
    }

    #[test]
    fn parses_quoted_title_filter_as_phrase() {
        let node = parse("title:\"Annual Report\"").unwrap();
        assert_eq!(
            node,
            QueryNode::Field(
                FieldKind::Title,
                Box::new(QueryNode::Phrase(vec!["Annual".to_string(), "Report".to_string()]))
            )
        );
    }

    #[test]
    fn parses_date_range() {
        let node = parse("date:20200101..20201231").unwrap();
        assert_eq!(node, QueryNode::Range(RangeKind::Date, 20200101, 20201231));
    }

    #[test]
    fn parses_size_range() {
        let node = parse("size:10b..1000b").unwrap();
        assert_eq!(node, QueryNode::Range(RangeKind::Size, 10, 1000));
    }

    #[test]
    fn parses_grouping() {
        let node = parse("(hello OR world) AND greeting").unwrap();
        assert_eq!(
            node,
            QueryNode::And(vec![
                QueryNode::Or(vec![QueryNode::Term("hello".to_string()), QueryNode::Term("world".to_string())]),
                QueryNode::Term("greeting".to_string()),
            ])
        );
    }

    #[test]
    fn rejects_unbalanced_parens() {
        assert!(parse("(hello").is_err());
    }
}
