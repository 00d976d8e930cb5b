//! Byte-span tokenizer for SQL text.
//!
//! Splits SQL into words, punctuation, whitespace, comments, string literals
//! and quoted identifiers without interpreting grammar. Every token records
//! its byte range in the source so callers can rewrite text in place, and
//! the tokens of any input always cover it exactly, end to end.

/// Lexical category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Run of letters, digits, `_` and `$` (keywords, bare identifiers, numbers).
    Word,
    /// `"…"` or `` `…` `` quoted identifier.
    QuotedIdent,
    /// `'…'` or dollar-quoted (`$tag$…$tag$`) literal.
    StringLiteral,
    /// `-- …` or `/* … */`.
    Comment,
    Whitespace,
    /// Any other single character.
    Punct,
}

/// A token and its byte range in the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// Returns the token's text within `sql`.
    pub fn text<'a>(&self, sql: &'a str) -> &'a str {
        &sql[self.start..self.end]
    }

    /// Returns true for whitespace and comments.
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// Returns true if this is a word equal to `keyword`, ignoring case.
    pub fn is_keyword(&self, sql: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text(sql).eq_ignore_ascii_case(keyword)
    }

    /// Returns true if this is the punctuation character `c`.
    pub fn is_punct(&self, sql: &str, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text(sql).starts_with(c)
    }
}

/// Returns true for characters that may start a bare word.
pub fn is_word_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Returns true for characters that may continue a bare word.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Tokenizes SQL text. Unterminated literals and comments run to the end of input.
pub fn tokenize(sql: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(c) = sql[pos..].chars().next() {
        let rest = &sql[pos..];
        let (kind, len) = if c.is_whitespace() {
            (TokenKind::Whitespace, prefix_len(rest, char::is_whitespace))
        } else if rest.starts_with("--") {
            (TokenKind::Comment, rest.find('\n').unwrap_or(rest.len()))
        } else if rest.starts_with("/*") {
            let len = rest[2..].find("*/").map_or(rest.len(), |i| i + 4);
            (TokenKind::Comment, len)
        } else if c == '\'' {
            (TokenKind::StringLiteral, quoted_len(rest, b'\''))
        } else if c == '"' || c == '`' {
            (TokenKind::QuotedIdent, quoted_len(rest, c as u8))
        } else if c == '$' {
            match dollar_quoted_len(rest) {
                Some(len) => (TokenKind::StringLiteral, len),
                None => (TokenKind::Punct, 1),
            }
        } else if is_word_start(c) {
            (TokenKind::Word, prefix_len(rest, is_word_char))
        } else {
            (TokenKind::Punct, c.len_utf8())
        };

        tokens.push(Token {
            kind,
            start: pos,
            end: pos + len,
        });
        pos += len;
    }

    tokens
}

/// Splits SQL into statements at semicolons outside literals and comments.
///
/// Returned slices exclude the separators; empty segments are kept so that
/// callers can decide how to treat them.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;

    for token in tokenize(sql) {
        if token.is_punct(sql, ';') {
            statements.push(&sql[start..token.start]);
            start = token.end;
        }
    }
    statements.push(&sql[start..]);

    statements
}

/// Returns the index of the first non-trivia token at or after `from`.
pub fn next_code(tokens: &[Token], from: usize) -> Option<usize> {
    (from..tokens.len()).find(|&i| !tokens[i].is_trivia())
}

fn prefix_len(text: &str, pred: impl Fn(char) -> bool) -> usize {
    text.char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(text.len(), |(i, _)| i)
}

/// Length of a quoted run starting at `text[0]`; a doubled quote is an escape.
fn quoted_len(text: &str, quote: u8) -> usize {
    let bytes = text.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Length of a PostgreSQL dollar-quoted literal, or None if `text` does not start one.
fn dollar_quoted_len(text: &str) -> Option<usize> {
    let tag_end = text[1..].find('$')? + 1;
    let tag = &text[1..tag_end];
    let valid_tag = tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !tag.starts_with(|c: char| c.is_ascii_digit());
    if !valid_tag {
        return None;
    }

    let delimiter = &text[..=tag_end];
    let body_start = delimiter.len();
    let close = text[body_start..].find(delimiter)?;
    Some(body_start + close + delimiter.len())
}
