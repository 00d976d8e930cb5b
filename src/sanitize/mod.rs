//! Identifier sanitization for generated SQL.
//!
//! Quotes known table identifiers that contain characters illegal in bare
//! SQL (dashes, spaces, punctuation) so that generated statements execute.
//! Only identifiers present in the data source's [`IdentifierSet`] are ever
//! quoted, and only at positions where a table reference is expected:
//! after `FROM`, `JOIN`, `UPDATE`, `INTO`, `TABLE` and `TRUNCATE`, along a
//! comma-separated `FROM` list, and as the qualifier of a dotted column
//! reference (`order-items.id`). Sanitizing already sanitized text is a
//! no-op.
//!
//! Schema-qualified references (`public.order-items`) are left bare: the
//! schema name is not in the identifier set, and a name that follows a `.`
//! is never treated as a qualifier.

pub mod scanner;

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::db::Schema;
use crate::dialect::Dialect;
use scanner::{is_word_char, next_code, tokenize, Token, TokenKind};

/// Keywords after which a table reference follows.
const TABLE_ANCHORS: &[&str] = &["FROM", "JOIN", "UPDATE", "INTO", "TABLE", "TRUNCATE"];

/// Modifiers that may sit between an anchor and the table reference.
const ANCHOR_MODIFIERS: &[&str] = &["IF", "NOT", "EXISTS", "ONLY", "LATERAL"];

/// The set of identifier names known for a data source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierSet {
    names: BTreeSet<String>,
}

impl IdentifierSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every table and column name of a schema.
    pub fn from_schema(schema: &Schema) -> Self {
        schema
            .tables
            .iter()
            .flat_map(|table| {
                std::iter::once(table.name.as_str())
                    .chain(table.columns.iter().map(|c| c.name.as_str()))
            })
            .collect()
    }

    /// Adds a name to the set.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Returns true if the name is known (exact, case-sensitive match).
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over the names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns the names that need quoting and can be quoted safely under
    /// `dialect`, longest first so that `order-items-archive` wins over
    /// `order-items` at the same position.
    fn quotable(&self, dialect: &Dialect) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .iter()
            .filter(|name| needs_quoting(name) && can_quote(name, dialect))
            .collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names
    }
}

impl<S: Into<String>> FromIterator<S> for IdentifierSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Returns true if an identifier contains a character outside `[A-Za-z0-9_]`.
pub fn needs_quoting(name: &str) -> bool {
    name.chars().any(|c| !(c.is_ascii_alphanumeric() || c == '_'))
}

/// Names holding quote characters, or padded with whitespace, would need
/// escaping rather than wrapping; keywords are never quoted.
fn can_quote(name: &str, dialect: &Dialect) -> bool {
    !name.trim().is_empty()
        && name.trim() == name
        && !name.contains(['"', '`', '\''])
        && !dialect.is_reserved(name)
}

/// A generated statement before and after sanitization.
///
/// Created once per turn and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlStatement {
    raw_text: String,
    sanitized_text: String,
    was_modified: bool,
}

impl SqlStatement {
    /// A statement that passes through sanitization untouched.
    pub fn unmodified(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            sanitized_text: raw.clone(),
            raw_text: raw,
            was_modified: false,
        }
    }

    fn rewritten(raw: &str, sanitized: String) -> Self {
        Self {
            was_modified: sanitized != raw,
            raw_text: raw.to_string(),
            sanitized_text: sanitized,
        }
    }

    /// The text produced by the generator.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// The text handed to classification and execution.
    pub fn sanitized_text(&self) -> &str {
        &self.sanitized_text
    }

    /// True if sanitization changed the text.
    pub fn was_modified(&self) -> bool {
        self.was_modified
    }
}

/// Quotes known identifiers in `raw_sql` with the dialect's quote character.
///
/// Without a dialect, or with no known identifier needing quoting present in
/// the text, the statement is returned unchanged. Malformed SQL never fails;
/// positions the scanner cannot make sense of are simply left alone.
pub fn sanitize(
    raw_sql: &str,
    known_identifiers: &IdentifierSet,
    dialect: Option<&Dialect>,
) -> SqlStatement {
    let Some(dialect) = dialect else {
        return SqlStatement::unmodified(raw_sql);
    };

    let candidates: Vec<&str> = known_identifiers
        .quotable(dialect)
        .into_iter()
        .filter(|name| raw_sql.contains(name))
        .collect();
    if candidates.is_empty() {
        return SqlStatement::unmodified(raw_sql);
    }

    let mut rewriter = Rewriter::new(raw_sql, candidates);
    rewriter.quote_anchored_references();
    rewriter.quote_dotted_qualifiers();
    let sanitized = rewriter.finish(dialect);

    if sanitized != raw_sql {
        debug!(raw = raw_sql, sanitized = %sanitized, "Quoted known identifiers");
    }
    SqlStatement::rewritten(raw_sql, sanitized)
}

/// Collects the byte spans to wrap in quotes, then rebuilds the text.
struct Rewriter<'a> {
    sql: &'a str,
    tokens: Vec<Token>,
    candidates: Vec<&'a str>,
    spans: Vec<(usize, usize)>,
}

impl<'a> Rewriter<'a> {
    fn new(sql: &'a str, candidates: Vec<&'a str>) -> Self {
        Self {
            sql,
            tokens: tokenize(sql),
            candidates,
            spans: Vec::new(),
        }
    }

    fn quote_anchored_references(&mut self) {
        for i in 0..self.tokens.len() {
            let token = self.tokens[i];
            let Some(anchor) = TABLE_ANCHORS
                .iter()
                .find(|anchor| token.is_keyword(self.sql, anchor))
            else {
                continue;
            };

            let mut next = self.skip_modifiers(i + 1);
            let follows_list = *anchor == "FROM";

            while let Some(k) = next {
                let Some(after) = self.table_reference(k) else {
                    break;
                };
                if !follows_list {
                    break;
                }
                next = self.next_list_item(after);
            }
        }
    }

    /// Handles one table reference at token `k`; returns the index just past it.
    fn table_reference(&mut self, k: usize) -> Option<usize> {
        let token = self.tokens[k];
        match token.kind {
            TokenKind::QuotedIdent => Some(k + 1),
            TokenKind::Word | TokenKind::Punct => match self.match_known(k) {
                Some((end, last)) => {
                    self.add_span(token.start, end);
                    Some(last + 1)
                }
                None if token.kind == TokenKind::Word => Some(k + 1),
                None if token.is_punct(self.sql, '(') => self.skip_group(k),
                None => None,
            },
            _ => None,
        }
    }

    /// Skips a parenthesized group opening at token `open`; returns the index
    /// just past its closing parenthesis.
    fn skip_group(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (k, token) in self.tokens.iter().enumerate().skip(open) {
            if token.is_punct(self.sql, '(') {
                depth += 1;
            } else if token.is_punct(self.sql, ')') {
                depth -= 1;
                if depth == 0 {
                    return Some(k + 1);
                }
            }
        }
        None
    }

    /// After a `FROM` list item, skips an optional alias and returns the
    /// index of the next item if a comma follows.
    fn next_list_item(&self, after: usize) -> Option<usize> {
        let mut k = next_code(&self.tokens, after)?;

        if self.tokens[k].is_keyword(self.sql, "AS") {
            k = next_code(&self.tokens, k + 1)?;
            k = next_code(&self.tokens, k + 1)?;
        } else if self.is_alias(k) {
            k = next_code(&self.tokens, k + 1)?;
        }

        if self.tokens[k].is_punct(self.sql, ',') {
            next_code(&self.tokens, k + 1)
        } else {
            None
        }
    }

    fn is_alias(&self, k: usize) -> bool {
        let token = self.tokens[k];
        token.kind == TokenKind::QuotedIdent
            || (token.kind == TokenKind::Word
                && !TABLE_ANCHORS
                    .iter()
                    .chain(CLAUSE_WORDS)
                    .any(|w| token.is_keyword(self.sql, w)))
    }

    fn skip_modifiers(&self, from: usize) -> Option<usize> {
        let mut k = next_code(&self.tokens, from)?;
        while ANCHOR_MODIFIERS
            .iter()
            .any(|m| self.tokens[k].is_keyword(self.sql, m))
        {
            k = next_code(&self.tokens, k + 1)?;
        }
        Some(k)
    }

    fn quote_dotted_qualifiers(&mut self) {
        for k in 0..self.tokens.len() {
            let token = self.tokens[k];
            if !matches!(token.kind, TokenKind::Word | TokenKind::Punct) {
                continue;
            }
            let preceded_by_name = self.sql[..token.start]
                .chars()
                .next_back()
                .is_some_and(|c| is_word_char(c) || matches!(c, '.' | '-' | '"' | '`'));
            if preceded_by_name {
                continue;
            }
            let Some((end, _)) = self.match_known(k) else {
                continue;
            };

            let mut after = self.sql[end..].chars();
            let qualifies = after.next() == Some('.')
                && after
                    .next()
                    .is_some_and(|c| is_word_char(c) || matches!(c, '"' | '`' | '*'));
            if qualifies {
                self.add_span(token.start, end);
            }
        }
    }

    /// Matches the longest known identifier starting at token `k`.
    ///
    /// The match must end on a token boundary, span only words, punctuation
    /// and whitespace, and not run into a longer name. Returns the end byte
    /// and the index of the last token covered.
    fn match_known(&self, k: usize) -> Option<(usize, usize)> {
        let start = self.tokens[k].start;
        let rest = &self.sql[start..];

        self.candidates.iter().find_map(|name| {
            if !rest.starts_with(name) {
                return None;
            }
            let end = start + name.len();
            let last = self.tokens[k..]
                .iter()
                .take_while(|t| t.end <= end)
                .position(|t| t.end == end)?
                + k;
            let plain = self.tokens[k..=last].iter().all(|t| {
                matches!(
                    t.kind,
                    TokenKind::Word | TokenKind::Punct | TokenKind::Whitespace
                )
            });
            let runs_on = self.sql[end..]
                .chars()
                .next()
                .is_some_and(|c| is_word_char(c) || c == '-');
            (plain && !runs_on).then_some((end, last))
        })
    }

    fn add_span(&mut self, start: usize, end: usize) {
        let overlaps = self.spans.iter().any(|&(s, e)| s < end && start < e);
        if !overlaps {
            self.spans.push((start, end));
        }
    }

    fn finish(mut self, dialect: &Dialect) -> String {
        self.spans.sort_unstable();
        let mut out = String::with_capacity(self.sql.len() + self.spans.len() * 2);
        let mut last = 0;
        for (start, end) in self.spans {
            out.push_str(&self.sql[last..start]);
            out.push_str(&dialect.quote(&self.sql[start..end]));
            last = end;
        }
        out.push_str(&self.sql[last..]);
        out
    }
}

/// Words that end a table reference rather than alias it.
const CLAUSE_WORDS: &[&str] = &[
    "WHERE", "ON", "USING", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "UNION", "EXCEPT",
    "INTERSECT", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL", "OUTER", "SET", "VALUES",
    "SELECT", "RETURNING", "WINDOW", "FETCH", "FOR", "AS",
];
