//! Identifier sanitization through the public API.

use pretty_assertions::assert_eq;
use querygate::dialect::{self, DatabaseBackend, Dialect};
use querygate::pipeline::sanitize_for;
use querygate::sanitize::{sanitize, IdentifierSet};

fn known(names: &[&str]) -> IdentifierSet {
    names.iter().copied().collect()
}

fn dialects() -> Vec<Dialect> {
    vec![
        Dialect::for_backend(DatabaseBackend::Postgres),
        Dialect::for_backend(DatabaseBackend::Mysql),
        Dialect::for_backend(DatabaseBackend::Sqlite),
    ]
}

/// Statements a generator might plausibly produce, with the identifiers of
/// their data source.
fn corpus() -> Vec<(&'static str, IdentifierSet)> {
    let shop = known(&[
        "order-items",
        "order-items-archive",
        "user-accounts",
        "order-history",
        "unit-price",
        "user_id",
        "id",
        "order",
        "line item",
    ]);
    vec![
        ("SELECT * FROM order-items", shop.clone()),
        (
            "SELECT * FROM user-accounts JOIN order-history ON user-accounts.id = order-history.user_id",
            shop.clone(),
        ),
        ("SELECT a.id FROM order-items a, user-accounts AS u WHERE a.id = u.id", shop.clone()),
        ("SELECT * FROM order-items-archive", shop.clone()),
        ("SELECT * FROM \"order-items\"", shop.clone()),
        ("SELECT * FROM `order-items`", shop.clone()),
        ("SELECT 'FROM order-items' AS note FROM order-items", shop.clone()),
        ("SELECT * FROM order-items -- FROM order-items", shop.clone()),
        ("SELECT * FROM /* order-items */ order-items", shop.clone()),
        ("UPDATE order-items SET qty = 2 WHERE id = 1", shop.clone()),
        ("INSERT INTO order-items (id) VALUES (1)", shop.clone()),
        ("DELETE FROM order-items WHERE id IN (SELECT id FROM order-history)", shop.clone()),
        ("TRUNCATE TABLE order-items", shop.clone()),
        ("DROP TABLE IF EXISTS order-items", shop.clone()),
        ("SELECT * FROM line item", shop.clone()),
        ("SELECT order-items.* FROM order-items", shop.clone()),
        ("SELECT * FROM order-items-2024", shop.clone()),
        ("SELECT * FROM unknown-table JOIN order-items ON true", shop.clone()),
        ("select * from ORDER-ITEMS", shop.clone()),
        ("SELECT * FROM order", shop.clone()),
        ("SELECT * FROM (SELECT id FROM order-history) h, order-items", shop.clone()),
        ("SELECT * FROM (SELECT 1, order-items", shop.clone()),
        ("", shop.clone()),
        ("not sql at all FROM FROM FROM", shop.clone()),
        ("SELECT * FROM order-items; DELETE FROM order-history", shop.clone()),
        ("SELECT * FROM 'unterminated", shop),
    ]
}

/// Returns the segments wrapped in quotes that `sanitized` adds to `raw`.
///
/// Panics if the two texts differ by anything other than inserted quotes.
fn inserted_segments(raw: &str, sanitized: &str, quote: char) -> Vec<String> {
    let mut raw_chars = raw.chars().peekable();
    let mut segments = Vec::new();
    let mut open: Option<String> = None;

    for c in sanitized.chars() {
        if raw_chars.peek() == Some(&c) {
            raw_chars.next();
            if let Some(segment) = open.as_mut() {
                segment.push(c);
            }
            continue;
        }
        assert_eq!(c, quote, "unexpected change in {sanitized:?}");
        match open.take() {
            Some(segment) => segments.push(segment),
            None => open = Some(String::new()),
        }
    }
    assert!(raw_chars.next().is_none(), "text dropped from {raw:?}");
    assert!(open.is_none(), "unbalanced quotes in {sanitized:?}");
    segments
}

#[test]
fn test_scenario_a() {
    let statement = sanitize(
        "SELECT * FROM order-items",
        &known(&["order-items"]),
        Some(&dialect::resolve("postgres").unwrap()),
    );
    assert_eq!(statement.sanitized_text(), "SELECT * FROM \"order-items\"");
    assert!(statement.was_modified());
}

#[test]
fn test_scenario_b() {
    let statement = sanitize(
        "SELECT * FROM user-accounts JOIN order-history ON user-accounts.id = order-history.user_id",
        &known(&["user-accounts", "order-history"]),
        Some(&dialect::resolve("postgres").unwrap()),
    );
    assert_eq!(
        statement.sanitized_text(),
        "SELECT * FROM \"user-accounts\" JOIN \"order-history\" ON \"user-accounts\".id = \"order-history\".user_id"
    );
}

#[test]
fn test_mysql_url_uses_backticks() {
    let dialect = dialect::resolve("mysql://root:pw@localhost:3306/shop").unwrap();
    let statement = sanitize("SELECT * FROM order-items", &known(&["order-items"]), Some(&dialect));
    assert_eq!(statement.sanitized_text(), "SELECT * FROM `order-items`");
}

#[test]
fn test_unsupported_dialect_is_reported() {
    let err = dialect::resolve("oracle").unwrap_err();
    assert_eq!(err.kind(), "UnsupportedDialect");
}

#[test]
fn test_unsupported_dialect_passes_statement_through() {
    let statement = sanitize_for("SELECT * FROM order-items", &known(&["order-items"]), "oracle");
    assert_eq!(statement.sanitized_text(), "SELECT * FROM order-items");
    assert!(!statement.was_modified());

    let statement = sanitize_for("SELECT * FROM order-items", &known(&["order-items"]), "postgres");
    assert_eq!(statement.sanitized_text(), "SELECT * FROM \"order-items\"");
}

#[test]
fn test_sanitize_is_idempotent() {
    for dialect in dialects() {
        for (sql, identifiers) in corpus() {
            let once = sanitize(sql, &identifiers, Some(&dialect));
            let twice = sanitize(once.sanitized_text(), &identifiers, Some(&dialect));
            assert_eq!(
                twice.sanitized_text(),
                once.sanitized_text(),
                "not idempotent for {sql:?} under {:?}",
                dialect.backend()
            );
            assert!(!twice.was_modified());
        }
    }
}

#[test]
fn test_only_known_non_keyword_names_are_quoted() {
    for dialect in dialects() {
        for (sql, identifiers) in corpus() {
            let statement = sanitize(sql, &identifiers, Some(&dialect));
            let segments =
                inserted_segments(sql, statement.sanitized_text(), dialect.quote_char());
            for segment in &segments {
                assert!(identifiers.contains(segment), "quoted unknown {segment:?} in {sql:?}");
                assert!(!dialect.is_reserved(segment), "quoted keyword {segment:?} in {sql:?}");
            }
            assert_eq!(statement.was_modified(), !segments.is_empty());
        }
    }
}

#[test]
fn test_text_inside_literals_and_comments_is_untouched() {
    let dialect = dialect::resolve("postgres").unwrap();
    let identifiers = known(&["order-items"]);

    let statement = sanitize(
        "SELECT 'FROM order-items' AS note FROM order-items -- FROM order-items",
        &identifiers,
        Some(&dialect),
    );
    assert_eq!(
        statement.sanitized_text(),
        "SELECT 'FROM order-items' AS note FROM \"order-items\" -- FROM order-items"
    );
}

#[test]
fn test_names_without_special_characters_are_left_bare() {
    let dialect = dialect::resolve("postgres").unwrap();
    let statement = sanitize("SELECT * FROM orders", &known(&["orders"]), Some(&dialect));
    assert!(!statement.was_modified());
}
