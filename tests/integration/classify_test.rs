//! Operation classification through the public API.

use pretty_assertions::assert_eq;
use querygate::pipeline::prepare;
use querygate::safety::{classify, OperationKind, RiskPolicy, RiskTier, SqlClassifier};
use querygate::sanitize::IdentifierSet;

#[test]
fn test_every_non_empty_input_has_one_kind() {
    let cases = [
        ("SELECT 1", OperationKind::Read),
        ("  (SELECT 1) UNION (SELECT 2)", OperationKind::Read),
        ("WITH t AS (SELECT 1) SELECT * FROM t", OperationKind::Read),
        ("insert into t values (1)", OperationKind::Insert),
        ("UPDATE t SET a = 1", OperationKind::Update),
        ("DELETE FROM t", OperationKind::Delete),
        ("DROP TABLE t", OperationKind::Drop),
        ("TRUNCATE t", OperationKind::Truncate),
        ("ALTER TABLE t ADD COLUMN c int", OperationKind::Alter),
        ("GRANT ALL ON t TO bob", OperationKind::OtherMutation),
        ("VACUUM", OperationKind::OtherMutation),
        ("-- just a comment", OperationKind::OtherMutation),
        ("???", OperationKind::OtherMutation),
    ];
    for (sql, expected) in cases {
        assert_eq!(classify(sql), expected, "{sql}");
    }
}

#[test]
fn test_unknown_verbs_are_never_read() {
    for sql in ["EXPLAIN SELECT 1", "SHOW TABLES", "CALL cleanup()", "COPY t FROM 'x'"] {
        assert_ne!(classify(sql), OperationKind::Read, "{sql}");
    }
}

#[test]
fn test_data_modifying_cte_is_not_read() {
    let sql = "WITH moved AS (DELETE FROM t WHERE old RETURNING *) INSERT INTO archive SELECT * FROM moved";
    let kind = classify(sql);
    assert!(kind.is_mutating());
    assert_eq!(kind, OperationKind::Delete);
}

#[test]
fn test_multi_statement_takes_most_dangerous() {
    let classification = SqlClassifier::default().classify("SELECT 1; UPDATE t SET a = 1; DROP TABLE t");
    assert_eq!(classification.kind, OperationKind::Drop);
    assert_eq!(classification.risk, Some(RiskTier::High));
    assert_eq!(classification.statement_count, 3);
    assert!(classification.warning.unwrap().contains("3 statements"));
}

#[test]
fn test_semicolon_inside_literal_does_not_split() {
    let classification = SqlClassifier::default().classify("SELECT 'a; DROP TABLE t'");
    assert_eq!(classification.kind, OperationKind::Read);
    assert_eq!(classification.statement_count, 1);
}

#[test]
fn test_policy_controls_configurable_tiers() {
    let policy = RiskPolicy {
        insert: RiskTier::High,
        alter: RiskTier::Low,
        ..RiskPolicy::default()
    };
    let classifier = SqlClassifier::new(policy);

    assert_eq!(classifier.classify("INSERT INTO t VALUES (1)").risk, Some(RiskTier::High));
    assert_eq!(classifier.classify("ALTER TABLE t ADD c int").risk, Some(RiskTier::Low));
    assert_eq!(classifier.classify("DELETE FROM t").risk, Some(RiskTier::High));
    assert_eq!(classifier.classify("SELECT 1").risk, None);
}

#[test]
fn test_scenario_c_prepare() {
    let identifiers: IdentifierSet = ["table-name"].into_iter().collect();
    let prepared = prepare(
        "DELETE FROM table-name",
        &identifiers,
        "postgres",
        &SqlClassifier::default(),
    );
    assert_eq!(prepared.statement.sanitized_text(), "DELETE FROM \"table-name\"");
    assert_eq!(prepared.classification.kind, OperationKind::Delete);
    assert_eq!(prepared.classification.risk, Some(RiskTier::High));
    assert!(prepared.classification.requires_confirmation());
}
