//! Completion parsing.
//!
//! Turns the raw text of a completion into a [`SqlCandidate`]: the first
//! fenced SQL block is the statement, a `Confidence: <n>` line sets the
//! confidence, and everything else is the explanation. A completion with
//! no SQL block is a follow-up reply.

use std::sync::OnceLock;

use regex::Regex;

use super::SqlCandidate;

/// Confidence assumed when a completion carries SQL but does not state one.
const DEFAULT_CONFIDENCE: f32 = 1.0;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+-]*)[ \t]*\r?\n(.*?)```")
            .expect("fence pattern is valid")
    })
}

fn confidence_regex() -> &'static Regex {
    static CONFIDENCE: OnceLock<Regex> = OnceLock::new();
    CONFIDENCE.get_or_init(|| {
        Regex::new(r"(?im)^[ \t]*confidence[ \t]*:[ \t]*([0-9]*\.?[0-9]+)[ \t]*$")
            .expect("confidence pattern is valid")
    })
}

/// Parses a completion into a candidate.
///
/// A ` ```sql ` block wins over an untagged block; blocks tagged with
/// another language are never taken as SQL.
pub fn parse_completion(completion: &str) -> SqlCandidate {
    let blocks: Vec<_> = fence_regex().captures_iter(completion).collect();
    let block = blocks
        .iter()
        .find(|c| c[1].eq_ignore_ascii_case("sql"))
        .or_else(|| blocks.iter().find(|c| c[1].is_empty()));

    let confidence = confidence_regex()
        .captures(completion)
        .and_then(|c| c[1].parse::<f32>().ok());

    let Some(block) = block else {
        return SqlCandidate::reply(strip_confidence(completion).trim());
    };

    let sql = block[2].trim();
    let whole = block.get(0).map_or(0..0, |m| m.range());
    let explanation = format!(
        "{}\n{}",
        completion[..whole.start].trim_end(),
        completion[whole.end..].trim_start()
    );
    let explanation = strip_confidence(explanation.trim()).trim().to_string();

    if sql.is_empty() {
        return SqlCandidate::reply(explanation);
    }
    SqlCandidate::sql(sql, explanation, confidence.unwrap_or(DEFAULT_CONFIDENCE))
}

fn strip_confidence(text: &str) -> String {
    confidence_regex().replace_all(text, "").into_owned()
}
