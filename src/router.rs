use crate::types::PoolRole;

/// Classify a statement as read- or write-bound.
///
/// A statement routes to the read pool iff its trimmed, lower-cased text starts
/// with `select` or `show`; everything else routes to the write pool. Leading
/// whitespace and leading SQL comments (`-- ...` and `/* ... */`) are skipped
/// before the prefix check. This is a syntactic heuristic, not a parser; it
/// covers the statement shapes a query builder emits.
///
/// An empty statement classifies as `Write` (conservatively routed to the pool
/// that can mutate).
#[must_use]
pub fn classify(sql: &str) -> PoolRole {
    let body = skip_leading_trivia(sql);
    let mut prefix = body.chars().take(6).collect::<String>();
    prefix.make_ascii_lowercase();

    if prefix.starts_with("select") || prefix.starts_with("show") {
        PoolRole::Read
    } else {
        PoolRole::Write
    }
}

/// Skip leading whitespace and SQL comments, returning the statement body.
fn skip_leading_trivia(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("--") {
            // Line comment runs to the end of line (or end of input).
            rest = match after.find('\n') {
                Some(pos) => &after[pos + 1..],
                None => "",
            };
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            // Unterminated block comment swallows the rest of the statement.
            rest = match after.find("*/") {
                Some(pos) => &after[pos + 2..],
                None => "",
            };
        } else {
            return trimmed;
        }
    }
}
