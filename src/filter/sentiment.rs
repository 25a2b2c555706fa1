//! Keyword scoring of web search results

use ethers::types::Address;

use crate::oracle::SearchHit;

/// Search query for a token: `"<symbol> <suffix>"`, falling back to the
/// token address when the symbol could not be read
pub fn search_query(symbol: Option<&str>, token: Address, suffix: &str) -> String {
    let subject = match symbol.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => format!("{:?}", token),
    };

    if suffix.is_empty() {
        subject
    } else {
        format!("{} {}", subject, suffix)
    }
}

/// Number of hits whose title or snippet mentions any keyword.
///
/// Matching is case-insensitive substring matching, so "up" also matches
/// "update". Each hit counts at most once.
pub fn count_positive(hits: &[SearchHit], keywords: &[String]) -> usize {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    hits.iter()
        .filter(|hit| {
            let text = format!("{} {}", hit.title, hit.snippet).to_lowercase();
            keywords.iter().any(|k| text.contains(k.as_str()))
        })
        .count()
}
