//! Text analysis for the search index.
//!
//! Tokenization (NFKC-normalized, case-folded, split on non-alphanumerics),
//! bounded edit-distance matching for fuzzy terms, and escaping of query
//! syntax characters.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Characters with query-syntax meaning that must be escaped in raw input.
const SPECIAL_CHARS: &[char] = &[
    '\\', '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '/', '"', '~', '*', '?', ':',
];

/// Split a string into normalized tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.nfkc()
        .collect::<String>()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Escape every query-syntax character with a backslash.
pub fn escape_query(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Whether a word consists only of characters that would have to be escaped.
pub fn is_escape_only(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| SPECIAL_CHARS.contains(&c))
}

fn trailing_special() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*)([:!])$").expect("valid regex"))
}

/// A query string ending in a bare `:` or `!` would otherwise be invalid
/// syntax; escape the trailing special character.
pub fn escape_trailing_special(query: &str) -> String {
    if let Some(caps) = trailing_special().captures(query) {
        tracing::trace!(query, "escaping trailing special character in query");
        return format!("{}\\{}", &caps[1], &caps[2]);
    }
    query.to_string()
}

/// The edit distance allowed for a term, scaled down for short terms the
/// way a fixed fuzziness would otherwise overwhelm them.
fn effective_fuzziness(term_len: usize, fuzziness: usize) -> usize {
    match term_len {
        0..=2 => 0,
        3..=5 => fuzziness.min(1),
        _ => fuzziness,
    }
}

/// Bounded edit-distance check (optimal string alignment: insertions,
/// deletions, substitutions, and adjacent transpositions each cost one).
fn within_edit_distance(a: &str, b: &str, max: usize) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > max {
        return false;
    }
    let mut before: Vec<usize> = vec![0; b.len() + 1];
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        let mut row_min = current[0];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            let mut best = (prev[j] + cost).min(prev[j + 1] + 1).min(current[j] + 1);
            if i > 0 && j > 0 && *ca == b[j - 1] && a[i - 1] == *cb {
                best = best.min(before[j - 1] + 1);
            }
            current[j + 1] = best;
            row_min = row_min.min(best);
        }
        if row_min > max {
            return false;
        }
        std::mem::swap(&mut before, &mut prev);
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()] <= max
}

/// Match quality of a query term against an indexed token.
///
/// Exact matches score 1.0; fuzzy matches are discounted per edit.
/// Returns `None` when the token is not a match.
pub fn term_match(term: &str, token: &str, fuzziness: usize) -> Option<f64> {
    if term == token {
        return Some(1.0);
    }
    let allowed = effective_fuzziness(term.chars().count(), fuzziness);
    if allowed > 0 && within_edit_distance(term, token, allowed) {
        return Some(0.5);
    }
    None
}
