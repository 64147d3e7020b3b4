//! Best-match search over the names offered by the schedule site.

use super::ScheduleEntity;

/// Minimum similarity accepted when the query is not a substring of the name
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

/// Similarity in `0.0..=1.0`: twice the matched characters over the total length.
///
/// Matched characters are found by taking the longest common block and recursing on
/// both sides of it.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

fn matched_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, k) = longest_block(a, b);
    if k == 0 {
        return 0;
    }
    k + matched_chars(&a[..i], &b[..j]) + matched_chars(&a[i + k..], &b[j + k..])
}

/// Longest common block as `(start_in_a, start_in_b, len)`, earliest on ties
fn longest_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        let mut cur = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let k = prev[j] + 1;
                cur[j + 1] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        prev = cur;
    }

    best
}

/// Pick the entity whose name best matches `query`, case-insensitively.
///
/// A name containing the query scores `query_len / name_len`; any other name must reach
/// [`SIMILARITY_THRESHOLD`]. Returns the entity together with its score.
pub fn best_match<'a>(query: &str, items: &'a [ScheduleEntity]) -> Option<(&'a ScheduleEntity, f64)> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    let query_len = query.chars().count();

    let mut best: Option<(&ScheduleEntity, f64)> = None;
    for item in items {
        let name = item.name.to_lowercase();
        let score = if name.contains(&query) {
            query_len as f64 / name.chars().count() as f64
        } else {
            let ratio = similarity(&query, &name);
            if ratio <= SIMILARITY_THRESHOLD {
                continue;
            }
            ratio
        };

        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((item, score));
        }
    }

    best
}
