//! Title-matching scores (§4.1). Two scoring functions share the same
//! primitives but weight them differently: `score_title` for catalogue
//! resolution, `score_special_title` (stricter) for the specials/alias
//! mapper, which must not mismatch a loosely-numbered film against an
//! unrelated episode.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::constants::scoring::*;

/// Strips common "season"/"part"/year suffixes and folds to a whitespace-
/// and case-normalised form so titles that differ only in that noise score
/// as equal.
#[must_use]
pub fn normalize_for_matching(title: &str) -> String {
    static SUFFIX_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = SUFFIX_PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)\s*\d+(?:st|nd|rd|th)\s+Season\s*$").expect("static regex compiles"),
            Regex::new(r"(?i)\s*(?:Season|S)\s*\d+\s*$").expect("static regex compiles"),
            Regex::new(r"(?i)\s*Part\s+\d+\s*$").expect("static regex compiles"),
            Regex::new(r"\s*\(\d{4}\)\s*$").expect("static regex compiles"),
            Regex::new(r"\s*[:–—-]\s*$").expect("static regex compiles"),
        ]
    });

    let mut cleaned = title.trim().to_string();
    for re in patterns {
        cleaned = re.replace(&cleaned, "").trim().to_string();
    }

    cleaned
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn token_set(s: &str) -> HashSet<&str> {
    s.split_whitespace().collect()
}

fn token_overlap(query: &str, candidate: &str) -> (f64, f64, f64) {
    let qt = token_set(query);
    let ct = token_set(candidate);
    if qt.is_empty() || ct.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let overlap = qt.intersection(&ct).count() as f64;
    let precision = overlap / qt.len() as f64;
    let recall = overlap / ct.len() as f64;
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1)
}

/// Normalised Levenshtein similarity in `[0, 1]`; `1.0` is identical.
fn sequence_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let distance = prev[b.len()];
    1.0 - (distance as f64 / max_len as f64)
}

/// Weighted-sum score of `query` against a single normalised candidate
/// title. Not public: callers go through `score_title`/`score_special_title`
/// which normalise first and take the max over a candidate's alt titles.
fn score_normalised(query: &str, candidate: &str) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let mut score = 0.0;
    if query == candidate {
        score += WEIGHT_EXACT;
    }
    if candidate.contains(query) || query.contains(candidate) {
        score += WEIGHT_SUBSTRING;
    }

    let (precision, recall, f1) = token_overlap(query, candidate);
    score += WEIGHT_TOKEN_F1 * f1 + WEIGHT_TOKEN_PRECISION * precision + WEIGHT_TOKEN_RECALL * recall;

    if f1 >= SEQUENCE_SIMILARITY_GATE {
        score += WEIGHT_SEQUENCE * sequence_similarity(query, candidate);
    }

    score
}

/// Best score of `query` against any of a candidate's titles (its displayed
/// title plus alt titles), used by the resolver against the per-site index.
#[must_use]
pub fn score_title(query: &str, candidate_titles: &[String]) -> f64 {
    let normalised_query = normalize_for_matching(query);
    candidate_titles
        .iter()
        .map(|t| score_normalised(&normalised_query, &normalize_for_matching(t)))
        .fold(0.0, f64::max)
}

/// Stricter variant for the specials/alias mapper (§4.4): drops the
/// substring bonus (special titles are short and substring hits are common
/// false positives) and weights recall more heavily, since a special's title
/// is usually a subset of the query rather than the reverse.
#[must_use]
pub fn score_special_title(query: &str, candidate_titles: &[String]) -> f64 {
    let normalised_query = normalize_for_matching(query);
    candidate_titles
        .iter()
        .map(|t| {
            let candidate = normalize_for_matching(t);
            if normalised_query.is_empty() || candidate.is_empty() {
                return 0.0;
            }
            let mut score = 0.0;
            if normalised_query == candidate {
                score += WEIGHT_EXACT;
            }
            let (precision, recall, f1) = token_overlap(&normalised_query, &candidate);
            score += WEIGHT_TOKEN_F1 * f1 + WEIGHT_TOKEN_RECALL * recall * 2.0 + WEIGHT_TOKEN_PRECISION * precision;
            if f1 >= SEQUENCE_SIMILARITY_GATE {
                score += WEIGHT_SEQUENCE * sequence_similarity(&normalised_query, &candidate);
            }
            score
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_scores_above_floor() {
        let score = score_title(
            "Kaguya-sama Love is War",
            &["Kaguya-sama: Love is War".to_string()],
        );
        assert!(score >= CONFIDENCE_FLOOR, "score was {score}");
    }

    #[test]
    fn unrelated_title_scores_low() {
        let score = score_title("Naruto", &["One Piece".to_string()]);
        assert!(score < CONFIDENCE_FLOOR, "score was {score}");
    }

    #[test]
    fn special_scoring_is_stricter_on_partial_overlap() {
        let generic = score_title("Naruto Movie", &["Naruto the Last Movie".to_string()]);
        let special = score_special_title("Naruto Movie", &["Naruto the Last Movie".to_string()]);
        assert!(special <= generic + 0.01);
    }
}
