//! Scoring helpers for evaluating generated answers against gold answers.
//!
//! Uses the lossy [`fold_for_matching`] normalization so that hamza and ta
//! marbuta variants count as matches. That folding never touches pipeline
//! text; it exists only on this scoring path.

use std::collections::HashMap;

use crate::normalize::fold_for_matching;

fn tokenize(text: &str) -> Vec<String> {
    fold_for_matching(text).split_whitespace().map(String::from).collect()
}

fn counts(tokens: &[String]) -> HashMap<&str, usize> {
    let mut map = HashMap::new();
    for token in tokens {
        *map.entry(token.as_str()).or_insert(0) += 1;
    }
    map
}

/// Token-level F1 between a prediction and a gold answer.
///
/// Returns 0.0 when either side has no tokens or there is no overlap.
pub fn token_f1(prediction: &str, gold: &str) -> f64 {
    let pred_tokens = tokenize(prediction);
    let gold_tokens = tokenize(gold);
    if pred_tokens.is_empty() || gold_tokens.is_empty() {
        return 0.0;
    }

    let pred_counts = counts(&pred_tokens);
    let gold_counts = counts(&gold_tokens);
    let overlap: usize = pred_counts
        .iter()
        .map(|(token, n)| n.min(gold_counts.get(token).unwrap_or(&0)))
        .sum();
    if overlap == 0 {
        return 0.0;
    }

    let precision = overlap as f64 / pred_tokens.len() as f64;
    let recall = overlap as f64 / gold_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_scores_one() {
        assert_eq!(token_f1("القدس عاصمة فلسطين", "القدس عاصمة فلسطين"), 1.0);
    }

    #[test]
    fn folding_forgives_letter_variants() {
        // Hamza and ta marbuta differences still count as a full match.
        assert_eq!(token_f1("أحمد في المدرسة", "احمد في المدرسه"), 1.0);
    }

    #[test]
    fn disjoint_answers_score_zero() {
        assert_eq!(token_f1("القاهرة", "القدس"), 0.0);
    }

    #[test]
    fn empty_sides_score_zero() {
        assert_eq!(token_f1("", "القدس"), 0.0);
        assert_eq!(token_f1("القدس", ""), 0.0);
    }

    #[test]
    fn partial_overlap_is_between_zero_and_one() {
        let score = token_f1("القدس عاصمة فلسطين", "القدس مدينة فلسطينية");
        assert!(score > 0.0 && score < 1.0);
    }
}
