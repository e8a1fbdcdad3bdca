use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Highest n-gram order considered by BLEU.
const MAX_NGRAM_ORDER: usize = 4;

/// WER, CER and BLEU for one reference/hypothesis pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextMetrics {
    pub wer: f64,
    pub cer: f64,
    pub bleu: f64,
}

impl TextMetrics {
    pub fn compute(reference: &str, hypothesis: &str) -> Self {
        Self {
            wer: word_error_rate(reference, hypothesis),
            cer: char_error_rate(reference, hypothesis),
            bleu: bleu_score(reference, hypothesis),
        }
    }
}

/// Levenshtein edit distance with unit insertion, deletion and substitution costs.
///
/// Keeps two rows of the DP table, so memory is O(|hypothesis|) while time
/// stays O(|reference| * |hypothesis|).
pub fn edit_distance<T: PartialEq>(reference: &[T], hypothesis: &[T]) -> usize {
    let n = hypothesis.len();
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0; n + 1];

    for (i, r) in reference.iter().enumerate() {
        curr[0] = i + 1;
        for (j, h) in hypothesis.iter().enumerate() {
            let cost = if r == h { 0 } else { 1 };
            curr[j + 1] = std::cmp::min(
                std::cmp::min(prev[j + 1] + 1, curr[j] + 1),
                prev[j] + cost,
            );
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

/// Normalizes an edit distance by the reference length.
///
/// The denominator is the reference alone, so many spurious insertions push
/// the rate above 1.0.
fn error_rate<T: PartialEq>(reference: &[T], hypothesis: &[T]) -> f64 {
    if reference.is_empty() {
        return if hypothesis.is_empty() { 0.0 } else { 1.0 };
    }
    edit_distance(reference, hypothesis) as f64 / reference.len() as f64
}

/// Word Error Rate over whitespace-separated tokens.
pub fn word_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let ref_words: Vec<&str> = reference.split_whitespace().collect();
    let hyp_words: Vec<&str> = hypothesis.split_whitespace().collect();
    error_rate(&ref_words, &hyp_words)
}

/// Character Error Rate over Unicode scalar values (not bytes).
pub fn char_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let ref_chars: Vec<char> = reference.chars().collect();
    let hyp_chars: Vec<char> = hypothesis.chars().collect();
    error_rate(&ref_chars, &hyp_chars)
}

fn ngram_counts<'a, 'b>(words: &'a [&'b str], n: usize) -> HashMap<&'a [&'b str], usize> {
    let mut counts = HashMap::new();
    if n == 0 || n > words.len() {
        return counts;
    }
    for gram in words.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

/// Clipped n-gram precision: matches are capped by the reference count.
fn clipped_precision<'a>(reference: &[&'a str], hypothesis: &[&'a str], n: usize) -> f64 {
    let hyp_counts = ngram_counts(hypothesis, n);
    let total: usize = hyp_counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let ref_counts = ngram_counts(reference, n);
    let matches: usize = hyp_counts
        .iter()
        .map(|(gram, &count)| count.min(ref_counts.get(gram).copied().unwrap_or(0)))
        .sum();
    matches as f64 / total as f64
}

/// Sentence-level BLEU without smoothing.
///
/// Orders 1..=4 are used, capped at the hypothesis length so that a short
/// hypothesis identical to its reference still scores 1.0. Any zero precision
/// among the used orders makes the score 0.
pub fn bleu_score(reference: &str, hypothesis: &str) -> f64 {
    let ref_words: Vec<&str> = reference.split_whitespace().collect();
    let hyp_words: Vec<&str> = hypothesis.split_whitespace().collect();

    if hyp_words.is_empty() {
        return 0.0;
    }

    let max_order = MAX_NGRAM_ORDER.min(hyp_words.len());
    let mut log_sum = 0.0;
    for n in 1..=max_order {
        let precision = clipped_precision(&ref_words, &hyp_words, n);
        if precision == 0.0 {
            return 0.0;
        }
        log_sum += precision.ln();
    }
    let geometric_mean = (log_sum / max_order as f64).exp();

    let ref_len = ref_words.len() as f64;
    let hyp_len = hyp_words.len() as f64;
    let brevity_penalty = if hyp_len >= ref_len {
        1.0
    } else {
        (1.0 - ref_len / hyp_len).exp()
    };

    brevity_penalty * geometric_mean
}
