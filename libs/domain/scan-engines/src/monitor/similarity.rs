// [libs/domain/scan-engines/src/monitor/similarity.rs]

//! The four-part weighted similarity measure (§4.4): edit distance,
//! cosine over token frequencies, Jaccard over character 3-grams, and
//! LCS, each independently in `[0, 1]` and combined as
//! `0.45*edit + 0.25*cosine + 0.20*jaccard + 0.10*lcs`.

use std::collections::HashMap;
use std::collections::HashSet;

const WEIGHT_EDIT: f64 = 0.45;
const WEIGHT_COSINE: f64 = 0.25;
const WEIGHT_JACCARD: f64 = 0.20;
const WEIGHT_LCS: f64 = 0.10;

/// Combined similarity of two preprocessed content strings, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    WEIGHT_EDIT * edit_distance_similarity(a, b)
        + WEIGHT_COSINE * cosine_similarity(a, b)
        + WEIGHT_JACCARD * jaccard_similarity(a, b)
        + WEIGHT_LCS * lcs_similarity(a, b)
}

/// `1 - levenshtein(a, b) / max(|a|, |b|)`, computed with a rolling
/// two-row array so space stays `O(min(|a|, |b|))`.
pub fn edit_distance_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a, &b);
    1.0 - (distance as f64 / max_len as f64)
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    // Keep `a` as the shorter sequence so the rolling rows stay small.
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let mut previous: Vec<usize> = (0..=shorter.len()).collect();
    let mut current = vec![0usize; shorter.len() + 1];

    for (i, &lc) in longer.iter().enumerate() {
        current[0] = i + 1;
        for (j, &sc) in shorter.iter().enumerate() {
            let cost = if lc == sc { 0 } else { 1 };
            current[j + 1] = (previous[j] + cost).min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[shorter.len()]
}

/// Cosine similarity over token-frequency vectors, tokens being
/// lowercased alphanumeric runs of length >= 2.
pub fn cosine_similarity(a: &str, b: &str) -> f64 {
    let freq_a = token_frequencies(a);
    let freq_b = token_frequencies(b);
    if freq_a.is_empty() && freq_b.is_empty() {
        return 1.0;
    }
    if freq_a.is_empty() || freq_b.is_empty() {
        return 0.0;
    }

    let dot: f64 = freq_a.iter().map(|(tok, &count)| count as f64 * *freq_b.get(tok).unwrap_or(&0) as f64).sum();
    let norm_a: f64 = freq_a.values().map(|&c| (c as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = freq_b.values().map(|&c| (c as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn token_frequencies(text: &str) -> HashMap<String, u32> {
    let mut frequencies = HashMap::new();
    let mut current = String::new();
    for ch in text.chars().chain(std::iter::once(' ')) {
        if ch.is_alphanumeric() {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            if current.len() >= 2 {
                *frequencies.entry(std::mem::take(&mut current)).or_insert(0) += 1;
            } else {
                current.clear();
            }
        }
    }
    frequencies
}

/// Jaccard similarity over sets of overlapping character 3-grams.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let grams_a = char_trigrams(a);
    let grams_b = char_trigrams(b);
    if grams_a.is_empty() && grams_b.is_empty() {
        return 1.0;
    }
    let intersection = grams_a.intersection(&grams_b).count();
    let union = grams_a.union(&grams_b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

fn char_trigrams(text: &str) -> HashSet<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < 3 {
        return if chars.is_empty() { HashSet::new() } else { HashSet::from([chars.iter().collect()]) };
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

/// `longest_common_subsequence(a, b) / max(|a|, |b|)`, LCS length
/// computed with a rolling two-row array.
pub fn lcs_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    lcs_length(&a, &b) as f64 / max_len as f64
}

fn lcs_length(a: &[char], b: &[char]) -> usize {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut previous = vec![0usize; shorter.len() + 1];
    let mut current = vec![0usize; shorter.len() + 1];

    for &lc in longer {
        for (j, &sc) in shorter.iter().enumerate() {
            current[j + 1] = if lc == sc { previous[j] + 1 } else { previous[j + 1].max(current[j]) };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[shorter.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_is_fully_similar() {
        assert_eq!(similarity("hello world", "hello world"), 1.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = "the quick brown fox jumps";
        let b = "the slow brown fox jumps over";
        assert!((similarity(a, b) - similarity(b, a)).abs() < 1e-9);
    }

    #[test]
    fn every_component_stays_in_unit_range() {
        let a = "some sample page content with numbers 12345";
        let b = "totally unrelated text about something else entirely";
        for score in [
            edit_distance_similarity(a, b),
            cosine_similarity(a, b),
            jaccard_similarity(a, b),
            lcs_similarity(a, b),
            similarity(a, b),
        ] {
            assert!((0.0..=1.0).contains(&score), "score {score} out of range");
        }
    }

    #[test]
    fn completely_disjoint_cosine_is_zero() {
        assert_eq!(cosine_similarity("aaaa bbbb", "cccc dddd"), 0.0);
    }

    #[test]
    fn empty_strings_are_identical() {
        assert_eq!(similarity("", ""), 1.0);
    }
}
