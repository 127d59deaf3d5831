//! String and set similarity primitives shared by the dataset providers.
//!
//! Edit-distance metrics come from `strsim`; the token- and set-level
//! combinators that `strsim` lacks (Monge–Elkan, longest common subsequence,
//! positional digit agreement, Jaccard, subset overlap) live here.

use rustc_hash::FxHashSet;
use std::hash::Hash;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub use strsim::{jaro, jaro_winkler};

/// `1 - levenshtein / max(len)` over chars; two empty strings are identical.
#[inline]
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

#[inline]
pub fn damerau_levenshtein_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_damerau_levenshtein(a, b)
}

#[inline]
pub fn sorensen_dice(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(a, b)
}

///
/// Monge–Elkan similarity of two token lists: for every token of `a` take the
/// best `secondary` score against the tokens of `b`, then average.
///
/// Not symmetric: the mean runs over the tokens of `a`.
///
pub fn monge_elkan<A, B, F>(a: &[A], b: &[B], secondary: F) -> f64
where
    A: AsRef<str>,
    B: AsRef<str>,
    F: Fn(&str, &str) -> f64,
{
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let sum: f64 = a
        .iter()
        .map(|ta| {
            b.iter()
                .map(|tb| secondary(ta.as_ref(), tb.as_ref()))
                .fold(0.0, f64::max)
        })
        .sum();
    sum / a.len() as f64
}

/// Monge–Elkan over whitespace tokens with Levenshtein as the secondary metric.
pub fn monge_elkan_levenshtein(a: &str, b: &str) -> f64 {
    let ta: Vec<&str> = a.split_whitespace().collect();
    let tb: Vec<&str> = b.split_whitespace().collect();
    monge_elkan(&ta, &tb, levenshtein_similarity)
}

pub fn lcs_length(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Longest common subsequence length over the longer string's length.
pub fn lcs_similarity(a: &str, b: &str) -> f64 {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la == 0 && lb == 0 {
        return 1.0;
    }
    if la == 0 || lb == 0 {
        return 0.0;
    }
    lcs_length(a, b) as f64 / la.max(lb) as f64
}

///
/// Fraction of agreeing positions over the shorter string. Strings of
/// different lengths are compared on their common prefix length.
///
pub fn hamming_similarity(a: &str, b: &str) -> f64 {
    let length = a.chars().count().min(b.chars().count());
    if length == 0 {
        return 0.0;
    }
    let matching = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
    matching as f64 / length as f64
}

/// Jaccard coefficient of the two collections taken as sets; two empty sets are identical.
pub fn jaccard<T: Eq + Hash>(a: &[T], b: &[T]) -> f64 {
    let sa: FxHashSet<&T> = a.iter().collect();
    let sb: FxHashSet<&T> = b.iter().collect();
    let union = sa.union(&sb).count();
    if union == 0 {
        return 1.0;
    }
    sa.intersection(&sb).count() as f64 / union as f64
}

///
/// How far one collection is a subset of the other: distinct shared items
/// over the size of the smaller collection. Zero when either is empty.
///
pub fn subset_similarity<T: Eq + Hash>(a: &[T], b: &[T]) -> f64 {
    let min_size = a.len().min(b.len());
    if min_size == 0 {
        return 0.0;
    }
    let sa: FxHashSet<&T> = a.iter().collect();
    let sb: FxHashSet<&T> = b.iter().collect();
    sa.intersection(&sb).count() as f64 / min_size as f64
}

/// Decomposes to NFD and drops combining marks.
pub fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Replaces every run of non-word characters (anything but `[A-Za-z0-9_]`) with one space.
pub fn replace_non_word(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push(' ');
            in_run = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn levenshtein_edges() {
        assert!(close(levenshtein_similarity("", ""), 1.0));
        assert!(close(levenshtein_similarity("abc", ""), 0.0));
        assert!(close(levenshtein_similarity("kitten", "sitting"), 1.0 - 3.0 / 7.0));
    }

    #[test]
    fn monge_elkan_is_mean_of_best_matches() {
        let sim = monge_elkan(&["smith", "john"], &["john", "smyth"], levenshtein_similarity);
        assert!(close(sim, (0.8 + 1.0) / 2.0));
        assert!(close(monge_elkan::<&str, &str, _>(&[], &[], levenshtein_similarity), 1.0));
        assert!(close(monge_elkan(&["a"], &[] as &[&str], levenshtein_similarity), 0.0));
    }

    #[test]
    fn monge_elkan_is_asymmetric() {
        let ab = monge_elkan_levenshtein("a b", "a");
        let ba = monge_elkan_levenshtein("a", "a b");
        assert!(close(ab, 0.5));
        assert!(close(ba, 1.0));
    }

    #[test]
    fn lcs() {
        assert_eq!(lcs_length("ABCBDAB", "BDCABA"), 4);
        assert!(close(lcs_similarity("123-130", "123-130"), 1.0));
        assert!(close(lcs_similarity("", "1"), 0.0));
        assert!(close(lcs_similarity("", ""), 1.0));
        assert!(close(lcs_similarity("abcd", "ab"), 0.5));
    }

    #[test]
    fn hamming_on_common_prefix() {
        assert!(close(hamming_similarity("27510", "27514"), 0.8));
        assert!(close(hamming_similarity("12", "123"), 1.0));
        assert!(close(hamming_similarity("", "123"), 0.0));
    }

    #[test]
    fn set_metrics() {
        assert!(close(jaccard(&["a", "b"], &["b", "c"]), 1.0 / 3.0));
        assert!(close(jaccard::<&str>(&[], &[]), 1.0));
        assert!(close(subset_similarity(&["a", "b"], &["a", "b", "c"]), 1.0));
        assert!(close(subset_similarity(&["a"], &[] as &[&str]), 0.0));
    }

    #[test]
    fn text_normalization() {
        assert_eq!(strip_diacritics("Beyoncé Knöwles"), "Beyonce Knowles");
        assert_eq!(replace_non_word("o'brien--smith"), "o brien smith");
        assert_eq!(replace_non_word("a_b"), "a_b");
    }
}
