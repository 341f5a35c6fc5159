//! Fuzzy text correction against an owned term-frequency dictionary.
//!
//! The corrector is an explicitly constructed service object: it loads its
//! dictionary once and is passed by reference into correction-map builders.
//! Correcting a set of distinct values is embarrassingly parallel; results
//! are re-paired with their inputs positionally, so worker completion order
//! never changes the persisted key-suggestion association.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use rayon::prelude::*;

use crate::data::CleanseError;

/// Acceptance threshold applied when none is configured. The stricter of the
/// two policies seen in production use.
pub const DEFAULT_THRESHOLD: u64 = 10;

/// Candidates further than this many edits from a token are never suggested.
pub const MAX_EDIT_DISTANCE: usize = 2;

/// One correction candidate for a whole (possibly multi-word) sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// The corrected sample, tokens joined by single spaces.
    pub term: String,
    /// Total edit distance across all tokens.
    pub distance: usize,
    /// Confidence weight: the smallest dictionary frequency among the
    /// corrected tokens. Zero whenever any token had no candidate.
    pub count: u64,
}

pub struct SpellCorrector {
    terms: Vec<(String, u64)>,
}

impl SpellCorrector {
    /// Loads a frequency dictionary of `term count` lines.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading spelling dictionary {path:?}"))?;
        let mut terms = Vec::new();
        for line in raw.lines() {
            let mut parts = line.split_whitespace();
            let (Some(term), Some(count)) = (parts.next(), parts.next()) else {
                continue;
            };
            let Ok(count) = count.parse::<u64>() else {
                continue;
            };
            terms.push((term.to_lowercase(), count));
        }
        if terms.is_empty() {
            return Err(CleanseError::EmptyDictionary {
                path: path.display().to_string(),
            }
            .into());
        }
        Ok(Self { terms })
    }

    /// Builds a corrector from in-memory entries. Used by tests and callers
    /// that assemble domain dictionaries programmatically.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let terms = entries
            .into_iter()
            .map(|(term, count)| (term.into().to_lowercase(), count))
            .collect();
        Self { terms }
    }

    pub fn dictionary_len(&self) -> usize {
        self.terms.len()
    }

    /// Best candidate for a normalized sample. Tokens are corrected
    /// independently; an uncorrectable token keeps itself and drags the
    /// suggestion weight to zero so the caller's threshold rejects it.
    pub fn suggest(&self, sample: &str) -> Suggestion {
        let mut corrected = Vec::new();
        let mut total_distance = 0usize;
        let mut weight: Option<u64> = None;

        for token in sample.split_whitespace() {
            match self.best_candidate(token) {
                Some((term, distance, count)) => {
                    corrected.push(term.to_string());
                    total_distance += distance;
                    weight = Some(weight.map_or(count, |w| w.min(count)));
                }
                None => {
                    corrected.push(token.to_string());
                    weight = Some(0);
                }
            }
        }

        Suggestion {
            term: corrected.join(" "),
            distance: total_distance,
            count: weight.unwrap_or(0),
        }
    }

    /// Applies the acceptance policy: the suggestion replaces the sample only
    /// when its weight exceeds `threshold`; otherwise the original
    /// (normalized) sample is kept.
    pub fn correct(&self, sample: &str, threshold: u64) -> String {
        let suggestion = self.suggest(sample);
        if suggestion.count > threshold {
            suggestion.term
        } else {
            sample.to_string()
        }
    }

    /// Corrects a distinct-value set in parallel. Output order matches input
    /// order regardless of worker scheduling.
    pub fn correct_all(&self, samples: &[String], threshold: u64) -> Vec<String> {
        samples
            .par_iter()
            .map(|sample| self.correct(sample, threshold))
            .collect()
    }

    fn best_candidate(&self, token: &str) -> Option<(&str, usize, u64)> {
        let mut best: Option<(&str, usize, u64)> = None;
        for (term, count) in &self.terms {
            let distance = levenshtein_distance(token, term);
            if distance > MAX_EDIT_DISTANCE {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, best_distance, best_count)) => {
                    distance < best_distance
                        || (distance == best_distance && *count > best_count)
                }
            };
            if better {
                best = Some((term.as_str(), distance, *count));
            }
        }
        best
    }
}

/// Lower-cases, strips outer ` .,"` punctuation, and collapses repeated
/// internal whitespace. Applied to every sample before correction and before
/// correction-map lookup, so both sides agree on the key form.
pub fn normalize_sample(raw: &str) -> String {
    raw.to_lowercase()
        .trim_matches([' ', '.', ',', '"'])
        .split_whitespace()
        .join(" ")
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let len_a = a_chars.len();
    let len_b = b_chars.len();

    let mut matrix = vec![vec![0; len_b + 1]; len_a + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len_b {
        matrix[0][j] = j;
    }

    for i in 1..=len_a {
        for j in 1..=len_b {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len_a][len_b]
}
