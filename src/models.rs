//! Core data models for wordhunt
//!
//! These structures are the values that flow between the index, the query
//! engines and the JSON writers.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use strum::{Display, EnumString};

/// Number of decimal places used when rendering a score
pub const SCORE_PRECISION: usize = 8;

/// Default worker count when multithreading is requested without a valid number
pub const DEFAULT_THREADS: usize = 5;

/// How query terms are matched against indexed words
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SearchMode {
    /// The indexed word must equal the query term
    #[default]
    Exact,
    /// The indexed word must start with the query term
    Partial,
}

/// A single ranked match of a query against one location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Number of matching word occurrences at the location
    pub count: usize,
    /// `count` divided by the total words at the location
    #[serde(serialize_with = "serialize_score")]
    pub score: f64,
    /// Location the matches were found in
    #[serde(rename = "where")]
    pub location: String,
}

impl SearchResult {
    /// Build a result from a match count and the location's total word count
    pub fn new(location: impl Into<String>, count: usize, total_words: usize) -> Self {
        Self {
            count,
            score: count as f64 / total_words as f64,
            location: location.into(),
        }
    }

    /// Score rendered with fixed precision, as written to JSON
    pub fn formatted_score(&self) -> String {
        format!("{:.*}", SCORE_PRECISION, self.score)
    }
}

impl Eq for SearchResult {}

impl Ord for SearchResult {
    /// Higher score first, then higher count, then location
    /// case-insensitively ascending
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.count.cmp(&self.count))
            .then_with(|| {
                self.location
                    .to_lowercase()
                    .cmp(&other.location.to_lowercase())
            })
            .then_with(|| self.location.cmp(&other.location))
    }
}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Write the score as a JSON number with exactly [`SCORE_PRECISION`] decimals
fn serialize_score<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    use serde::ser::Error;

    let formatted = format!("{:.*}", SCORE_PRECISION, score);
    let number: serde_json::Number = formatted.parse().map_err(S::Error::custom)?;
    number.serialize(serializer)
}

/// Configuration for a single indexing + querying run
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Worker threads (None = single-threaded pipelines)
    pub threads: Option<usize>,
    /// Search mode used by the query engine for its whole lifetime
    pub mode: SearchMode,
    /// Show a progress bar while indexing
    pub show_progress: bool,
}

impl EngineConfig {
    /// Worker count to use, falling back to [`DEFAULT_THREADS`] for 0
    pub fn worker_count(&self) -> Option<usize> {
        self.threads.map(|n| if n == 0 { DEFAULT_THREADS } else { n })
    }
}

/// Statistics about an indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Files that were read to the end and merged
    pub files_indexed: usize,
    /// Files whose reading failed (partial contents are still merged)
    pub files_failed: usize,
    /// Locations with a word count in the index
    pub locations: usize,
    /// Distinct stemmed words in the index
    pub unique_words: usize,
}
