//! Inverted index mapping stemmed words to the positions they occur at
//!
//! The index keeps two maps side by side:
//!
//! - **positions**: word → location → 1-based positions, in insertion order
//! - **counts**: location → total words indexed for that location
//!
//! Both use `BTreeMap` so iteration (and therefore JSON output and partial
//! search) is ordered by word, then by location.
//!
//! `InvertedIndex` has no synchronization of its own. Indexing tasks each
//! build a private instance and hand it to [`crate::shared_index::SharedIndex`]
//! through a single merge.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use crate::models::{SearchMode, SearchResult};

/// Positions of one word, keyed by location
pub type LocationPositions = BTreeMap<String, Vec<usize>>;

/// Word → location → positions inverted index with per-location word counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvertedIndex {
    positions: BTreeMap<String, LocationPositions>,
    counts: BTreeMap<String, usize>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `word` occurs at `position` in `location`
    ///
    /// Missing word and location entries are created on first use.
    /// Positions are appended in the order they are added.
    pub fn add_word_occurrence(&mut self, word: &str, location: &str, position: usize) {
        self.positions
            .entry(word.to_string())
            .or_default()
            .entry(location.to_string())
            .or_default()
            .push(position);
    }

    /// Record the total number of words indexed for `location`
    ///
    /// The first non-zero count written for a location is kept; later
    /// writes are ignored. Zero counts are never stored.
    pub fn add_word_count(&mut self, location: &str, count: usize) {
        if count == 0 {
            return;
        }

        if let Some(existing) = self.counts.get(location) {
            if *existing != count {
                log::debug!(
                    "Ignoring word count {} for {} (already recorded as {})",
                    count,
                    location,
                    existing
                );
            }
            return;
        }

        self.counts.insert(location.to_string(), count);
    }

    /// Add a sequence of words starting at `start`, returning the next free position
    pub fn add_all<I, S>(&mut self, words: I, location: &str, start: usize) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut position = start;
        for word in words {
            self.add_word_occurrence(word.as_ref(), location, position);
            position += 1;
        }
        position
    }

    /// Deep union of `other` into this index
    ///
    /// Position lists for a shared (word, location) pair are concatenated,
    /// never replaced or deduplicated. Word counts follow the same
    /// write-once rule as [`InvertedIndex::add_word_count`].
    pub fn merge(&mut self, other: InvertedIndex) {
        for (word, other_locations) in other.positions {
            match self.positions.get_mut(&word) {
                None => {
                    self.positions.insert(word, other_locations);
                }
                Some(locations) => {
                    for (location, mut other_list) in other_locations {
                        match locations.get_mut(&location) {
                            Some(list) => list.append(&mut other_list),
                            None => {
                                locations.insert(location, other_list);
                            }
                        }
                    }
                }
            }
        }

        for (location, count) in other.counts {
            self.add_word_count(&location, count);
        }
    }

    pub fn has_word(&self, word: &str) -> bool {
        self.positions.contains_key(word)
    }

    pub fn has_location(&self, word: &str, location: &str) -> bool {
        self.positions
            .get(word)
            .is_some_and(|locations| locations.contains_key(location))
    }

    pub fn has_position(&self, word: &str, location: &str, position: usize) -> bool {
        self.positions_for(word, location)
            .is_some_and(|list| list.contains(&position))
    }

    /// Whether a word count has been recorded for `location`
    pub fn has_count(&self, location: &str) -> bool {
        self.counts.contains_key(location)
    }

    /// Total words recorded for `location` (0 if unknown)
    pub fn word_count_for(&self, location: &str) -> usize {
        self.counts.get(location).copied().unwrap_or(0)
    }

    /// Locations containing `word`, in sorted order
    pub fn locations_for(&self, word: &str) -> impl Iterator<Item = &str> + '_ {
        self.positions
            .get(word)
            .into_iter()
            .flat_map(|locations| locations.keys().map(String::as_str))
    }

    /// Positions of `word` in `location`, in insertion order
    pub fn positions_for(&self, word: &str, location: &str) -> Option<&[usize]> {
        self.positions
            .get(word)
            .and_then(|locations| locations.get(location))
            .map(Vec::as_slice)
    }

    /// All indexed words, in sorted order
    pub fn words(&self) -> impl Iterator<Item = &str> + '_ {
        self.positions.keys().map(String::as_str)
    }

    /// Full read-only view of word → location → positions
    pub fn positions(&self) -> &BTreeMap<String, LocationPositions> {
        &self.positions
    }

    /// Full read-only view of location → word count
    pub fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    pub fn num_words(&self) -> usize {
        self.positions.len()
    }

    pub fn num_locations(&self, word: &str) -> usize {
        self.positions.get(word).map_or(0, BTreeMap::len)
    }

    pub fn num_positions(&self, word: &str, location: &str) -> usize {
        self.positions_for(word, location).map_or(0, <[usize]>::len)
    }

    pub fn num_counts(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.counts.is_empty()
    }

    /// Search using the given mode
    pub fn search(&self, terms: &BTreeSet<String>, mode: SearchMode) -> Vec<SearchResult> {
        match mode {
            SearchMode::Exact => self.exact_search(terms),
            SearchMode::Partial => self.partial_search(terms),
        }
    }

    /// Rank locations containing any term exactly
    pub fn exact_search(&self, terms: &BTreeSet<String>) -> Vec<SearchResult> {
        let mut matches: HashMap<&str, usize> = HashMap::new();

        for term in terms {
            if let Some(locations) = self.positions.get(term) {
                Self::accumulate(&mut matches, locations);
            }
        }

        self.rank(matches)
    }

    /// Rank locations containing any word that starts with a term
    ///
    /// Each term is matched on its own, so a word satisfying two terms
    /// (e.g. `ca` and `cat` both matching `cats`) is counted once per term.
    pub fn partial_search(&self, terms: &BTreeSet<String>) -> Vec<SearchResult> {
        let mut matches: HashMap<&str, usize> = HashMap::new();

        for term in terms {
            let range = self
                .positions
                .range::<str, _>((Bound::Included(term.as_str()), Bound::Unbounded));

            for (word, locations) in range {
                if !word.starts_with(term.as_str()) {
                    break;
                }
                Self::accumulate(&mut matches, locations);
            }
        }

        self.rank(matches)
    }

    fn accumulate<'a>(matches: &mut HashMap<&'a str, usize>, locations: &'a LocationPositions) {
        for (location, list) in locations {
            *matches.entry(location.as_str()).or_insert(0) += list.len();
        }
    }

    fn rank(&self, matches: HashMap<&str, usize>) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = matches
            .into_iter()
            .filter_map(|(location, count)| match self.counts.get(location) {
                Some(&total) => Some(SearchResult::new(location, count, total)),
                None => {
                    log::warn!("No word count recorded for {}, skipping result", location);
                    None
                }
            })
            .collect();

        results.sort();
        results
    }
}
