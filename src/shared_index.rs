//! Thread-safe wrapper around [`InvertedIndex`]
//!
//! `SharedIndex` owns a private `InvertedIndex` behind a reader/writer lock
//! and forwards every call to it. Lock policy:
//!
//! | Operation | Lock |
//! |---|---|
//! | `add_word_occurrence`, `add_word_count`, `merge` | write |
//! | existence checks, counts, snapshots, search, `with_read` | read |
//!
//! The lock is held for the whole delegated call, including iteration done
//! inside [`SharedIndex::with_read`] (used by the JSON writers). Guards are
//! released on drop, so every exit path (including unwinding) unlocks.

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

use crate::index::InvertedIndex;
use crate::models::{SearchMode, SearchResult};

/// Inverted index safe for concurrent readers and writers
#[derive(Debug, Default)]
pub struct SharedIndex {
    inner: RwLock<InvertedIndex>,
}

impl SharedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already-built index
    pub fn from_index(index: InvertedIndex) -> Self {
        Self {
            inner: RwLock::new(index),
        }
    }

    pub fn add_word_occurrence(&self, word: &str, location: &str, position: usize) {
        self.inner.write().add_word_occurrence(word, location, position);
    }

    pub fn add_word_count(&self, location: &str, count: usize) {
        self.inner.write().add_word_count(location, count);
    }

    /// Merge a privately built index in one exclusive step
    pub fn merge(&self, other: InvertedIndex) {
        self.inner.write().merge(other);
    }

    pub fn has_word(&self, word: &str) -> bool {
        self.inner.read().has_word(word)
    }

    pub fn has_location(&self, word: &str, location: &str) -> bool {
        self.inner.read().has_location(word, location)
    }

    pub fn has_position(&self, word: &str, location: &str, position: usize) -> bool {
        self.inner.read().has_position(word, location, position)
    }

    pub fn has_count(&self, location: &str) -> bool {
        self.inner.read().has_count(location)
    }

    pub fn word_count_for(&self, location: &str) -> usize {
        self.inner.read().word_count_for(location)
    }

    /// Snapshot of the locations containing `word`
    pub fn locations_for(&self, word: &str) -> Vec<String> {
        self.inner
            .read()
            .locations_for(word)
            .map(str::to_string)
            .collect()
    }

    /// Snapshot of the positions of `word` in `location`
    pub fn positions_for(&self, word: &str, location: &str) -> Vec<usize> {
        self.inner
            .read()
            .positions_for(word, location)
            .map(<[usize]>::to_vec)
            .unwrap_or_default()
    }

    /// Snapshot of every indexed word
    pub fn words(&self) -> Vec<String> {
        self.inner.read().words().map(str::to_string).collect()
    }

    /// Snapshot of location → word count
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.inner.read().counts().clone()
    }

    pub fn num_words(&self) -> usize {
        self.inner.read().num_words()
    }

    pub fn num_locations(&self, word: &str) -> usize {
        self.inner.read().num_locations(word)
    }

    pub fn num_positions(&self, word: &str, location: &str) -> usize {
        self.inner.read().num_positions(word, location)
    }

    pub fn num_counts(&self) -> usize {
        self.inner.read().num_counts()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn search(&self, terms: &BTreeSet<String>, mode: SearchMode) -> Vec<SearchResult> {
        self.inner.read().search(terms, mode)
    }

    pub fn exact_search(&self, terms: &BTreeSet<String>) -> Vec<SearchResult> {
        self.inner.read().exact_search(terms)
    }

    pub fn partial_search(&self, terms: &BTreeSet<String>) -> Vec<SearchResult> {
        self.inner.read().partial_search(terms)
    }

    /// Run `f` against the index while holding the read lock
    ///
    /// Used for serialization: the lock stays held until `f` returns, so no
    /// writer can interleave with the iteration.
    pub fn with_read<R>(&self, f: impl FnOnce(&InvertedIndex) -> R) -> R {
        let guard = self.inner.read();
        f(&guard)
    }

    /// Clone the current contents into a standalone index
    pub fn snapshot(&self) -> InvertedIndex {
        self.inner.read().clone()
    }

    /// Unwrap into the inner index
    pub fn into_inner(self) -> InvertedIndex {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_delegates_to_inner_index() {
        let shared = SharedIndex::new();
        shared.add_word_occurrence("hello", "h.txt", 1);
        shared.add_word_occurrence("world", "h.txt", 2);
        shared.add_word_count("h.txt", 2);

        assert!(shared.has_word("hello"));
        assert!(shared.has_location("world", "h.txt"));
        assert!(shared.has_position("world", "h.txt", 2));
        assert_eq!(shared.word_count_for("h.txt"), 2);
        assert_eq!(shared.words(), vec!["hello", "world"]);
        assert_eq!(shared.num_counts(), 1);
    }

    #[test]
    fn test_concurrent_merges_keep_every_location() {
        let shared = Arc::new(SharedIndex::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    let location = format!("file_{}.txt", i);
                    let mut local = InvertedIndex::new();
                    local.add_all(["common", "word"], &location, 1);
                    local.add_word_count(&location, 2);
                    shared.merge(local);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shared.num_locations("common"), 16);
        assert_eq!(shared.num_counts(), 16);
        for location in shared.locations_for("word") {
            assert_eq!(shared.positions_for("word", &location), vec![2]);
        }
    }

    #[test]
    fn test_with_read_sees_consistent_view() {
        let shared = SharedIndex::new();
        shared.add_word_occurrence("a", "x", 1);
        shared.add_word_count("x", 1);

        let (words, counts) = shared.with_read(|index| (index.num_words(), index.num_counts()));
        assert_eq!((words, counts), (1, 1));
        assert_eq!(shared.snapshot().num_words(), 1);
    }
}
