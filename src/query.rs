//! Query engines for searching the shared index
//!
//! Each query line is cleaned, stemmed, deduplicated and sorted into a
//! canonical query string. Results are stored under that string, so lines
//! that stem to the same terms share a single entry and are searched once.
//!
//! Two engines implement [`QueryProcessor`]:
//!
//! - [`QueryEngine`] processes lines on the calling thread
//! - [`QueuedQueryEngine`] submits one task per line to a [`WorkQueue`]
//!
//! Both go through [`ResultTable::process`], which reserves the canonical
//! query with a placeholder under the table lock, searches without holding
//! it, and then stores the finished results under the lock again. A second
//! task racing on the same query sees the placeholder and skips the search.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rust_stemmers::Stemmer;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use crate::models::{SearchMode, SearchResult};
use crate::shared_index::SharedIndex;
use crate::text::{canonical_query, english_stemmer, unique_stems};
use crate::work_queue::WorkQueue;

/// Outcome of processing one query line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The line had no usable words
    Empty,
    /// The canonical query was already reserved or computed
    Duplicate,
    /// The index was searched and the results stored
    Searched,
}

/// Canonical query → ranked results, guarded by its own lock
///
/// A `None` value is a reservation for a search still in progress.
pub struct ResultTable {
    index: Arc<SharedIndex>,
    mode: SearchMode,
    stemmer: Stemmer,
    entries: Mutex<BTreeMap<String, Option<Vec<SearchResult>>>>,
}

impl ResultTable {
    pub fn new(index: Arc<SharedIndex>, mode: SearchMode) -> Self {
        Self {
            index,
            mode,
            stemmer: english_stemmer(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Search mode fixed for the lifetime of this table
    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Canonical form of a query line
    pub fn canonicalize(&self, line: &str) -> String {
        canonical_query(&unique_stems(line, &self.stemmer))
    }

    /// Search a single line unless its canonical query is already known
    pub fn process(&self, line: &str) -> QueryOutcome {
        let stems = unique_stems(line, &self.stemmer);
        let query = canonical_query(&stems);
        if query.is_empty() {
            return QueryOutcome::Empty;
        }

        {
            let mut entries = self.entries.lock();
            if entries.contains_key(&query) {
                log::trace!("Skipping duplicate query '{}'", query);
                return QueryOutcome::Duplicate;
            }
            entries.insert(query.clone(), None);
        }

        let results = self.index.search(&stems, self.mode);
        log::debug!("Query '{}' matched {} locations", query, results.len());

        self.entries.lock().insert(query, Some(results));
        QueryOutcome::Searched
    }

    /// Completed canonical queries, in sorted order
    pub fn queries(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, results)| results.is_some())
            .map(|(query, _)| query.clone())
            .collect()
    }

    /// Results for a line (canonicalized first); empty if unknown
    pub fn results_for(&self, line: &str) -> Vec<SearchResult> {
        let query = self.canonicalize(line);
        self.entries
            .lock()
            .get(&query)
            .and_then(Clone::clone)
            .unwrap_or_default()
    }

    pub fn has_query(&self, line: &str) -> bool {
        let query = self.canonicalize(line);
        self.entries
            .lock()
            .get(&query)
            .is_some_and(Option::is_some)
    }

    pub fn num_queries(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|results| results.is_some())
            .count()
    }

    pub fn num_results(&self, line: &str) -> usize {
        self.results_for(line).len()
    }

    /// Snapshot of every completed query and its results
    pub fn snapshot(&self) -> BTreeMap<String, Vec<SearchResult>> {
        self.entries
            .lock()
            .iter()
            .filter_map(|(query, results)| {
                results
                    .as_ref()
                    .map(|results| (query.clone(), results.clone()))
            })
            .collect()
    }
}

/// Shared behaviour of the sequential and queued query engines
pub trait QueryProcessor {
    /// Process one query line
    fn process_line(&self, line: &str) -> Result<()>;

    /// The table results are stored in
    fn table(&self) -> &ResultTable;

    /// Process every line of a query file
    fn process_file(&self, path: &Path) -> Result<()> {
        for_each_line(path, |line| self.process_line(line))
    }

    fn queries(&self) -> Vec<String> {
        self.table().queries()
    }

    fn results_for(&self, line: &str) -> Vec<SearchResult> {
        self.table().results_for(line)
    }

    fn has_query(&self, line: &str) -> bool {
        self.table().has_query(line)
    }

    fn num_queries(&self) -> usize {
        self.table().num_queries()
    }

    fn num_results(&self, line: &str) -> usize {
        self.table().num_results(line)
    }

    fn results(&self) -> BTreeMap<String, Vec<SearchResult>> {
        self.table().snapshot()
    }
}

/// Processes queries one at a time on the calling thread
pub struct QueryEngine {
    table: ResultTable,
}

impl QueryEngine {
    pub fn new(index: Arc<SharedIndex>, mode: SearchMode) -> Self {
        Self {
            table: ResultTable::new(index, mode),
        }
    }
}

impl QueryProcessor for QueryEngine {
    fn process_line(&self, line: &str) -> Result<()> {
        self.table.process(line);
        Ok(())
    }

    fn table(&self) -> &ResultTable {
        &self.table
    }
}

/// Processes each query line as a task on a work queue
pub struct QueuedQueryEngine {
    table: Arc<ResultTable>,
    queue: Arc<WorkQueue>,
}

impl QueuedQueryEngine {
    pub fn new(index: Arc<SharedIndex>, queue: Arc<WorkQueue>, mode: SearchMode) -> Self {
        Self {
            table: Arc::new(ResultTable::new(index, mode)),
            queue,
        }
    }

    /// Block until every submitted query has been processed
    pub fn finish(&self) {
        self.queue.finish();
    }
}

impl QueryProcessor for QueuedQueryEngine {
    /// Submit the line for processing; blank lines are skipped
    fn process_line(&self, line: &str) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }

        let table = Arc::clone(&self.table);
        let line = line.to_string();
        self.queue.execute(move || {
            table.process(&line);
            Ok(())
        })
    }

    fn table(&self) -> &ResultTable {
        &self.table
    }

    /// Submit every line of the file, then wait for all of them
    fn process_file(&self, path: &Path) -> Result<()> {
        let submitted = for_each_line(path, |line| self.process_line(line));
        self.finish();
        submitted
    }
}

fn for_each_line(path: &Path, mut f: impl FnMut(&str) -> Result<()>) -> Result<()> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open query file {}", path.display()))?;

    for line in BufReader::new(file).split(b'\n') {
        let bytes = line.with_context(|| format!("Failed to read query file {}", path.display()))?;
        match std::str::from_utf8(&bytes) {
            Ok(line) => f(line)?,
            Err(_) => log::debug!("Skipping malformed query line in {}", path.display()),
        }
    }

    Ok(())
}
