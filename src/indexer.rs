//! Indexing pipeline for text files
//!
//! The indexer discovers text files under a path, reads each one line by
//! line, stems the words and records their positions. Every file is built
//! into its own private [`InvertedIndex`] and merged into the shared index
//! exactly once, so the shared write lock is taken once per file rather
//! than once per word.
//!
//! With a [`WorkQueue`] attached, one task per file is submitted to the pool
//! and the call returns after the queue's completion barrier. Without one,
//! files are processed in order on the calling thread.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rust_stemmers::Stemmer;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::index::InvertedIndex;
use crate::models::IndexStats;
use crate::shared_index::SharedIndex;
use crate::text::{english_stemmer, stem_line};
use crate::work_queue::WorkQueue;

/// File extensions recognised as text (compared case-insensitively)
const TEXT_EXTENSIONS: &[&str] = &["txt", "text"];

/// Per-run success/failure counters, shared with indexing tasks
#[derive(Default)]
struct Counters {
    indexed: AtomicUsize,
    failed: AtomicUsize,
}

/// Builds the shared index from files on disk
pub struct Indexer {
    index: Arc<SharedIndex>,
    queue: Option<Arc<WorkQueue>>,
}

impl Indexer {
    /// Create an indexer writing into `index`
    ///
    /// Pass a work queue to index files in parallel.
    pub fn new(index: Arc<SharedIndex>, queue: Option<Arc<WorkQueue>>) -> Self {
        Self { index, queue }
    }

    /// Index a single file or every text file below a directory
    ///
    /// Per-file read failures are logged and counted in the returned stats;
    /// they do not stop the other files. Only a failure to discover files
    /// at all is returned as an error.
    pub fn index(&self, root: impl AsRef<Path>, show_progress: bool) -> Result<IndexStats> {
        let root = root.as_ref();
        log::info!("Indexing {:?}", root);

        let files = discover_files(root)?;
        log::info!("Discovered {} files to index", files.len());

        let pb = progress_bar(files.len(), show_progress);
        let counters = Arc::new(Counters::default());

        match &self.queue {
            Some(queue) => {
                log::info!("Using {} worker threads for indexing", queue.size());
                for path in files {
                    let index = Arc::clone(&self.index);
                    let counters = Arc::clone(&counters);
                    let pb = pb.clone();
                    queue.execute(move || {
                        let outcome = index_into(&path, &index);
                        record(&counters, &pb, &path, &outcome);
                        Ok(())
                    })?;
                }
                queue.finish();
            }
            None => {
                for path in files {
                    let outcome = index_into(&path, &self.index);
                    record(&counters, &pb, &path, &outcome);
                }
            }
        }

        pb.finish_and_clear();

        let stats = self.index.with_read(|index| IndexStats {
            files_indexed: counters.indexed.load(Ordering::SeqCst),
            files_failed: counters.failed.load(Ordering::SeqCst),
            locations: index.num_counts(),
            unique_words: index.num_words(),
        });

        log::info!(
            "Indexing complete: {} files indexed, {} failed, {} unique words",
            stats.files_indexed,
            stats.files_failed,
            stats.unique_words
        );

        Ok(stats)
    }
}

/// Whether `path` has a recognised text extension
pub fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TEXT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Find the files to index under `root`
///
/// A regular file is returned as-is, whatever its extension. A directory is
/// walked recursively and only text files are returned. Unreadable
/// directory entries are logged and skipped.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("Failed to access {}", root.display()))?;

    if !metadata.is_dir() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if entry.file_type().is_file() && is_text_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Read `path` into `index`, returning the number of words added
///
/// The path (as given) is used as the location.
pub fn index_file(path: &Path, index: &mut InvertedIndex, stemmer: &Stemmer) -> Result<usize> {
    let location = path.to_string_lossy().to_string();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    index_reader(BufReader::new(file), &location, index, stemmer)
}

/// Read lines from `reader` into `index` under `location`
///
/// Positions start at 1 and run across all lines. Lines that are not valid
/// UTF-8 are skipped. If reading fails part-way, the words read so far stay
/// in `index` (and their count is recorded) before the error is returned.
pub fn index_reader(
    reader: impl BufRead,
    location: &str,
    index: &mut InvertedIndex,
    stemmer: &Stemmer,
) -> Result<usize> {
    let mut position = 1;
    let mut outcome: Result<()> = Ok(());
    for line in reader.split(b'\n') {
        match line {
            Ok(bytes) => match std::str::from_utf8(&bytes) {
                Ok(line) => position = index.add_all(stem_line(line, stemmer), location, position),
                Err(_) => log::debug!("Skipping malformed line in {}", location),
            },
            Err(e) => {
                outcome = Err(e).with_context(|| format!("Failed to read {}", location));
                break;
            }
        }
    }

    let count = position - 1;
    index.add_word_count(location, count);
    log::debug!("Indexed {} words from {}", count, location);

    outcome.map(|()| count)
}

/// Build a private index for one file and merge it into the shared index
fn index_into(path: &Path, shared: &SharedIndex) -> Result<()> {
    let stemmer = english_stemmer();
    let mut local = InvertedIndex::new();
    let outcome = index_file(path, &mut local, &stemmer);

    if !local.is_empty() {
        shared.merge(local);
    }

    outcome.map(|_| ())
}

fn record(counters: &Counters, pb: &ProgressBar, path: &Path, outcome: &Result<()>) {
    match outcome {
        Ok(()) => {
            counters.indexed.fetch_add(1, Ordering::SeqCst);
        }
        Err(e) => {
            log::warn!("Unable to index {}: {:#}", path.display(), e);
            counters.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
    pb.inc(1);
}

fn progress_bar(total: usize, show_progress: bool) -> ProgressBar {
    if !show_progress {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total as u64);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%)")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{self, Cursor, Read};
    use tempfile::TempDir;

    #[test]
    fn test_is_text_file() {
        assert!(is_text_file(Path::new("a/b.txt")));
        assert!(is_text_file(Path::new("a/b.TeXt")));
        assert!(is_text_file(Path::new("B.TXT")));
        assert!(!is_text_file(Path::new("b.md")));
        assert!(!is_text_file(Path::new("txt")));
    }

    #[test]
    fn test_discover_files_recurses_and_filters() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("nested/deeper");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp.path().join("one.txt"), "one").unwrap();
        fs::write(temp.path().join("skip.md"), "skip").unwrap();
        fs::write(nested.join("two.TEXT"), "two").unwrap();

        let files = discover_files(temp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| is_text_file(f)));
    }

    #[test]
    fn test_discover_single_file_ignores_extension() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("notes.md");
        fs::write(&file, "hello").unwrap();

        assert_eq!(discover_files(&file).unwrap(), vec![file]);
    }

    #[test]
    fn test_discover_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        assert!(discover_files(&temp.path().join("missing")).is_err());
    }

    #[test]
    fn test_index_file_positions_span_lines() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, "The cat\n\n42 !!\nsat on the cat").unwrap();

        let mut index = InvertedIndex::new();
        let count = index_file(&file, &mut index, &english_stemmer()).unwrap();
        let location = file.to_string_lossy().to_string();

        assert_eq!(count, 6);
        assert_eq!(index.word_count_for(&location), 6);
        assert_eq!(index.positions_for("cat", &location), Some(&[2, 6][..]));
        assert_eq!(index.positions_for("the", &location), Some(&[1, 5][..]));
    }

    #[test]
    fn test_index_reader_keeps_words_read_before_failure() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("device went away"))
            }
        }

        let reader = BufReader::new(Cursor::new(b"good words here\n".to_vec()).chain(Broken));
        let mut index = InvertedIndex::new();
        let result = index_reader(reader, "broken.txt", &mut index, &english_stemmer());

        assert!(result.is_err());
        assert_eq!(index.word_count_for("broken.txt"), 3);
        assert_eq!(index.positions_for("word", "broken.txt"), Some(&[2][..]));
    }

    #[test]
    fn test_index_file_skips_malformed_lines() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("mixed.txt");
        let mut bytes = b"good words\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(b"still read\n");
        fs::write(&file, bytes).unwrap();

        let mut index = InvertedIndex::new();
        let count = index_file(&file, &mut index, &english_stemmer()).unwrap();
        let location = file.to_string_lossy().to_string();

        assert_eq!(count, 4);
        assert_eq!(index.positions_for("still", &location), Some(&[3][..]));
    }

    #[test]
    fn test_failed_file_is_counted_and_not_merged() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.txt");
        let shared = SharedIndex::new();
        let counters = Counters::default();

        let outcome = index_into(&missing, &shared);
        record(&counters, &ProgressBar::hidden(), &missing, &outcome);

        assert!(outcome.is_err());
        assert!(shared.is_empty());
        assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
        assert_eq!(counters.indexed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_indexer_sequential_and_queued_agree() {
        let temp = TempDir::new().unwrap();
        for i in 0..10 {
            fs::write(
                temp.path().join(format!("file_{}.txt", i)),
                format!("shared words appear in file number {}\nunique{}", i, i),
            )
            .unwrap();
        }

        let sequential = Arc::new(SharedIndex::new());
        let stats = Indexer::new(Arc::clone(&sequential), None)
            .index(temp.path(), false)
            .unwrap();
        assert_eq!(stats.files_indexed, 10);
        assert_eq!(stats.locations, 10);

        let queued = Arc::new(SharedIndex::new());
        let queue = Arc::new(WorkQueue::new(4).unwrap());
        let queued_stats = Indexer::new(Arc::clone(&queued), Some(queue))
            .index(temp.path(), false)
            .unwrap();

        assert_eq!(stats, queued_stats);
        assert_eq!(sequential.snapshot(), queued.snapshot());
    }
}
