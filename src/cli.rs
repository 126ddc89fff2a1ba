//! CLI argument parsing and the indexing/query run

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::indexer::Indexer;
use crate::json;
use crate::models::{EngineConfig, SearchMode};
use crate::output;
use crate::query::{QueryEngine, QueryProcessor, QueuedQueryEngine};
use crate::shared_index::SharedIndex;
use crate::work_queue::WorkQueue;

/// wordhunt: build a word index from text files and run ranked queries
#[derive(Parser, Debug)]
#[command(
    name = "wordhunt",
    version,
    about = "Index text files and answer ranked multi-word queries",
    long_about = "Builds an inverted index of stemmed words from a text file or a \
                  directory of .txt/.text files, then answers queries from a query \
                  file, ranking locations by the share of their words that match.\n\n\
                  Every step is optional; outputs are only written when requested."
)]
pub struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Text file or directory to index
    #[arg(long, value_name = "PATH")]
    pub text: Option<PathBuf>,

    /// Write the inverted index as JSON
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "index.json")]
    pub index: Option<PathBuf>,

    /// Write word counts per location as JSON
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "counts.json")]
    pub counts: Option<PathBuf>,

    /// File with one query per line
    #[arg(long, value_name = "PATH")]
    pub query: Option<PathBuf>,

    /// Write search results as JSON
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "results.json")]
    pub results: Option<PathBuf>,

    /// Match indexed words by prefix instead of exactly
    #[arg(long)]
    pub partial: bool,

    /// Use a pool of worker threads (default 5 when no number is given)
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "5")]
    pub threads: Option<usize>,

    /// Show a progress bar while indexing
    #[arg(long)]
    pub progress: bool,
}

impl Cli {
    /// Engine configuration described by the flags
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            threads: self.threads,
            mode: if self.partial {
                SearchMode::Partial
            } else {
                SearchMode::Exact
            },
            show_progress: self.progress,
        }
    }

    /// Execute the run described by the flags
    pub fn execute(self) -> Result<()> {
        // Setup logging based on verbosity
        let log_level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
            .try_init()
            .ok();

        self.run()
    }

    /// Run indexing, output and querying without touching logger setup
    pub fn run(self) -> Result<()> {
        let config = self.config();
        log::info!("Starting run with {:?}", config);

        let start = Instant::now();
        let index = Arc::new(SharedIndex::new());
        let queue = config
            .worker_count()
            .map(WorkQueue::new)
            .transpose()?
            .map(Arc::new);

        match &self.text {
            Some(path) => handle_text(path, &index, queue.clone(), &config),
            None => log::info!("No --text given, index stays empty"),
        }

        if let Some(path) = &self.counts {
            report(json::write_counts(&index, path), "write word counts", path);
        }

        if let Some(path) = &self.index {
            report(json::write_index(&index, path), "write index", path);
        }

        let engine: Box<dyn QueryProcessor> = match &queue {
            Some(queue) => Box::new(QueuedQueryEngine::new(
                Arc::clone(&index),
                Arc::clone(queue),
                config.mode,
            )),
            None => Box::new(QueryEngine::new(Arc::clone(&index), config.mode)),
        };

        if let Some(path) = &self.query {
            report(engine.process_file(path), "search queries from", path);
            log::info!("Processed {} distinct queries", engine.num_queries());
        }

        if let Some(path) = &self.results {
            report(json::write_results(&engine.results(), path), "write results", path);
        }

        if let Some(queue) = queue {
            queue.shutdown();
        }

        log::info!("Finished in {}ms", start.elapsed().as_millis());
        Ok(())
    }
}

fn handle_text(
    path: &Path,
    index: &Arc<SharedIndex>,
    queue: Option<Arc<WorkQueue>>,
    config: &EngineConfig,
) {
    let indexer = Indexer::new(Arc::clone(index), queue);
    match indexer.index(path, config.show_progress) {
        Ok(stats) => output::index_summary(&stats),
        Err(e) => output::warn(&format!("Unable to index {}: {:#}", path.display(), e)),
    }
}

/// Warn about a failed step without aborting the rest of the run
fn report(outcome: Result<()>, action: &str, path: &Path) {
    if let Err(e) = outcome {
        output::warn(&format!("Unable to {} {}: {:#}", action, path.display(), e));
    }
}
