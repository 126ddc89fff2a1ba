//! wordhunt: concurrent inverted index and ranked word search
//!
//! wordhunt indexes the stemmed words of text files by position and answers
//! multi-word queries, ranking each matching file by the share of its words
//! that match. Indexing and querying can both run on a fixed-size worker pool.
//!
//! # Architecture
//!
//! - **InvertedIndex**: word → location → positions, plus word counts per location
//! - **SharedIndex**: the same operations behind a reader/writer lock
//! - **WorkQueue**: fixed worker pool with a completion barrier
//! - **Indexer**: discovers files and merges one private index per file
//! - **Query engines**: canonicalize query lines, search, rank and store results
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use wordhunt::{Indexer, QueryEngine, QueryProcessor, SearchMode, SharedIndex};
//!
//! let index = Arc::new(SharedIndex::new());
//! Indexer::new(Arc::clone(&index), None).index("corpus", false).unwrap();
//!
//! let engine = QueryEngine::new(index, SearchMode::Exact);
//! engine.process_line("quick brown fox").unwrap();
//! for result in engine.results_for("quick brown fox") {
//!     println!("{} {} {}", result.location, result.count, result.formatted_score());
//! }
//! ```

pub mod cli;
pub mod index;
pub mod indexer;
pub mod json;
pub mod models;
pub mod output;
pub mod query;
pub mod shared_index;
pub mod text;
pub mod work_queue;

// Re-export commonly used types
pub use index::InvertedIndex;
pub use indexer::Indexer;
pub use models::{EngineConfig, IndexStats, SearchMode, SearchResult};
pub use query::{QueryEngine, QueryProcessor, QueuedQueryEngine, ResultTable};
pub use shared_index::SharedIndex;
pub use work_queue::WorkQueue;
