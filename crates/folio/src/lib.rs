//! A library for turning a heterogeneous PDF corpus into searchable knowledge artifacts.
//!
//! `folio` ingests PDF documents and produces normalized text, overlapping text chunks,
//! a content-addressed catalog of the LaTeX formulas they contain, and reports about
//! duplicate and near-duplicate files. It is organized around four components:
//!
//! - [`dispatcher::Dispatcher`]: decides per document which extraction engine to use and runs
//!   it with a hard timeout, turning every engine failure into a structured result
//! - [`chunk::Chunker`]: splits arbitrarily long text into boundary-aware, overlapping chunks
//! - [`formula`]: extracts `$…$`/`$$…$$` formulas from markdown, persists a JSONL catalog and
//!   builds a token index in SQLite for symbol and pattern search
//! - [`duplicates::DuplicateScanner`]: groups byte-identical files by a prefix digest and pairs
//!   files with near-identical names
//!
//! Extraction engines are external collaborators. The text layer is read in-process with
//! `lopdf`; raster OCR, scientific OCR and the cloud math service are invoked as child
//! processes or over HTTPS, see [`engine`].
//!
//! # Getting Started
//!
//! ```no_run
//! use folio::{
//!   chunk::Chunker,
//!   dispatcher::{Dispatcher, RoutingHints},
//!   prelude::*,
//! };
//!
//! # async fn run() -> Result<(), FolioError> {
//! let config = folio::config::Config::default();
//! let dispatcher = Dispatcher::from_config(&config).await?;
//! dispatcher.ensure_any_available()?;
//!
//! let route = dispatcher.analyze("paper.pdf", &RoutingHints::default()).await;
//! let result = dispatcher.execute("paper.pdf", &route).await;
//!
//! if result.success {
//!   let chunks = Chunker::default().chunk(&result.text);
//!   println!("{} chunks via {}", chunks.len(), result.engine_used);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Batch processing
//!
//! The [`pipeline`] module drives a whole directory tree through the dispatcher with a
//! fixed-width worker pool, writes text, chunk and metadata files, and reports an
//! [`pipeline::ExtractionSummary`]. The formula catalog, the duplicate scanner and the
//! relevance report run as independent synchronous passes.

#![warn(missing_docs)]

use std::{
  collections::{BTreeMap, BTreeSet, HashMap, HashSet},
  fmt::Display,
  path::{Path, PathBuf},
  str::FromStr,
  sync::Arc,
  time::{Duration, Instant},
};

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
#[cfg(test)]
use {tempfile::tempdir, tracing_test::traced_test};

pub mod chunk;
pub mod config;
pub mod dispatcher;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod formula;
pub mod pdf;
pub mod pipeline;
pub mod queue;
pub mod relevance;

use crate::{config::*, engine::*, error::*};

/// Common traits and types for ergonomic imports.
///
/// ```no_run
/// use folio::{formula::index::FormulaIndex, formula::search::Search, prelude::*};
///
/// fn example() -> Result<(), FolioError> {
///   let mut index = FormulaIndex::open("metadata/formula_index.sqlite")?;
///   let hits = Search::by_symbol("alpha").limit(5).execute(&mut index)?;
///   println!("{} formulas mention alpha", hits.len());
///   Ok(())
/// }
/// ```
///
/// Currently exports:
/// - [`Engine`]: Trait implemented by every extraction engine
/// - [`DocumentQueue`](crate::queue::DocumentQueue): Trait for remote work queues
/// - [`IndexInstruction`](crate::formula::index::IndexInstruction): Trait for formula index
///   operations
/// - [`FolioError`]: Core error type for the library
pub mod prelude {
  pub use crate::{
    engine::{Engine, ProcessingEngine},
    error::FolioError,
    formula::index::IndexInstruction,
    queue::DocumentQueue,
  };
}
