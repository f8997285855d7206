//! Error types for the folio library.
//!
//! This module provides a single error type covering every failure mode of the
//! pipeline, including:
//! - Invalid construction-time configuration (chunk sizes, thresholds)
//! - Engine execution failures and timeouts
//! - Formula index storage and query errors
//! - File system, PDF parsing and network failures
//!
//! Most per-document failures never reach the caller as a [`FolioError`]: the
//! dispatcher and the batch driver convert them into structured result objects at
//! the document boundary. What does surface here are programming-level mistakes and
//! the one configuration condition that stops the whole pipeline: no extraction
//! engine being available at all.
//!
//! # Examples
//!
//! ```
//! use folio::{chunk::Chunker, error::FolioError};
//!
//! let result = Chunker::builder().base_size(0).build();
//! assert!(matches!(result, Err(FolioError::InvalidChunkConfig(_))));
//! ```

use thiserror::Error;

/// Error type alias used for the [`folio`](crate) crate.
pub type Result<T> = core::result::Result<T, FolioError>;

/// Errors that can occur when working with the folio library.
#[derive(Error, Debug)]
pub enum FolioError {
  /// The chunker was configured with values that can never produce valid chunks.
  ///
  /// This occurs at construction time when:
  /// - The base chunk size is zero
  /// - The maximum size is smaller than the base size
  /// - The minimum split offset exceeds the base size
  /// - The target chunk count is zero
  #[error("Invalid chunker configuration: {0}")]
  InvalidChunkConfig(String),

  /// None of the registered extraction engines passed its availability probe.
  ///
  /// This is the only condition the pipeline escalates loudly, since no document
  /// can make progress without at least one engine.
  #[error("No processing engine available; check the `engines` configuration")]
  NoEngineAvailable,

  /// An extraction engine reported a failure.
  ///
  /// The string parameter holds the engine-specific message, e.g. the tail of a
  /// failed process' standard error.
  #[error("Engine {engine} failed: {message}")]
  EngineFailed {
    /// The engine that failed, in its textual form.
    engine:  String,
    /// The reason reported by the engine.
    message: String,
  },

  /// An engine invocation exceeded its wall-clock budget.
  #[error("Timed out after {0} seconds")]
  Timeout(u64),

  /// The formula index database does not exist yet.
  ///
  /// Search operations convert this into an empty result with a diagnostic.
  #[error("Formula index not found at {0}; run formula indexing first")]
  IndexMissing(String),

  /// A remote document queue returned an unexpected response.
  #[error("Queue error: {0}")]
  Queue(String),

  /// A SQLite operation failed.
  ///
  /// This wraps errors from the `rusqlite` crate, covering:
  /// - SQL syntax errors
  /// - Constraint violations
  /// - Schema errors
  /// - Type conversion errors
  #[error(transparent)]
  Sqlite(#[from] rusqlite::Error),

  /// A file system operation failed.
  #[error(transparent)]
  Path(#[from] std::io::Error),

  /// PDF parsing and processing errors from the lopdf library.
  ///
  /// Common error cases include:
  /// - Malformed or corrupted PDF files
  /// - Missing required PDF objects or references
  /// - Invalid stream encoding
  /// - Encrypted PDF files that require passwords
  #[error(transparent)]
  Lopdf(#[from] lopdf::Error),

  /// A network request failed.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// A URL could not be parsed or joined.
  #[error(transparent)]
  Url(#[from] url::ParseError),

  /// A JSON record could not be encoded or decoded.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// A regular expression supplied for pattern search was invalid.
  #[error(transparent)]
  InvalidPattern(#[from] regex::Error),

  /// A CSV report could not be written.
  #[error(transparent)]
  Csv(#[from] csv::Error),

  /// A file discovery pattern was invalid.
  #[error(transparent)]
  Glob(#[from] glob::PatternError),

  /// The configuration file could not be parsed.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// The configuration could not be serialized.
  #[error(transparent)]
  TomlSer(#[from] toml::ser::Error),

  /// A blocking task panicked or was cancelled.
  #[error(transparent)]
  Join(#[from] tokio::task::JoinError),

  /// A configuration value was missing or inconsistent.
  #[error("{0}")]
  Config(String),
}
