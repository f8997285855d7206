//! Error types for the `folio` command line tool.

use thiserror::Error;

/// Result alias used throughout the CLI.
pub type Result<T> = core::result::Result<T, FoliodError>;

/// Errors surfaced by CLI commands.
#[derive(Error, Debug)]
pub enum FoliodError {
  /// An error from the pipeline library.
  #[error(transparent)]
  Folio(#[from] folio::error::FolioError),

  /// A file system operation failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// A prompt could not be shown or answered.
  #[error(transparent)]
  Dialog(#[from] dialoguer::Error),

  /// A cleanup pattern was invalid.
  #[error(transparent)]
  Glob(#[from] glob::PatternError),

  /// The logging subscriber could not be installed.
  #[error("Failed to set up logging: {0}")]
  Logging(String),
}
