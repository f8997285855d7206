use super::*;

pub mod clean;
pub mod duplicates;
pub mod extract;
pub mod formulas;
pub mod full;
pub mod init;
pub mod queue;
pub mod relevance;
pub mod search;

pub use clean::{clean, CleanArgs};
pub use duplicates::{duplicates, DuplicatesArgs};
pub use extract::{extract, ExtractArgs};
pub use formulas::{formulas, index, stats};
pub use full::{full, FullArgs};
pub use init::{init, InitArgs};
pub use queue::{queue, QueueArgs};
pub use relevance::{relevance, RelevanceArgs};
pub use search::{search, SearchArgs};

/// Available commands for the CLI
#[derive(Subcommand, Clone)]
pub enum Commands {
  /// Write a default configuration file
  Init(InitArgs),

  /// Extract text, chunks and metadata from every PDF below the raw directories
  Extract(ExtractArgs),

  /// Catalog the formulas of the scientific OCR markdown
  Formulas,

  /// Rebuild the formula token index from the catalog
  Index,

  /// Search the formula index by symbol and/or regular expression
  Search(SearchArgs),

  /// Report byte-identical files and files with near-identical names
  Duplicates(DuplicatesArgs),

  /// Count keywords in the extracted text files
  Relevance(RelevanceArgs),

  /// Process items tagged for processing in Zotero
  Queue(QueueArgs),

  /// Show engine availability and formula index statistics
  Stats,

  /// Run extraction, scientific OCR, formula cataloging and indexing, and the reports
  Full(FullArgs),

  /// Remove generated outputs after confirmation
  Clean(CleanArgs),
}
