//! Batch extraction over the raw PDF tree.
//!
//! [`Pipeline::run`] discovers every PDF below `paths.raw` and feeds the files through a
//! fixed-width pool of tokio tasks. Each worker routes its document through the
//! [`Dispatcher`], then writes
//!
//! - `<paths.text>/<stem>.txt` with the extracted text,
//! - `<paths.chunks>/<stem>.chunks.jsonl` with one chunk record per line,
//! - `<paths.metadata>/<stem>.json` with the PDF's document information, the route taken and a
//!   summary of the chunks.
//!
//! Documents whose text output already exists are skipped unless `overwrite` is set. Workers
//! push one [`DocumentOutcome`] per file into a results channel, and the [`ExtractionSummary`] is
//! aggregated once every worker has finished.

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use crate::{
  chunk::{Chunk, Chunker},
  dispatcher::{Dispatcher, ProcessingResult, RouteDecision, RoutingHints, NO_TEXT_REASON},
  pdf::PdfAnalyzer,
};

use super::*;

/// A per-document failure recorded in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentError {
  /// The source PDF.
  pub pdf:   PathBuf,
  /// What went wrong.
  pub error: String,
}

/// What happened to a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStatus {
  /// Text, chunks and metadata were written.
  Processed {
    /// Number of chunks written.
    chunks:         usize,
    /// Set when the PDF's document information could not be read.
    metadata_error: Option<String>,
    /// Set when the chunk file could not be written.
    chunk_error:    Option<String>,
  },
  /// Nothing was written, with the reason.
  Skipped(SkipReason),
  /// Extraction failed.
  Failed(String),
}

/// Why a document was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  /// The text output exists and `overwrite` is off.
  Exists,
  /// The engine ran but found no text.
  Empty,
}

/// A document and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutcome {
  /// The source PDF.
  pub pdf:    PathBuf,
  /// Its status.
  pub status: DocumentStatus,
}

/// Totals of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
  /// PDFs found.
  pub total:           usize,
  /// PDFs whose outputs were written.
  pub processed:       usize,
  /// PDFs skipped because their output existed or they held no text.
  pub skipped:         usize,
  /// Failed extractions, sorted by path.
  pub errors:          Vec<DocumentError>,
  /// Processed PDFs whose document information could not be read.
  pub metadata_errors: usize,
  /// Chunks written across all documents.
  pub chunks:          usize,
  /// Processed PDFs whose chunk file could not be written, sorted by path.
  pub chunk_errors:    Vec<DocumentError>,
}

impl ExtractionSummary {
  fn record(&mut self, outcome: DocumentOutcome) {
    match outcome.status {
      DocumentStatus::Processed { chunks, metadata_error, chunk_error } => {
        self.processed += 1;
        self.chunks += chunks;
        if metadata_error.is_some() {
          self.metadata_errors += 1;
        }
        if let Some(error) = chunk_error {
          self.chunk_errors.push(DocumentError { pdf: outcome.pdf, error });
        }
      },
      DocumentStatus::Skipped(_) => self.skipped += 1,
      DocumentStatus::Failed(error) => self.errors.push(DocumentError { pdf: outcome.pdf, error }),
    }
  }
}

/// Everything a worker needs to process one document.
#[derive(Clone)]
struct DocumentProcessor {
  dispatcher: Arc<Dispatcher>,
  chunker:    Chunker,
  paths:      PathsConfig,
  overwrite:  bool,
}

impl DocumentProcessor {
  fn stem(pdf: &Path) -> String {
    pdf.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
  }

  async fn process(&self, pdf: &Path) -> DocumentOutcome {
    let status = match self.try_process(pdf).await {
      Ok(status) => status,
      Err(e) => {
        error!("Failed to process {}: {e}", pdf.display());
        DocumentStatus::Failed(e.to_string())
      },
    };
    DocumentOutcome { pdf: pdf.to_path_buf(), status }
  }

  async fn try_process(&self, pdf: &Path) -> Result<DocumentStatus> {
    let stem = Self::stem(pdf);
    let text_path = self.paths.text.join(format!("{stem}.txt"));
    if !self.overwrite && tokio::fs::try_exists(&text_path).await? {
      info!("Skipping {}: output exists", pdf.display());
      return Ok(DocumentStatus::Skipped(SkipReason::Exists));
    }

    let route = self.dispatcher.analyze(pdf, &RoutingHints::default()).await;
    debug!("{}: {} -> {}", pdf.display(), route.reason, route.engine);
    let result = self.dispatcher.execute(pdf, &route).await;
    if !result.success {
      let message = result.error_message.clone().unwrap_or_else(|| NO_TEXT_REASON.to_string());
      if message == NO_TEXT_REASON {
        warn!("No extractable content in {}", pdf.display());
        return Ok(DocumentStatus::Skipped(SkipReason::Empty));
      }
      return Ok(DocumentStatus::Failed(message));
    }

    tokio::fs::write(&text_path, &result.text).await?;

    let analyzer = PdfAnalyzer::new();
    let owned = pdf.to_path_buf();
    let (document, metadata_error) =
      match tokio::task::spawn_blocking(move || analyzer.metadata(owned)).await? {
        Ok(metadata) => (serde_json::to_value(metadata)?, None),
        Err(e) => {
          warn!("Cannot read document information of {}: {e}", pdf.display());
          (json!({ "error": e.to_string(), "fallback_title": &stem }), Some(e.to_string()))
        },
      };

    let chunker = self.chunker.clone();
    let text = result.text.clone();
    let chunks = tokio::task::spawn_blocking(move || chunker.chunk(&text)).await?;
    let chunk_path = self.paths.chunks.join(format!("{stem}.chunks.jsonl"));
    let (chunk_info, chunk_error) = match self.write_chunks(&chunk_path, &chunks).await {
      Ok(()) => (chunk_summary(&chunk_path, &chunks, self.chunker.strategy_name()), None),
      Err(e) => {
        warn!("Chunking could not be completed for {}: {e}", pdf.display());
        (
          json!({ "strategy": self.chunker.strategy_name(), "error": e.to_string() }),
          Some(e.to_string()),
        )
      },
    };

    let payload = metadata_payload(pdf, &text_path, document, &route, &result, chunk_info);
    let metadata_path = self.paths.metadata.join(format!("{stem}.json"));
    tokio::fs::write(&metadata_path, serde_json::to_string_pretty(&payload)?).await?;

    info!("Processed {} with {} ({} chunks)", pdf.display(), result.engine_used, chunks.len());
    Ok(DocumentStatus::Processed {
      chunks: if chunk_error.is_some() { 0 } else { chunks.len() },
      metadata_error,
      chunk_error,
    })
  }

  async fn write_chunks(&self, path: &Path, chunks: &[Chunk]) -> Result<()> {
    let mut lines = String::new();
    for chunk in chunks {
      let record = json!({
        "index": chunk.index,
        "text": chunk.text,
        "char_start": chunk.char_start,
        "char_end": chunk.char_end,
        "strategy": self.chunker.strategy_name(),
      });
      lines.push_str(&serde_json::to_string(&record)?);
      lines.push('\n');
    }
    tokio::fs::write(path, lines).await?;
    Ok(())
  }
}

fn absolute(path: &Path) -> String {
  std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()).display().to_string()
}

fn chunk_summary(path: &Path, chunks: &[Chunk], strategy: &str) -> Value {
  let mut summary = json!({
    "count": chunks.len(),
    "path": absolute(path),
    "strategy": strategy,
  });
  if let Some(max) = chunks.iter().map(Chunk::len).max() {
    let total: usize = chunks.iter().map(Chunk::len).sum();
    summary["avg_chars"] = json!(total / chunks.len());
    summary["max_chars"] = json!(max);
  }
  summary
}

fn metadata_payload(
  pdf: &Path,
  text_path: &Path,
  document: Value,
  route: &RouteDecision,
  result: &ProcessingResult,
  chunks: Value,
) -> Value {
  json!({
    "pdf": absolute(pdf),
    "text": absolute(text_path),
    "extracted_at": Utc::now().to_rfc3339(),
    "metadata": document,
    "route": route,
    "engine": {
      "name": result.engine_used,
      "duration_seconds": result.duration_seconds,
      "details": result.metadata,
    },
    "chunks": chunks,
  })
}

/// Drives a batch of PDFs through the dispatcher with a worker pool.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use folio::{config::Config, dispatcher::Dispatcher, pipeline::Pipeline, prelude::*};
///
/// # async fn example() -> Result<(), FolioError> {
/// let config = Config::load(None)?;
/// let dispatcher = Arc::new(Dispatcher::from_config(&config).await?);
/// dispatcher.ensure_any_available()?;
///
/// let summary = Pipeline::new(dispatcher, &config)?.overwrite(true).run().await?;
/// println!("{} of {} processed", summary.processed, summary.total);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
  processor: DocumentProcessor,
  raw_dirs:  Vec<PathBuf>,
  workers:   usize,
}

impl Pipeline {
  /// Creates a pipeline with the chunking, path and worker settings of `config`.
  ///
  /// # Errors
  ///
  /// Fails if the chunking configuration is invalid.
  pub fn new(dispatcher: Arc<Dispatcher>, config: &Config) -> Result<Self> {
    Ok(Self {
      processor: DocumentProcessor {
        dispatcher,
        chunker: Chunker::from_config(&config.chunking)?,
        paths: config.paths.clone(),
        overwrite: config.pipeline.overwrite,
      },
      raw_dirs:  config.paths.raw.clone(),
      workers:   config.pipeline.effective_workers(),
    })
  }

  /// Re-extracts documents whose text output already exists.
  pub fn overwrite(mut self, overwrite: bool) -> Self {
    self.processor.overwrite = overwrite;
    self
  }

  /// Overrides the worker count, clamped like `pipeline.max_workers`.
  pub fn workers(mut self, workers: usize) -> Self {
    self.workers = PipelineConfig { max_workers: workers, ..Default::default() }.effective_workers();
    self
  }

  /// Number of workers a run spawns.
  pub fn worker_count(&self) -> usize { self.workers }

  /// Processes every PDF below the configured raw directories.
  pub async fn run(&self) -> Result<ExtractionSummary> {
    let files = pdf::discover_pdfs(&self.raw_dirs)?;
    if files.is_empty() {
      warn!("No PDFs found below {:?}", self.raw_dirs);
    }
    self.run_files(files).await
  }

  /// Processes an explicit list of PDFs.
  pub async fn run_files(&self, files: Vec<PathBuf>) -> Result<ExtractionSummary> {
    let paths = &self.processor.paths;
    for dir in [&paths.text, &paths.chunks, &paths.metadata] {
      tokio::fs::create_dir_all(dir).await?;
    }

    let mut summary = ExtractionSummary { total: files.len(), ..Default::default() };
    if files.is_empty() {
      return Ok(summary);
    }
    let started = Instant::now();
    info!("Starting extraction of {} PDFs with {} workers", files.len(), self.workers);

    let (work_tx, work_rx) = mpsc::unbounded_channel::<PathBuf>();
    for file in files {
      if work_tx.send(file).is_err() {
        break;
      }
    }
    drop(work_tx);

    let processor = Arc::new(self.processor.clone());
    let work_rx = Arc::new(Mutex::new(work_rx));
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<DocumentOutcome>();
    let handles: Vec<_> = (0..self.workers)
      .map(|worker| {
        let work_rx = Arc::clone(&work_rx);
        let result_tx = result_tx.clone();
        let processor = Arc::clone(&processor);
        tokio::spawn(async move {
          loop {
            let next = work_rx.lock().await.recv().await;
            let Some(pdf) = next else { break };
            trace!(worker, "Picked up {}", pdf.display());
            if result_tx.send(processor.process(&pdf).await).is_err() {
              break;
            }
          }
        })
      })
      .collect();
    drop(result_tx);

    for joined in futures::future::join_all(handles).await {
      if let Err(e) = joined {
        error!("Extraction worker stopped: {e}");
      }
    }
    while let Some(outcome) = result_rx.recv().await {
      summary.record(outcome);
    }
    summary.errors.sort_by(|a, b| a.pdf.cmp(&b.pdf));
    summary.chunk_errors.sort_by(|a, b| a.pdf.cmp(&b.pdf));

    info!(
      "Extraction finished in {:.1}s: {} processed, {} skipped, {} errors",
      started.elapsed().as_secs_f64(),
      summary.processed,
      summary.skipped,
      summary.errors.len()
    );
    if summary.metadata_errors > 0 {
      warn!("Document information unreadable for {} files", summary.metadata_errors);
    }
    if !summary.chunk_errors.is_empty() {
      warn!("Chunking failed for {} files", summary.chunk_errors.len());
    }
    Ok(summary)
  }
}
