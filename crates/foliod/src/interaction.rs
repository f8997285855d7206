//! User facing output and prompts.

use console::style;
use dialoguer::{Confirm, Input};
use folio::{
  dispatcher::QueueOutcome,
  duplicates::DuplicateReport,
  formula::{CatalogSummary, FormulaRecord, IndexStats, IndexSummary},
  pipeline::ExtractionSummary,
  relevance::RelevanceReport,
};

use super::*;

pub static INFO_PREFIX: &str = "ℹ ";
pub static SUCCESS_PREFIX: &str = "✓ ";
pub static ERROR_PREFIX: &str = "✗ ";
pub static WARNING_PREFIX: &str = "! ";
pub static PROMPT_PREFIX: &str = "❯ ";
pub static ITEM_PREFIX: &str = "├─";
pub static LAST_ITEM_PREFIX: &str = "└─";

/// Rows of the relevance report shown on the terminal.
const RELEVANCE_ROWS: usize = 10;

#[derive(Debug)]
pub enum ResponseContent<'a> {
  Success(&'a str),
  Info(&'a str),
  Warning(&'a str),
  Error(FoliodError),
  Availability(&'a BTreeMap<ProcessingEngine, bool>),
  Extraction(&'a ExtractionSummary),
  Catalog(&'a CatalogSummary),
  Index(&'a IndexSummary),
  Stats(&'a IndexStats),
  Formulas(&'a [FormulaRecord]),
  Duplicates(&'a DuplicateReport),
  Relevance(&'a RelevanceReport),
  Queue(&'a [QueueOutcome]),
}

pub trait UserInteraction {
  /// Whether prompts are skipped in favor of their defaults.
  fn accepts_defaults(&self) -> bool { false }
  fn confirm(&self, message: &str) -> Result<bool>;
  fn prompt(&self, message: &str) -> Result<String>;
  fn reply(&self, content: ResponseContent) -> Result<()>;
}

/// Terminal backed interaction. With `accept_defaults` every confirmation is answered yes.
pub struct Terminal {
  accept_defaults: bool,
}

impl Terminal {
  pub fn new(accept_defaults: bool) -> Self { Self { accept_defaults } }
}

fn items<T>(list: &[T]) -> impl Iterator<Item = (&'static str, &T)> {
  let last = list.len().saturating_sub(1);
  list.iter().enumerate().map(move |(i, item)| (if i == last { LAST_ITEM_PREFIX } else { ITEM_PREFIX }, item))
}

impl UserInteraction for Terminal {
  fn accepts_defaults(&self) -> bool { self.accept_defaults }

  fn confirm(&self, message: &str) -> Result<bool> {
    if self.accept_defaults {
      return Ok(true);
    }
    Ok(
      Confirm::new()
        .with_prompt(format!("{}{message}", style(PROMPT_PREFIX).cyan()))
        .default(false)
        .wait_for_newline(true)
        .interact()?,
    )
  }

  fn prompt(&self, message: &str) -> Result<String> {
    Ok(
      Input::<String>::new()
        .with_prompt(format!("{}{message}", style(PROMPT_PREFIX).cyan()))
        .interact_text()?,
    )
  }

  fn reply(&self, content: ResponseContent) -> Result<()> {
    match content {
      ResponseContent::Success(message) => println!("{}{message}", style(SUCCESS_PREFIX).green()),
      ResponseContent::Info(message) => println!("{}{message}", style(INFO_PREFIX).blue()),
      ResponseContent::Warning(message) => println!("{}{message}", style(WARNING_PREFIX).yellow()),
      ResponseContent::Error(error) => eprintln!("{}{error}", style(ERROR_PREFIX).red()),
      ResponseContent::Availability(availability) => {
        println!("{}Extraction engines", style(INFO_PREFIX).blue());
        let engines: Vec<_> = availability.iter().collect();
        for (prefix, (engine, available)) in items(&engines) {
          let state =
            if **available { style("available").green() } else { style("unavailable").dim() };
          println!("{prefix} {:<15} {state}", engine.to_string());
        }
      },
      ResponseContent::Extraction(summary) => {
        let prefix = if summary.errors.is_empty() {
          style(SUCCESS_PREFIX).green()
        } else {
          style(WARNING_PREFIX).yellow()
        };
        println!(
          "{prefix}Extraction finished: {} processed, {} skipped, {} errors of {} PDFs ({} chunks)",
          style(summary.processed).bold(),
          summary.skipped,
          summary.errors.len(),
          summary.total,
          summary.chunks
        );
        for (prefix, failure) in items(&summary.errors) {
          println!("{prefix} {}: {}", style(failure.pdf.display()).yellow(), failure.error);
        }
        if summary.metadata_errors > 0 {
          println!(
            "{}Document information unreadable for {} files",
            style(WARNING_PREFIX).yellow(),
            summary.metadata_errors
          );
        }
        for failure in &summary.chunk_errors {
          println!(
            "{}Chunking failed for {}: {}",
            style(WARNING_PREFIX).yellow(),
            failure.pdf.display(),
            failure.error
          );
        }
      },
      ResponseContent::Catalog(summary) => {
        println!(
          "{}Extracted {} formulas from {} of {} markdown files into {}",
          style(SUCCESS_PREFIX).green(),
          style(summary.total_formulas).bold(),
          summary.processed,
          summary.files,
          style(summary.catalog_file.display()).yellow()
        );
        for (prefix, (path, error)) in items(&summary.errors) {
          println!("{prefix} {}: {error}", style(path.display()).yellow());
        }
      },
      ResponseContent::Index(summary) => println!(
        "{}Indexed {} of {} formulas ({} token mappings) in {}",
        style(SUCCESS_PREFIX).green(),
        style(summary.indexed).bold(),
        summary.total,
        summary.token_mappings,
        style(summary.db_path.display()).yellow()
      ),
      ResponseContent::Stats(stats) => {
        println!("{}Formula index", style(INFO_PREFIX).blue());
        println!("{ITEM_PREFIX} Formulas:       {}", stats.total_formulas);
        println!("{ITEM_PREFIX} Documents:      {}", stats.documents);
        println!("{ITEM_PREFIX} Unique tokens:  {}", stats.unique_tokens);
        println!("{LAST_ITEM_PREFIX} Token mappings: {}", stats.total_token_mappings);
      },
      ResponseContent::Formulas(records) => {
        if records.is_empty() {
          println!("{}No formulas found", style(INFO_PREFIX).blue());
        } else {
          println!("{}Found {} formulas", style(SUCCESS_PREFIX).green(), style(records.len()).bold());
          for (prefix, record) in items(records) {
            println!(
              "{prefix} [{}] {} {} {}",
              style(&record.hash).dim(),
              style(&record.doc_id).cyan(),
              record.kind,
              record.latex
            );
          }
        }
      },
      ResponseContent::Duplicates(report) => {
        println!(
          "{}Scanned {} files: {} exact groups, {} similar name pairs",
          style(SUCCESS_PREFIX).green(),
          report.total_files,
          style(report.exact_groups.len()).bold(),
          style(report.near_name_pairs.len()).bold()
        );
        for (digest, names) in &report.exact_groups {
          println!("{ITEM_PREFIX} {} {}", style(&digest[..digest.len().min(12)]).dim(), names.join(", "));
        }
        for (prefix, (score, a, b)) in items(&report.near_name_pairs) {
          println!("{prefix} {score:>3} {a} ~ {b}");
        }
      },
      ResponseContent::Relevance(report) => {
        println!(
          "{}Relevance over {} documents for {}",
          style(SUCCESS_PREFIX).green(),
          report.rows.len(),
          report.keywords.join(", ")
        );
        let top = &report.rows[..report.rows.len().min(RELEVANCE_ROWS)];
        for (prefix, row) in items(top) {
          println!("{prefix} {:>5} {}", style(row.total_hits).bold(), row.doc);
        }
      },
      ResponseContent::Queue(outcomes) => {
        if outcomes.is_empty() {
          println!("{}No queue items to process", style(INFO_PREFIX).blue());
        }
        for outcome in outcomes {
          match &outcome.result {
            Ok(result) if result.success => println!(
              "{}{} {} via {}",
              style(SUCCESS_PREFIX).green(),
              style(&outcome.key).cyan(),
              outcome.title,
              result.engine_used
            ),
            Ok(result) => println!(
              "{}{} {}: {}",
              style(ERROR_PREFIX).red(),
              style(&outcome.key).cyan(),
              outcome.title,
              result.error_message.as_deref().unwrap_or_default()
            ),
            Err(reason) => println!(
              "{}{} {}: {reason}",
              style(ERROR_PREFIX).red(),
              style(&outcome.key).cyan(),
              outcome.title
            ),
          }
        }
      },
    }
    Ok(())
  }
}
