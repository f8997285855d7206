//! Module for the duplicate report.

use folio::duplicates::DuplicateScanner;

use super::*;

/// File name of the report below `paths.metadata`.
pub const DUPLICATES_FILE_NAME: &str = "duplicates.tsv";

/// Arguments for [`Commands::Duplicates`]
#[derive(Args, Clone)]
pub struct DuplicatesArgs {
  /// Minimum name similarity (0 to 100) reported as a near-name pair
  #[arg(long, short)]
  pub threshold: Option<u8>,

  /// Where to write the TSV report. Defaults to `<paths.metadata>/duplicates.tsv`
  #[arg(long, short)]
  pub output: Option<PathBuf>,

  /// Scan these directories instead of the configured raw directories
  #[arg(long = "dir")]
  pub dirs: Vec<PathBuf>,
}

/// Function for the [`Commands::Duplicates`] in the CLI.
pub fn duplicates<I: UserInteraction>(
  interaction: &I,
  mut config: Config,
  args: DuplicatesArgs,
) -> Result<()> {
  let DuplicatesArgs { threshold, output, dirs } = args;
  if let Some(threshold) = threshold {
    config.duplicates.name_threshold = threshold;
  }
  let roots = if dirs.is_empty() { config.paths.raw.clone() } else { dirs };
  let output = output.unwrap_or_else(|| config.paths.metadata.join(DUPLICATES_FILE_NAME));

  let report = DuplicateScanner::new(&config.duplicates).scan(&roots)?;
  report.write_tsv(&output)?;
  interaction.reply(ResponseContent::Duplicates(&report))?;
  interaction.reply(ResponseContent::Info(&format!("Report written to {}", output.display())))
}
