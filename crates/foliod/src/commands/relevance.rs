//! Module for the keyword relevance report.

use folio::relevance::RelevanceReport;

use super::*;

/// File name of the report below `paths.metadata`.
pub const RELEVANCE_FILE_NAME: &str = "relevance_report.csv";

/// Arguments for [`Commands::Relevance`]
#[derive(Args, Clone)]
pub struct RelevanceArgs {
  /// Keyword to count, repeatable. Defaults to `pipeline.relevance_keywords`
  #[arg(long = "keyword", short)]
  pub keywords: Vec<String>,

  /// Where to write the CSV report. Defaults to `<paths.metadata>/relevance_report.csv`
  #[arg(long, short)]
  pub output: Option<PathBuf>,
}

/// Function for the [`Commands::Relevance`] in the CLI.
pub fn relevance<I: UserInteraction>(
  interaction: &I,
  config: &Config,
  args: RelevanceArgs,
) -> Result<()> {
  let RelevanceArgs { keywords, output } = args;
  let keywords =
    if keywords.is_empty() { config.pipeline.relevance_keywords.clone() } else { keywords };
  let output = output.unwrap_or_else(|| config.paths.metadata.join(RELEVANCE_FILE_NAME));

  let report = RelevanceReport::build(&config.paths.text, &keywords)?;
  report.write_csv(&output)?;
  interaction.reply(ResponseContent::Relevance(&report))?;
  interaction.reply(ResponseContent::Info(&format!("Report written to {}", output.display())))
}
