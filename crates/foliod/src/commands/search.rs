//! Module for querying the formula index.

use folio::formula::{Search, DEFAULT_LIMIT};

use super::*;

/// Arguments for [`Commands::Search`]
#[derive(Args, Clone)]
pub struct SearchArgs {
  /// Index token the formula must contain, e.g. `\alpha` or `x`
  #[arg(long, short)]
  pub symbol: Option<String>,

  /// Regular expression the LaTeX body must match
  #[arg(long, short)]
  pub pattern: Option<String>,

  /// Maximum number of formulas to show
  #[arg(long, short, default_value_t = DEFAULT_LIMIT)]
  pub limit: usize,
}

/// Function for the [`Commands::Search`] in the CLI.
pub fn search<I: UserInteraction>(interaction: &I, config: &Config, args: SearchArgs) -> Result<()> {
  let SearchArgs { symbol, pattern, limit } = args;
  let results = Search::new(symbol.as_deref(), pattern.as_deref())
    .limit(limit)
    .run_at(&config.formulas.index_db)?;

  if let Some(diagnostic) = &results.diagnostic {
    interaction.reply(ResponseContent::Warning(diagnostic))?;
  }
  interaction.reply(ResponseContent::Formulas(&results.records))
}
