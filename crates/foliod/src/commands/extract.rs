//! Module for the batch text extraction.

use std::sync::Arc;

use folio::{dispatcher::Dispatcher, pipeline::Pipeline};

use super::*;

/// Arguments for [`Commands::Extract`]
#[derive(Args, Clone)]
pub struct ExtractArgs {
  /// Re-extract documents whose text output already exists
  #[arg(long)]
  pub overwrite: bool,

  /// Number of parallel workers (1 to 4)
  #[arg(long, short)]
  pub workers: Option<usize>,

  /// Scan these directories instead of the configured raw directories
  #[arg(long = "raw")]
  pub raw_dirs: Vec<PathBuf>,
}

/// Builds a dispatcher, reports engine availability and fails if no engine can run.
pub(crate) async fn dispatcher<I: UserInteraction>(
  interaction: &I,
  config: &Config,
) -> Result<Arc<Dispatcher>> {
  let dispatcher = Dispatcher::from_config(config).await?;
  interaction.reply(ResponseContent::Availability(dispatcher.availability()))?;
  dispatcher.ensure_any_available()?;
  Ok(Arc::new(dispatcher))
}

/// Function for the [`Commands::Extract`] in the CLI.
pub async fn extract<I: UserInteraction>(
  interaction: &I,
  mut config: Config,
  args: ExtractArgs,
) -> Result<()> {
  let ExtractArgs { overwrite, workers, raw_dirs } = args;
  if !raw_dirs.is_empty() {
    config.paths.raw = raw_dirs;
  }
  if let Some(workers) = workers {
    config.pipeline.max_workers = workers;
  }
  config.pipeline.overwrite |= overwrite;

  let dispatcher = dispatcher(interaction, &config).await?;
  let pipeline = Pipeline::new(dispatcher, &config)?;
  interaction.reply(ResponseContent::Info(&format!(
    "Extracting PDFs below {} with {} workers",
    config.paths.raw.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "),
    pipeline.worker_count()
  )))?;

  let summary = pipeline.run().await?;
  if summary.total == 0 {
    interaction.reply(ResponseContent::Warning(
      "No PDFs found; adjust RAW_DIRS or place files below the raw directory",
    ))?;
  }
  interaction.reply(ResponseContent::Extraction(&summary))
}
