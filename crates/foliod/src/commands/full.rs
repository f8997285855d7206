//! Module for running every pipeline stage in order.

use folio::{
  dispatcher::{Dispatcher, RouteDecision},
  engine::ScientificOcrEngine,
  pdf,
  pipeline::Pipeline,
};

use super::*;

/// Confidence recorded for documents routed to scientific OCR by [`full`].
const FORCED_CONFIDENCE: f32 = 1.0;

/// Arguments for [`Commands::Full`]
#[derive(Args, Clone)]
pub struct FullArgs {
  /// Re-extract documents whose outputs already exist
  #[arg(long)]
  pub overwrite: bool,

  /// Number of parallel extraction workers (1 to 4)
  #[arg(long, short)]
  pub workers: Option<usize>,

  /// Do not run scientific OCR for the formula catalog
  #[arg(long)]
  pub skip_scientific_ocr: bool,
}

/// Function for the [`Commands::Full`] in the CLI.
///
/// Runs extraction, scientific OCR of every PDF into the markdown directory, the formula
/// catalog and index, and both reports. A stage that finds nothing to do is reported and the
/// next stage still runs.
pub async fn full<I: UserInteraction>(interaction: &I, mut config: Config, args: FullArgs) -> Result<()> {
  let FullArgs { overwrite, workers, skip_scientific_ocr } = args;
  if let Some(workers) = workers {
    config.pipeline.max_workers = workers;
  }
  config.pipeline.overwrite |= overwrite;

  let dispatcher = extract::dispatcher(interaction, &config).await?;
  let summary = Pipeline::new(dispatcher.clone(), &config)?.run().await?;
  interaction.reply(ResponseContent::Extraction(&summary))?;

  if skip_scientific_ocr {
    interaction.reply(ResponseContent::Info("Skipping scientific OCR"))?;
  } else if dispatcher.is_available(ProcessingEngine::ScientificOcr) {
    scientific_ocr(interaction, &dispatcher, &config).await?;
  } else {
    interaction.reply(ResponseContent::Warning(
      "Scientific OCR unavailable; cataloging existing markdown only",
    ))?;
  }

  formulas(interaction, &config)?;
  index(interaction, &config)?;
  duplicates(interaction, config.clone(), DuplicatesArgs {
    threshold: None,
    output:    None,
    dirs:      Vec::new(),
  })?;
  relevance(interaction, &config, RelevanceArgs { keywords: Vec::new(), output: None })
}

/// Converts every PDF without markdown output, one at a time.
async fn scientific_ocr<I: UserInteraction>(
  interaction: &I,
  dispatcher: &Dispatcher,
  config: &Config,
) -> Result<()> {
  let engine = ScientificOcrEngine::new(config.engines.scientific_ocr.clone());
  let route =
    RouteDecision::new(ProcessingEngine::ScientificOcr, FORCED_CONFIDENCE, "Formula extraction");

  let (mut converted, mut existing, mut failed) = (0, 0, 0);
  for file in pdf::discover_pdfs(&config.paths.raw)? {
    if engine.output_path(&file).exists() && !config.pipeline.overwrite {
      existing += 1;
      continue;
    }
    let result = dispatcher.execute(&file, &route).await;
    if result.success {
      converted += 1;
    } else {
      failed += 1;
      warn!(
        "Scientific OCR failed for {}: {}",
        file.display(),
        result.error_message.as_deref().unwrap_or_default()
      );
    }
  }

  let message =
    format!("Scientific OCR: {converted} converted, {existing} already present, {failed} failed");
  if failed > 0 {
    interaction.reply(ResponseContent::Warning(&message))
  } else {
    interaction.reply(ResponseContent::Success(&message))
  }
}
