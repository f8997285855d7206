//! Module for the formula catalog, its index and the status overview.

use folio::{
  dispatcher::Dispatcher,
  formula::{read_catalog, FormulaCatalog, FormulaIndex, Rebuild, Stats},
};

use super::*;

/// Function for the [`Commands::Formulas`] in the CLI.
pub fn formulas<I: UserInteraction>(interaction: &I, config: &Config) -> Result<()> {
  let catalog = FormulaCatalog::new(&config.formulas);
  let summary = catalog.build()?;
  if summary.files == 0 {
    interaction.reply(ResponseContent::Warning(&format!(
      "No markdown found in {}; run scientific OCR first",
      config.formulas.markdown_dir.display()
    )))?;
  }
  interaction.reply(ResponseContent::Catalog(&summary))
}

/// Function for the [`Commands::Index`] in the CLI.
pub fn index<I: UserInteraction>(interaction: &I, config: &Config) -> Result<()> {
  let catalog_file = &config.formulas.catalog_file;
  if !catalog_file.is_file() {
    interaction.reply(ResponseContent::Warning(&format!(
      "No formula catalog at {}; run `folio formulas` first",
      catalog_file.display()
    )))?;
    return Ok(());
  }

  let records = read_catalog(catalog_file)?;
  let mut index = FormulaIndex::open(&config.formulas.index_db)?;
  let summary = Rebuild::new(&records).execute(&mut index)?;
  interaction.reply(ResponseContent::Index(&summary))
}

/// Function for the [`Commands::Stats`] in the CLI.
pub async fn stats<I: UserInteraction>(interaction: &I, config: &Config) -> Result<()> {
  let dispatcher = Dispatcher::from_config(config).await?;
  interaction.reply(ResponseContent::Availability(dispatcher.availability()))?;

  match FormulaIndex::open_existing(&config.formulas.index_db) {
    Ok(mut index) => {
      let stats = Stats.execute(&mut index)?;
      interaction.reply(ResponseContent::Stats(&stats))
    },
    Err(e) => {
      debug!("Formula index unavailable: {e}");
      interaction.reply(ResponseContent::Warning(&e.to_string()))
    },
  }
}
