//! Module for removing generated outputs.

use std::path::Path;

use super::*;

/// Text the user has to type before anything is removed.
const CONFIRMATION_WORD: &str = "DELETE";

/// Arguments for [`Commands::Clean`]
#[derive(Args, Clone)]
pub struct CleanArgs {
  /// Also remove the scientific OCR markdown, which is expensive to regenerate
  #[arg(long)]
  pub all: bool,
}

/// Number of files below `dir`.
fn count_files(dir: &Path) -> Result<usize> {
  let pattern = format!("{}/**/*", glob::Pattern::escape(&dir.to_string_lossy()));
  Ok(glob::glob(&pattern)?.flatten().filter(|path| path.is_file()).count())
}

/// Function for the [`Commands::Clean`] in the CLI.
///
/// Removes the text, chunk and metadata directories, the formula text directory and the
/// formula index. Raw PDFs are never touched.
pub fn clean<I: UserInteraction>(interaction: &I, config: &Config, args: CleanArgs) -> Result<()> {
  let mut dirs = vec![
    &config.paths.text,
    &config.paths.chunks,
    &config.paths.metadata,
    &config.formulas.text_dir,
  ];
  if args.all {
    dirs.push(&config.formulas.markdown_dir);
  }
  dirs.retain(|dir| dir.is_dir());
  let index_db = config.formulas.index_db.is_file().then_some(&config.formulas.index_db);

  if dirs.is_empty() && index_db.is_none() {
    interaction.reply(ResponseContent::Info("Nothing to clean"))?;
    return Ok(());
  }

  interaction.reply(ResponseContent::Warning("The following outputs will be removed:"))?;
  for dir in &dirs {
    println!("{ITEM_PREFIX} {} ({} files)", dir.display(), count_files(dir)?);
  }
  if let Some(db) = index_db {
    println!("{LAST_ITEM_PREFIX} {}", db.display());
  }

  if !interaction.confirm("Do you want to remove these outputs?")? {
    interaction.reply(ResponseContent::Info("Nothing removed"))?;
    return Ok(());
  }
  if !interaction.accepts_defaults() {
    let typed = interaction.prompt(&format!("Type {CONFIRMATION_WORD} to confirm"))?;
    if typed.trim() != CONFIRMATION_WORD {
      interaction.reply(ResponseContent::Info("Nothing removed"))?;
      return Ok(());
    }
  }

  for dir in dirs {
    debug!("Removing {}", dir.display());
    std::fs::remove_dir_all(dir)?;
  }
  // The index may live inside the metadata directory that is already gone
  if let Some(db) = index_db.filter(|db| db.exists()) {
    std::fs::remove_file(db)?;
  }
  interaction.reply(ResponseContent::Success("Generated outputs removed"))
}
