//! Module for writing a default [`Config`].

use folio::config::CONFIG_FILE_NAME;

use super::*;

/// Arguments for [`Commands::Init`]
#[derive(Args, Clone)]
pub struct InitArgs {
  /// Write to the platform configuration directory instead of the working directory
  #[arg(long)]
  pub global: bool,

  /// Also create the input and output directories named in the configuration
  #[arg(long)]
  pub with_dirs: bool,
}

/// Function for the [`Commands::Init`] in the CLI.
///
/// The file goes to `--config` if given, else to the platform configuration directory with
/// `--global`, else to `folio.toml` below `--root` or the working directory.
pub fn init<I: UserInteraction>(interaction: &I, cli: &Cli, args: InitArgs) -> Result<()> {
  let InitArgs { global, with_dirs } = args;
  let root = cli.root.clone().unwrap_or_else(|| PathBuf::from("."));

  let path = match (&cli.config, global) {
    (Some(path), _) => path.clone(),
    (None, true) => match Config::default_path() {
      Some(path) => path,
      None => {
        interaction.reply(ResponseContent::Warning(
          "No platform configuration directory; pass a file with --config",
        ))?;
        return Ok(());
      },
    },
    (None, false) => root.join(CONFIG_FILE_NAME),
  };

  if path.exists()
    && !interaction.confirm(&format!(
      "Configuration already exists at {}, do you want to overwrite it?",
      path.display()
    ))?
  {
    interaction.reply(ResponseContent::Info("Keeping the existing configuration"))?;
    return Ok(());
  }

  let config = Config::default();
  config.save(&path)?;
  interaction.reply(ResponseContent::Success(&format!(
    "Configuration written to {}",
    path.display()
  )))?;

  if with_dirs {
    let rooted = config.rooted_at(&root);
    let dirs = rooted
      .paths
      .raw
      .iter()
      .chain([&rooted.paths.text, &rooted.paths.chunks, &rooted.paths.metadata, &rooted.paths.logs])
      .chain([&rooted.formulas.markdown_dir, &rooted.formulas.text_dir]);
    for dir in dirs {
      std::fs::create_dir_all(dir)?;
    }
    interaction.reply(ResponseContent::Success(&format!(
      "Created workspace directories below {}",
      root.display()
    )))?;
  }
  Ok(())
}
