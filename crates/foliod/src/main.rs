//! Command line interface for the folio PDF knowledge pipeline.
//!
//! This crate provides the `folio` binary driving the [`folio`] library:
//! - Workspace configuration
//! - Batch text extraction with chunking and per-document metadata
//! - Formula cataloging, indexing and search
//! - Duplicate detection and keyword relevance reports
//! - Processing of a Zotero `/to_process` queue
//!
//! # Usage
//!
//! ```bash
//! # Write a default configuration and create the workspace directories
//! folio init --with-dirs
//!
//! # Extract text from every PDF below the raw directories
//! folio extract --workers 4
//!
//! # Catalog and index the formulas of the scientific OCR output, then search them
//! folio formulas
//! folio index
//! folio search --symbol '\alpha' --pattern '\^2'
//!
//! # Everything at once
//! folio full
//! ```
//!
//! Progress is logged to stderr (`-v` to `-vvvv` raise the level, `RUST_LOG` overrides it) and
//! to `<paths.logs>/pipeline.log`.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{collections::BTreeMap, path::PathBuf};

use clap::{builder::ArgAction, Args, Parser, Subcommand};
use folio::{config::Config, prelude::*};
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub mod commands;
pub mod error;
pub mod interaction;

use crate::{commands::*, error::*, interaction::*};

/// Name of the log file written below `paths.logs`.
const LOG_FILE_NAME: &str = "pipeline.log";

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "PDF knowledge pipeline: extraction, chunking and formula search")]
pub struct Cli {
  /// Verbose mode (-v, -vv, -vvv) for different levels of logging detail
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Configuration file. Defaults to `PIPELINE_CONFIG_PATH`, then `./folio.toml`, then the
  /// platform configuration directory.
  #[arg(long, short, global = true)]
  config: Option<PathBuf>,

  /// Directory that relative paths of the configuration are resolved against.
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// The subcommand to execute
  #[command(subcommand)]
  command: Commands,

  /// Skip all prompts and accept defaults (mostly for testing)
  #[arg(long, hide = true, global = true)]
  accept_defaults: bool,
}

/// Configures logging to stderr and, if the log directory is writable, to
/// `<logs>/pipeline.log`.
///
/// The verbosity levels are:
/// - 0: error (default)
/// - 1: warn
/// - 2: info
/// - 3: debug
/// - 4+: trace
fn setup_logging(verbosity: u8, logs: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
  let level = match verbosity {
    0 => "error",
    1 => "warn",
    2 => "info",
    3 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

  let stderr = fmt::layer()
    .with_writer(std::io::stderr)
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true);

  let (file, guard) = match logs.map(|dir| std::fs::create_dir_all(dir).map(|()| dir)) {
    Some(Ok(dir)) => {
      let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, LOG_FILE_NAME));
      let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
      (Some(layer.with_filter(EnvFilter::new("info,folio=debug"))), Some(guard))
    },
    _ => (None, None),
  };

  tracing_subscriber::registry()
    .with(stderr.with_filter(filter))
    .with(file)
    .try_init()
    .map_err(|e| FoliodError::Logging(e.to_string()))?;
  Ok(guard)
}

/// Loads the configuration named on the command line and rebases it onto `--root`.
fn load_config(cli: &Cli) -> Result<Config> {
  let config = Config::load(cli.config.as_deref())?;
  Ok(match &cli.root {
    Some(root) => config.rooted_at(root),
    None => config,
  })
}

/// Entry point for the folio CLI application
///
/// Parses arguments, loads the configuration, sets up logging and runs the requested command.
///
/// # Errors
///
/// Returns [`FoliodError`] for failures that stop a command as a whole, such as an unreadable
/// configuration file or no available extraction engine. Per-document failures are reported
/// in the command's summary instead.
#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let interaction = Terminal::new(cli.accept_defaults);

  // `init` must work before any configuration exists
  if let Commands::Init(args) = &cli.command {
    let _guard = setup_logging(cli.verbose, None)?;
    return init(&interaction, &cli, args.clone());
  }

  let config = match load_config(&cli) {
    Ok(config) => config,
    Err(e) => {
      interaction.reply(ResponseContent::Error(e))?;
      interaction
        .reply(ResponseContent::Info("Run `folio init` to write a default configuration"))?;
      std::process::exit(1);
    },
  };
  let guard = setup_logging(cli.verbose, Some(&config.paths.logs))?;
  debug!("Raw directories {:?}, outputs below {}", config.paths.raw, config.paths.metadata.display());

  let result = match cli.command.clone() {
    Commands::Init(_) => Ok(()),
    Commands::Extract(args) => extract(&interaction, config, args).await,
    Commands::Formulas => formulas(&interaction, &config),
    Commands::Index => index(&interaction, &config),
    Commands::Search(args) => search(&interaction, &config, args),
    Commands::Duplicates(args) => duplicates(&interaction, config, args),
    Commands::Relevance(args) => relevance(&interaction, &config, args),
    Commands::Queue(args) => queue(&interaction, &config, args).await,
    Commands::Stats => stats(&interaction, &config).await,
    Commands::Full(args) => full(&interaction, config, args).await,
    Commands::Clean(args) => clean(&interaction, &config, args),
  };

  if let Err(e) = result {
    warn!("Command failed: {e}");
    interaction.reply(ResponseContent::Error(e))?;
    drop(guard);
    std::process::exit(1);
  }
  Ok(())
}
