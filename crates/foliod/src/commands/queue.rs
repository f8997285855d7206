//! Module for processing the Zotero `to_process` queue.

use folio::queue::ZoteroQueue;

use super::*;

/// Arguments for [`Commands::Queue`]
#[derive(Args, Clone)]
pub struct QueueArgs {
  /// Maximum number of items to process. Defaults to `zotero.batch_size`
  #[arg(long, short)]
  pub max_items: Option<usize>,
}

/// Function for the [`Commands::Queue`] in the CLI.
///
/// Items are processed one after another; a failed item is tagged with the error tag and gets
/// a note with the reason, and the run continues with the next item.
pub async fn queue<I: UserInteraction>(interaction: &I, config: &Config, args: QueueArgs) -> Result<()> {
  let max_items = args.max_items.unwrap_or(config.zotero.batch_size);
  let queue = ZoteroQueue::new(&config.zotero)?;
  let dispatcher = extract::dispatcher(interaction, config).await?;

  interaction.reply(ResponseContent::Info(&format!(
    "Fetching up to {max_items} items tagged {}",
    config.zotero.to_process_tag
  )))?;
  let outcomes = dispatcher.run_queue(&queue, max_items).await?;
  interaction.reply(ResponseContent::Queue(&outcomes))?;

  let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
  if failed > 0 {
    interaction.reply(ResponseContent::Warning(&format!(
      "{failed} of {} items were tagged {}",
      outcomes.len(),
      config.zotero.error_tag
    )))?;
  }
  Ok(())
}
