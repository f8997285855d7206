//! Remote work queues feeding the dispatcher.
//!
//! A [`DocumentQueue`] hands out pending items, stages their PDF into a local directory and
//! records the outcome. [`ZoteroQueue`] implements it over the Zotero Web API with the tag
//! workflow `/to_process` → `/processed` | `/error`.

use super::*;

mod zotero;

pub use self::zotero::ZoteroQueue;

/// A queued document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
  /// Queue specific item key.
  pub key:     String,
  /// Human readable title.
  pub title:   String,
  /// Tags of the item, used as routing hints.
  pub tags:    Vec<String>,
  /// Version used for optimistic concurrency on updates.
  pub version: u64,
}

/// A source of documents to process.
#[async_trait]
pub trait DocumentQueue: Send + Sync {
  /// Up to `limit` pending items, oldest first.
  async fn pending(&self, limit: usize) -> Result<Vec<QueueItem>>;

  /// Downloads the item's PDF into `dir` and returns its path.
  async fn stage(&self, item: &QueueItem, dir: &Path) -> Result<PathBuf>;

  /// Records a successful run.
  async fn mark_processed(&self, item: &QueueItem) -> Result<()>;

  /// Records a failed run with its reason.
  async fn mark_failed(&self, item: &QueueItem, reason: &str) -> Result<()>;
}
