use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use url::Url;

use super::*;

/// Zotero Web API v3 client acting as a [`DocumentQueue`].
#[derive(Debug, Clone)]
pub struct ZoteroQueue {
  config: ZoteroConfig,
  client: Client,
  base:   Url,
}

impl ZoteroQueue {
  /// Creates a queue for the configured user library.
  ///
  /// # Errors
  ///
  /// Returns [`FolioError::Config`] if the user id or API key is missing.
  pub fn new(config: &ZoteroConfig) -> Result<Self> {
    if config.user_id.trim().is_empty() || config.api_key.trim().is_empty() {
      return Err(FolioError::Config(
        "Zotero queue requires ZOTERO_USER_ID and ZOTERO_API_KEY".into(),
      ));
    }
    let base = Url::parse(&config.api_url)?.join(&format!("users/{}/", config.user_id.trim()))?;
    Ok(Self { config: config.clone(), client: Client::new(), base })
  }

  fn request(&self, method: reqwest::Method, path: &str) -> Result<RequestBuilder> {
    Ok(
      self
        .client
        .request(method, self.base.join(path)?)
        .header("Zotero-API-Version", "3")
        .header("Zotero-API-Key", &self.config.api_key),
    )
  }

  async fn json(&self, request: RequestBuilder) -> Result<Value> {
    let response = request.send().await?;
    if !response.status().is_success() {
      return Err(FolioError::Queue(format!("Zotero responded {}", response.status())));
    }
    Ok(response.json().await?)
  }

  async fn retag(&self, item: &QueueItem, tag: &str) -> Result<()> {
    let tags = retagged(&item.tags, &self.config.to_process_tag, tag);
    let body = json!({ "tags": tags.iter().map(|t| json!({ "tag": t })).collect::<Vec<_>>() });
    let response = self
      .request(reqwest::Method::PATCH, &format!("items/{}", item.key))?
      .header("If-Unmodified-Since-Version", item.version.to_string())
      .json(&body)
      .send()
      .await?;

    match response.status() {
      status if status.is_success() => {
        debug!("Tagged Zotero item {} with {tag}", item.key);
        Ok(())
      },
      StatusCode::PRECONDITION_FAILED => Err(FolioError::Queue(format!(
        "Item {} was modified since version {}",
        item.key, item.version
      ))),
      status => Err(FolioError::Queue(format!("Updating item {} failed: {status}", item.key))),
    }
  }

  async fn add_error_note(&self, item: &QueueItem, reason: &str) -> Result<()> {
    let note = json!([{
      "itemType": "note",
      "parentItem": item.key,
      "note": format!("<p><strong>Processing Error:</strong><br/>{}</p>", escape_html(reason)),
      "tags": [],
    }]);
    self.json(self.request(reqwest::Method::POST, "items")?.json(&note)).await?;
    Ok(())
  }
}

#[async_trait]
impl DocumentQueue for ZoteroQueue {
  async fn pending(&self, limit: usize) -> Result<Vec<QueueItem>> {
    let limit = limit.to_string();
    let request = self.request(reqwest::Method::GET, "items/top")?.query(&[
      ("tag", self.config.to_process_tag.as_str()),
      ("limit", limit.as_str()),
      ("sort", "dateAdded"),
      ("direction", "asc"),
    ]);
    let items = parse_items(&self.json(request).await?);
    info!("Found {} Zotero items tagged {}", items.len(), self.config.to_process_tag);
    Ok(items)
  }

  async fn stage(&self, item: &QueueItem, dir: &Path) -> Result<PathBuf> {
    let children =
      self.json(self.request(reqwest::Method::GET, &format!("items/{}/children", item.key))?).await?;
    let Some((attachment, file_name)) = pdf_attachment(&children) else {
      return Err(FolioError::Queue("No PDF attachments found".into()));
    };

    let response =
      self.request(reqwest::Method::GET, &format!("items/{attachment}/file"))?.send().await?;
    if !response.status().is_success() {
      return Err(FolioError::Queue(format!("Failed to download PDF: {}", response.status())));
    }
    let bytes = response.bytes().await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, &bytes).await?;
    debug!("Staged {} ({} bytes) for item {}", path.display(), bytes.len(), item.key);
    Ok(path)
  }

  async fn mark_processed(&self, item: &QueueItem) -> Result<()> {
    self.retag(item, &self.config.processed_tag).await
  }

  async fn mark_failed(&self, item: &QueueItem, reason: &str) -> Result<()> {
    self.retag(item, &self.config.error_tag).await?;
    if !reason.is_empty() {
      if let Err(e) = self.add_error_note(item, reason).await {
        warn!("Could not add error note to {}: {e}", item.key);
      }
    }
    warn!("Marked Zotero item {} as failed: {reason}", item.key);
    Ok(())
  }
}

/// Items of a Zotero `items` response. Entries without a key are dropped.
fn parse_items(response: &Value) -> Vec<QueueItem> {
  let Some(entries) = response.as_array() else {
    return Vec::new();
  };
  entries
    .iter()
    .filter_map(|entry| {
      let key = entry.get("key")?.as_str()?.to_string();
      let data = entry.get("data");
      Some(QueueItem {
        key,
        title: data
          .and_then(|d| d.get("title"))
          .and_then(Value::as_str)
          .unwrap_or_default()
          .to_string(),
        tags: data
          .and_then(|d| d.get("tags"))
          .and_then(Value::as_array)
          .map(|tags| {
            tags.iter().filter_map(|t| t.get("tag").and_then(Value::as_str)).map(String::from).collect()
          })
          .unwrap_or_default(),
        version: entry.get("version").and_then(Value::as_u64).unwrap_or_default(),
      })
    })
    .collect()
}

/// Key and file name of the first stored PDF attachment among `children`.
fn pdf_attachment(children: &Value) -> Option<(String, String)> {
  children.as_array()?.iter().find_map(|child| {
    let data = child.get("data")?;
    let is_pdf = data.get("contentType").and_then(Value::as_str) == Some("application/pdf");
    let stored = matches!(
      data.get("linkMode").and_then(Value::as_str),
      Some("imported_file" | "imported_url")
    );
    if !(is_pdf && stored) {
      return None;
    }
    let key = child.get("key")?.as_str()?.to_string();
    let mut file_name = data
      .get("filename")
      .and_then(Value::as_str)
      .map(|name| name.replace(['/', '\\'], "_"))
      .unwrap_or_else(|| format!("{key}.pdf"));
    if !file_name.to_lowercase().ends_with(".pdf") {
      file_name.push_str(".pdf");
    }
    Some((key, file_name))
  })
}

/// `tags` without `remove`, with `add` appended once.
fn retagged(tags: &[String], remove: &str, add: &str) -> Vec<String> {
  let mut updated: Vec<String> = tags.iter().filter(|t| t.as_str() != remove).cloned().collect();
  if !updated.iter().any(|t| t == add) {
    updated.push(add.to_string());
  }
  updated
}

fn escape_html(text: &str) -> String {
  text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_requires_credentials() {
    assert!(matches!(ZoteroQueue::new(&ZoteroConfig::default()), Err(FolioError::Config(_))));

    let config =
      ZoteroConfig { user_id: "42".into(), api_key: "secret".into(), ..Default::default() };
    let queue = ZoteroQueue::new(&config).unwrap();
    assert_eq!(queue.base.as_str(), "https://api.zotero.org/users/42/");
  }

  #[test]
  fn test_parse_items() {
    let response = json!([
      {
        "key": "ABCD1234",
        "version": 17,
        "data": { "title": "Gappy POD", "tags": [{ "tag": "/to_process" }, { "tag": "#scientific" }] }
      },
      { "version": 3, "data": {} }
    ]);
    let items = parse_items(&response);
    assert_eq!(items, vec![QueueItem {
      key:     "ABCD1234".into(),
      title:   "Gappy POD".into(),
      tags:    vec!["/to_process".into(), "#scientific".into()],
      version: 17,
    }]);
    assert!(parse_items(&json!({ "message": "forbidden" })).is_empty());
  }

  #[test]
  fn test_pdf_attachment_selection() {
    let children = json!([
      { "key": "NOTE1", "data": { "itemType": "note" } },
      { "key": "LINK1", "data": { "contentType": "application/pdf", "linkMode": "linked_url" } },
      { "key": "FILE1", "data": {
        "contentType": "application/pdf", "linkMode": "imported_file", "filename": "dir/paper"
      } }
    ]);
    assert_eq!(pdf_attachment(&children), Some(("FILE1".into(), "dir_paper.pdf".into())));
    assert_eq!(pdf_attachment(&json!([])), None);
  }

  #[test]
  fn test_retagged() {
    let tags = vec!["/to_process".to_string(), "keep".to_string()];
    assert_eq!(retagged(&tags, "/to_process", "/processed"), vec!["keep", "/processed"]);
    let tags = vec!["/error".to_string()];
    assert_eq!(retagged(&tags, "/to_process", "/error"), vec!["/error"]);
    assert_eq!(escape_html("a<b & c>"), "a&lt;b &amp; c&gt;");
  }
}
