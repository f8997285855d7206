use reqwest::{multipart, Client};
use serde_json::Value;
use url::Url;

use super::*;

/// Converts PDFs with the Mathpix v3 PDF API.
///
/// The document is uploaded once, its conversion status is polled every
/// `poll_interval_secs`, and the finished Mathpix Markdown is downloaded. The dispatcher's
/// timeout bounds the whole exchange.
#[derive(Debug, Clone)]
pub struct CloudMathEngine {
  config: CloudMathConfig,
  client: Client,
}

impl CloudMathEngine {
  /// Creates the engine from its configuration section.
  pub fn new(config: CloudMathConfig) -> Self { Self { config, client: Client::new() } }

  /// Resolves `path` below the configured API base, with or without its trailing slash.
  fn endpoint(&self, path: &str) -> Result<Url> {
    let base = self.config.api_url.trim_end_matches('/');
    Ok(Url::parse(&format!("{base}/"))?.join(path)?)
  }

  fn failure(&self, message: impl Into<String>) -> FolioError {
    FolioError::EngineFailed { engine: self.kind().to_string(), message: message.into() }
  }

  fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    request.header("app_id", &self.config.app_id).header("app_key", &self.config.app_key)
  }

  async fn upload(&self, path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let file_name =
      path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "document.pdf".into());
    let part = multipart::Part::bytes(bytes).file_name(file_name).mime_str("application/pdf")?;
    let form = multipart::Form::new().part("file", part);

    let response =
      self.authorized(self.client.post(self.endpoint("pdf")?)).multipart(form).send().await?;
    if !response.status().is_success() {
      return Err(self.failure(format!("upload rejected: {}", response.status())));
    }
    let body: Value = response.json().await?;
    match body.get("pdf_id").and_then(Value::as_str) {
      Some(id) => Ok(id.to_string()),
      None => Err(self.failure(format!("upload response without pdf_id: {body}"))),
    }
  }

  async fn wait_for(&self, pdf_id: &str) -> Result<Value> {
    let status_url = self.endpoint(&format!("pdf/{pdf_id}"))?;
    loop {
      let status: Value =
        self.authorized(self.client.get(status_url.clone())).send().await?.json().await?;
      match status.get("status").and_then(Value::as_str) {
        Some("completed") => return Ok(status),
        Some("error") => {
          let reason = status.get("error").map(Value::to_string).unwrap_or_else(|| status.to_string());
          return Err(self.failure(format!("conversion failed: {reason}")));
        },
        other => trace!("Mathpix {pdf_id} status {other:?}"),
      }
      tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs.max(1))).await;
    }
  }
}

#[async_trait]
impl Engine for CloudMathEngine {
  fn kind(&self) -> ProcessingEngine { ProcessingEngine::CloudMath }

  async fn probe(&self) -> bool {
    !self.config.app_id.trim().is_empty() && !self.config.app_key.trim().is_empty()
  }

  async fn extract(&self, path: &Path) -> Result<Extraction> {
    if !self.probe().await {
      return Err(self.failure("MATHPIX_APP_ID and MATHPIX_APP_KEY are not set"));
    }
    let pdf_id = self.upload(path).await?;
    debug!("Uploaded {} as Mathpix document {pdf_id}", path.display());
    let status = self.wait_for(&pdf_id).await?;

    let response =
      self.authorized(self.client.get(self.endpoint(&format!("pdf/{pdf_id}.mmd"))?)).send().await?;
    if !response.status().is_success() {
      return Err(self.failure(format!("result download failed: {}", response.status())));
    }
    let markdown = response.text().await?;

    let mut extraction =
      Extraction::new(markdown).with("method", "cloud_math").with("pdf_id", pdf_id);
    if let Some(pages) = status.get("num_pages").cloned() {
      extraction = extraction.with("pages", pages);
    }
    Ok(extraction)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_requires_both_credentials() {
    let engine = CloudMathEngine::new(CloudMathConfig { app_id: "id".into(), ..Default::default() });
    assert!(!engine.probe().await);

    let dir = tempdir().unwrap();
    let result = engine.extract(&dir.path().join("paper.pdf")).await;
    assert!(matches!(result, Err(FolioError::EngineFailed { .. })));

    let engine = CloudMathEngine::new(CloudMathConfig {
      app_id: "id".into(),
      app_key: "key".into(),
      ..Default::default()
    });
    assert!(engine.probe().await);
  }

  #[test]
  fn test_endpoints_join_base_url() {
    let engine = CloudMathEngine::new(CloudMathConfig::default());
    assert_eq!(engine.endpoint("pdf/abc.mmd").unwrap().as_str(), "https://api.mathpix.com/v3/pdf/abc.mmd");
  }

  #[test]
  fn test_endpoints_keep_base_without_trailing_slash() {
    let engine = CloudMathEngine::new(CloudMathConfig {
      api_url: "https://api.mathpix.com/v3".into(),
      ..Default::default()
    });
    assert_eq!(engine.endpoint("pdf").unwrap().as_str(), "https://api.mathpix.com/v3/pdf");
    assert_eq!(engine.endpoint("pdf/abc").unwrap().as_str(), "https://api.mathpix.com/v3/pdf/abc");
  }
}
