use super::*;
use crate::pdf::PdfAnalyzer;

/// Reads the embedded text layer with [`PdfAnalyzer`] on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLayerEngine {
  analyzer: PdfAnalyzer,
}

impl TextLayerEngine {
  /// Creates the engine.
  pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl Engine for TextLayerEngine {
  fn kind(&self) -> ProcessingEngine { ProcessingEngine::TextLayer }

  async fn probe(&self) -> bool { true }

  async fn extract(&self, path: &Path) -> Result<Extraction> {
    let analyzer = self.analyzer;
    let owned = path.to_path_buf();
    let content = tokio::task::spawn_blocking(move || analyzer.analyze(owned)).await??;

    Ok(
      Extraction::new(content.text())
        .with("method", "text_layer")
        .with("page_count", content.metadata.page_count)
        .with("pages_with_text", content.pages.len()),
    )
  }
}
