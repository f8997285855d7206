use tokio::process::Command;

use super::*;

/// Rasterizes every page with `pdftoppm` and recognizes it with `tesseract`.
#[derive(Debug, Clone)]
pub struct RasterOcrEngine {
  config: RasterOcrConfig,
}

impl RasterOcrEngine {
  /// Creates the engine from its configuration section.
  pub fn new(config: RasterOcrConfig) -> Self { Self { config } }

  async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    run_command(
      self.kind(),
      Command::new(&self.config.pdftoppm)
        .arg("-r")
        .arg(self.config.dpi.to_string())
        .arg("-png")
        .arg(pdf)
        .arg(out_dir.join("page")),
    )
    .await?;

    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(out_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().is_some_and(|ext| ext == "png") {
        pages.push(path);
      }
    }
    // pdftoppm zero-pads page numbers to a common width
    pages.sort();
    Ok(pages)
  }

  async fn recognize(&self, image: &Path) -> Result<String> {
    let output = run_command(
      self.kind(),
      Command::new(&self.config.tesseract).arg(image).arg("stdout").arg("-l").arg(&self.config.languages),
    )
    .await?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}

#[async_trait]
impl Engine for RasterOcrEngine {
  fn kind(&self) -> ProcessingEngine { ProcessingEngine::RasterOcr }

  async fn probe(&self) -> bool {
    probe_command(&self.config.pdftoppm, &["-v"]).await
      && probe_command(&self.config.tesseract, &["--version"]).await
  }

  async fn extract(&self, path: &Path) -> Result<Extraction> {
    let scratch = tempfile::tempdir()?;
    let pages = self.rasterize(path, scratch.path()).await?;
    if pages.is_empty() {
      return Err(FolioError::EngineFailed {
        engine:  self.kind().to_string(),
        message: "pdftoppm produced no page images".into(),
      });
    }

    let mut texts = Vec::with_capacity(pages.len());
    for (i, page) in pages.iter().enumerate() {
      trace!("OCR page {} of {}", i + 1, pages.len());
      texts.push(self.recognize(page).await?);
    }

    Ok(
      Extraction::new(texts.iter().map(|t| t.trim_end()).collect::<Vec<_>>().join("\n\n"))
        .with("method", "ocr")
        .with("pages", pages.len())
        .with("languages", self.config.languages.clone())
        .with("dpi", self.config.dpi),
    )
  }
}
