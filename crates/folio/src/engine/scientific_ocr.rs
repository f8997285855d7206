use tokio::process::Command;

use super::*;

/// Runs the `nougat` command line tool and reads the `<stem>.mmd` it writes.
///
/// The markdown keeps its `$…$` and `$$…$$` formulas and is left in the configured output
/// directory, where the formula catalog picks it up.
#[derive(Debug, Clone)]
pub struct ScientificOcrEngine {
  config: ScientificOcrConfig,
}

impl ScientificOcrEngine {
  /// Creates the engine from its configuration section.
  pub fn new(config: ScientificOcrConfig) -> Self { Self { config } }

  /// Location of the markdown written for `pdf`.
  pub fn output_path(&self, pdf: &Path) -> PathBuf {
    let stem = pdf.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    self.config.output_dir.join(format!("{stem}.mmd"))
  }
}

#[async_trait]
impl Engine for ScientificOcrEngine {
  fn kind(&self) -> ProcessingEngine { ProcessingEngine::ScientificOcr }

  async fn probe(&self) -> bool { probe_command(&self.config.cli, &["--help"]).await }

  async fn extract(&self, path: &Path) -> Result<Extraction> {
    tokio::fs::create_dir_all(&self.config.output_dir).await?;

    let mut command = Command::new(&self.config.cli);
    command.arg(path).arg("--out").arg(&self.config.output_dir);
    if let Some(model) = &self.config.model {
      command.arg("--model").arg(model);
    }
    if let Some(pages) = &self.config.pages {
      command.arg("--pages").arg(pages);
    }
    run_command(self.kind(), &mut command).await?;

    let mmd = self.output_path(path);
    let markdown = tokio::fs::read_to_string(&mmd).await.map_err(|e| FolioError::EngineFailed {
      engine:  self.kind().to_string(),
      message: format!("missing output {}: {e}", mmd.display()),
    })?;

    let mut extraction = Extraction::new(markdown)
      .with("method", "scientific_ocr")
      .with("mmd_path", mmd.display().to_string());
    if let Some(pages) = &self.config.pages {
      extraction = extraction.with("pages", pages.clone());
    }
    if let Some(model) = &self.config.model {
      extraction = extraction.with("model", model.clone());
    }
    Ok(extraction)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_output_path_uses_stem() {
    let engine = ScientificOcrEngine::new(ScientificOcrConfig {
      output_dir: PathBuf::from("out/md"),
      ..Default::default()
    });
    assert_eq!(engine.output_path(Path::new("/in/paper.v2.pdf")), PathBuf::from("out/md/paper.v2.mmd"));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn test_reads_markdown_written_by_cli() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let script = dir.path().join("fake-nougat");
    // Writes "$x^2$" to <out>/<stem>.mmd, mirroring the real tool's layout.
    std::fs::write(
      &script,
      "#!/bin/sh\nif [ \"$1\" = \"--help\" ]; then exit 0; fi\nstem=$(basename \"$1\" .pdf)\nprintf 'Energy $E=mc^2$\\n' > \"$3/$stem.mmd\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let engine = ScientificOcrEngine::new(ScientificOcrConfig {
      cli: script.display().to_string(),
      output_dir: dir.path().join("md"),
      pages: Some("1-2".into()),
      ..Default::default()
    });
    assert!(engine.probe().await);

    let pdf = dir.path().join("paper.pdf");
    std::fs::write(&pdf, b"%PDF").unwrap();
    let extraction = engine.extract(&pdf).await.unwrap();
    assert_eq!(extraction.text.trim(), "Energy $E=mc^2$");
    assert_eq!(extraction.metadata["pages"], "1-2");
    assert!(dir.path().join("md/paper.mmd").is_file());
  }
}
