//! Extraction engines.
//!
//! Every engine turns a PDF on disk into text. The set of engines is closed
//! ([`ProcessingEngine`]), while each capability is an [`Engine`] trait object registered with the
//! [`Dispatcher`](crate::dispatcher::Dispatcher) at startup:
//!
//! - [`TextLayerEngine`]: reads the embedded text layer in-process with `lopdf`
//! - [`RasterOcrEngine`]: rasterizes pages with `pdftoppm` and recognizes them with `tesseract`
//! - [`ScientificOcrEngine`]: runs the `nougat` command line tool and reads its markdown output
//! - [`CloudMathEngine`]: uploads the PDF to the Mathpix PDF API and polls for the result
//!
//! Availability is probed explicitly and never fails: an engine whose probe cannot run is
//! simply unavailable. Child processes are spawned with `kill_on_drop`, so dropping an
//! extraction future (for example on timeout) also terminates the process.

use std::process::Output;

use tokio::process::Command;

use super::*;

mod cloud_math;
mod raster_ocr;
mod scientific_ocr;
mod text_layer;

pub use self::{
  cloud_math::CloudMathEngine, raster_ocr::RasterOcrEngine, scientific_ocr::ScientificOcrEngine,
  text_layer::TextLayerEngine,
};

/// Time allowed for a single availability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// The closed set of extraction engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingEngine {
  /// Embedded text layer.
  TextLayer,
  /// Page rasterization plus OCR.
  RasterOcr,
  /// Formula-aware OCR producing markdown.
  ScientificOcr,
  /// Remote formula-aware conversion service.
  CloudMath,
}

impl ProcessingEngine {
  /// Every engine, in routing fallback order.
  pub const ALL: [Self; 4] = [Self::TextLayer, Self::RasterOcr, Self::ScientificOcr, Self::CloudMath];

  /// Textual form used in logs, metadata files and on the command line.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::TextLayer => "text_layer",
      Self::RasterOcr => "raster_ocr",
      Self::ScientificOcr => "scientific_ocr",
      Self::CloudMath => "cloud_math",
    }
  }
}

impl Display for ProcessingEngine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ProcessingEngine {
  type Err = FolioError;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|engine| engine.as_str().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| FolioError::Config(format!("Unknown processing engine: {s}")))
  }
}

/// Text produced by an engine together with engine specific facts about the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
  /// Extracted text, possibly markdown.
  pub text:     String,
  /// Engine specific metadata such as page counts or output paths.
  pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Extraction {
  /// Creates an extraction without metadata.
  pub fn new(text: impl Into<String>) -> Self { Self { text: text.into(), metadata: BTreeMap::new() } }

  /// Adds a metadata entry.
  pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
    self.metadata.insert(key.to_string(), value.into());
    self
  }
}

/// An extraction capability.
///
/// Implementations must be cheap to probe repeatedly and must not panic on malformed input;
/// every failure is returned as an error and turned into a failed
/// [`ProcessingResult`](crate::dispatcher::ProcessingResult) by the dispatcher.
#[async_trait]
pub trait Engine: Send + Sync {
  /// Which engine this is.
  fn kind(&self) -> ProcessingEngine;

  /// Whether the engine can run in this environment.
  async fn probe(&self) -> bool;

  /// Extracts text from the PDF at `path`.
  async fn extract(&self, path: &Path) -> Result<Extraction>;
}

/// Builds the engines enabled in `config`, in [`ProcessingEngine::ALL`] order.
pub fn engines_from_config(config: &Config) -> Vec<Arc<dyn Engine>> {
  let engines = &config.engines;
  let mut registered: Vec<Arc<dyn Engine>> = Vec::new();
  if engines.text_layer.enabled {
    registered.push(Arc::new(TextLayerEngine::new()));
  }
  if engines.raster_ocr.enabled {
    registered.push(Arc::new(RasterOcrEngine::new(engines.raster_ocr.clone())));
  }
  if engines.scientific_ocr.enabled {
    registered.push(Arc::new(ScientificOcrEngine::new(engines.scientific_ocr.clone())));
  }
  if engines.cloud_math.enabled {
    registered.push(Arc::new(CloudMathEngine::new(engines.cloud_math.clone())));
  }
  debug!("Registered engines: {:?}", registered.iter().map(|e| e.kind()).collect::<Vec<_>>());
  registered
}

/// Runs `command` to completion and fails with the tail of its standard error if it exits
/// unsuccessfully.
pub(crate) async fn run_command(engine: ProcessingEngine, command: &mut Command) -> Result<Output> {
  trace!("{engine}: running {command:?}");
  let output = command.kill_on_drop(true).stdin(std::process::Stdio::null()).output().await.map_err(
    |e| FolioError::EngineFailed { engine: engine.to_string(), message: format!("{command:?}: {e}") },
  )?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail: Vec<&str> = stderr.trim().lines().rev().take(5).collect();
    let message = format!(
      "exited with {}: {}",
      output.status,
      tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
    );
    return Err(FolioError::EngineFailed { engine: engine.to_string(), message });
  }
  Ok(output)
}

/// Whether `program args…` can be spawned and exits successfully within [`PROBE_TIMEOUT`].
pub(crate) async fn probe_command(program: &str, args: &[&str]) -> bool {
  let mut command = Command::new(program);
  command
    .args(args)
    .kill_on_drop(true)
    .stdin(std::process::Stdio::null())
    .stdout(std::process::Stdio::null())
    .stderr(std::process::Stdio::null());

  match tokio::time::timeout(PROBE_TIMEOUT, command.status()).await {
    Ok(Ok(status)) => status.success(),
    Ok(Err(e)) => {
      debug!("Probe {program} failed to start: {e}");
      false
    },
    Err(_) => {
      debug!("Probe {program} timed out");
      false
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_engine_text_forms() {
    for engine in ProcessingEngine::ALL {
      assert_eq!(engine.to_string().parse::<ProcessingEngine>().unwrap(), engine);
    }
    assert_eq!(ProcessingEngine::RasterOcr.to_string(), "raster_ocr");
    assert_eq!(
      serde_json::to_string(&ProcessingEngine::ScientificOcr).unwrap(),
      "\"scientific_ocr\""
    );
    assert!("mathpix".parse::<ProcessingEngine>().is_err());
  }

  #[test]
  fn test_engines_from_config_respects_enabled() {
    let mut config = Config::default();
    config.engines.raster_ocr.enabled = false;
    config.engines.cloud_math.enabled = false;

    let kinds: Vec<_> = engines_from_config(&config).iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec![ProcessingEngine::TextLayer, ProcessingEngine::ScientificOcr]);
  }

  #[tokio::test]
  async fn test_probe_missing_program() {
    assert!(!probe_command("folio-definitely-not-installed", &["--version"]).await);
  }

  #[tokio::test]
  async fn test_run_command_reports_failure() {
    let result = run_command(
      ProcessingEngine::RasterOcr,
      Command::new("folio-definitely-not-installed").arg("x"),
    )
    .await;
    assert!(matches!(result, Err(FolioError::EngineFailed { .. })));
  }
}
