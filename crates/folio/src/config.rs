//! Pipeline configuration.
//!
//! A [`Config`] is assembled in three layers:
//! 1. Built-in defaults
//! 2. A TOML file, found through [`Config::resolve_path`]
//! 3. Environment overrides, see [`Config::apply_env`]
//!
//! Every section is `#[serde(default)]`, so a file only needs to name the values it changes and
//! everything else keeps its default. Relative paths are interpreted against the working
//! directory of the process; [`Config::rooted_at`] rebases them onto another directory.
//!
//! # Examples
//!
//! ```
//! use folio::config::Config;
//!
//! let config: Config = toml::from_str("[chunking]\nbase_size = 800\n").unwrap();
//! assert_eq!(config.chunking.base_size, 800);
//! assert_eq!(config.chunking.overlap, 200);
//! ```

use super::*;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "PIPELINE_CONFIG_PATH";

/// Name of the configuration file looked up in the working and platform config directories.
pub const CONFIG_FILE_NAME: &str = "folio.toml";

/// Complete configuration for a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Input and output directories.
  pub paths:      PathsConfig,
  /// Batch driver settings.
  pub pipeline:   PipelineConfig,
  /// Chunker settings.
  pub chunking:   ChunkingConfig,
  /// Formula catalog locations.
  pub formulas:   FormulasConfig,
  /// Duplicate scanner settings.
  pub duplicates: DuplicatesConfig,
  /// Extraction engine settings.
  pub engines:    EnginesConfig,
  /// Zotero queue credentials and tags.
  pub zotero:     ZoteroConfig,
}

/// Directory layout of a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
  /// Directories scanned recursively for source PDFs.
  pub raw:      Vec<PathBuf>,
  /// Extracted plain text, one `<stem>.txt` per document.
  pub text:     PathBuf,
  /// Chunk records, one `<stem>.chunks.jsonl` per document.
  pub chunks:   PathBuf,
  /// Per-document metadata and the catalog, duplicate and relevance reports.
  pub metadata: PathBuf,
  /// Log files.
  pub logs:     PathBuf,
}

impl Default for PathsConfig {
  fn default() -> Self {
    Self {
      raw:      vec![PathBuf::from("raw")],
      text:     PathBuf::from("txt"),
      chunks:   PathBuf::from("processed/chunks"),
      metadata: PathBuf::from("metadata"),
      logs:     PathBuf::from("logs"),
    }
  }
}

/// Settings of the batch driver and the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Requested worker count, clamped to `1..=4` and to the CPU count.
  pub max_workers:         usize,
  /// Wall-clock budget of a single engine invocation.
  pub engine_timeout_secs: u64,
  /// Re-extract documents whose text output already exists.
  pub overwrite:           bool,
  /// Minimum trimmed text-layer length for routing to the text layer.
  pub min_text_chars:      usize,
  /// Queue tags that route a document to formula-aware engines.
  pub scientific_tags:     Vec<String>,
  /// Keywords counted by the relevance report.
  pub relevance_keywords:  Vec<String>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      max_workers:         2,
      engine_timeout_secs: 900,
      overwrite:           false,
      min_text_chars:      100,
      scientific_tags:     [
        "#scientific",
        "#math_heavy",
        "#journal_article",
        "#formulas",
        "#equations",
        "#latex",
        "#research_paper",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
      relevance_keywords:  ["reconstruction", "super-resolution", "gappy", "POD", "uncertainty"]
        .into_iter()
        .map(String::from)
        .collect(),
    }
  }
}

impl PipelineConfig {
  /// Number of workers actually spawned for a batch.
  pub fn effective_workers(&self) -> usize {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    self.max_workers.clamp(1, 4).min(cpus).max(1)
  }

  /// Engine timeout as a [`Duration`].
  pub fn engine_timeout(&self) -> Duration { Duration::from_secs(self.engine_timeout_secs) }
}

/// Chunker settings, see [`crate::chunk::Chunker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
  /// Window size for documents below `large_doc_threshold`.
  pub base_size:           usize,
  /// Characters shared between adjacent chunks.
  pub overlap:             usize,
  /// Upper bound of the adaptive window size.
  pub max_size:            usize,
  /// Document length from which the window size scales up.
  pub large_doc_threshold: usize,
  /// Desired chunk count for large documents.
  pub target_count:        usize,
  /// Minimum offset of a split point from the window start.
  pub min_size:            usize,
}

impl Default for ChunkingConfig {
  fn default() -> Self {
    Self {
      base_size:           1200,
      overlap:             200,
      max_size:            2400,
      large_doc_threshold: 60_000,
      target_count:        256,
      min_size:            400,
    }
  }
}

/// Locations used by the formula catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulasConfig {
  /// Markdown produced by the scientific OCR engine.
  pub markdown_dir: PathBuf,
  /// Placeholder-substituted text, one `<stem>.txt` per markdown file.
  pub text_dir:     PathBuf,
  /// JSONL catalog log.
  pub catalog_file: PathBuf,
  /// SQLite token index.
  pub index_db:     PathBuf,
}

impl Default for FormulasConfig {
  fn default() -> Self {
    Self {
      markdown_dir: PathBuf::from("processed/nougat_md"),
      text_dir:     PathBuf::from("processed/nougat_txt"),
      catalog_file: PathBuf::from("metadata/formulas.jsonl"),
      index_db:     PathBuf::from("metadata/formula_index.sqlite"),
    }
  }
}

/// Duplicate scanner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatesConfig {
  /// Minimum name similarity (0..=100) of a near-name pair.
  pub name_threshold: u8,
  /// Number of leading bytes digested per file.
  pub prefix_bytes:   usize,
}

impl Default for DuplicatesConfig {
  fn default() -> Self { Self { name_threshold: 90, prefix_bytes: 200_000 } }
}

/// Settings of the individual extraction engines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
  /// In-process text layer extraction.
  pub text_layer:     TextLayerConfig,
  /// `pdftoppm` + `tesseract`.
  pub raster_ocr:     RasterOcrConfig,
  /// `nougat` command line tool.
  pub scientific_ocr: ScientificOcrConfig,
  /// Mathpix PDF API.
  pub cloud_math:     CloudMathConfig,
}

/// Text layer engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLayerConfig {
  /// Register the engine.
  pub enabled: bool,
}

impl Default for TextLayerConfig {
  fn default() -> Self { Self { enabled: true } }
}

/// Raster OCR engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOcrConfig {
  /// Register the engine.
  pub enabled:   bool,
  /// Rasterizer executable.
  pub pdftoppm:  String,
  /// OCR executable.
  pub tesseract: String,
  /// Tesseract language list.
  pub languages: String,
  /// Rasterization resolution.
  pub dpi:       u32,
}

impl Default for RasterOcrConfig {
  fn default() -> Self {
    Self {
      enabled:   true,
      pdftoppm:  "pdftoppm".into(),
      tesseract: "tesseract".into(),
      languages: "deu+eng".into(),
      dpi:       300,
    }
  }
}

/// Scientific OCR engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScientificOcrConfig {
  /// Register the engine.
  pub enabled:    bool,
  /// Executable, overridden by `NOUGAT_CLI`.
  pub cli:        String,
  /// Optional model checkpoint passed as `--model`.
  pub model:      Option<String>,
  /// Optional page range passed as `--pages`, e.g. `1-4`.
  pub pages:      Option<String>,
  /// Directory receiving the `.mmd` output.
  pub output_dir: PathBuf,
}

impl Default for ScientificOcrConfig {
  fn default() -> Self {
    Self {
      enabled:    true,
      cli:        "nougat".into(),
      model:      None,
      pages:      None,
      output_dir: PathBuf::from("processed/nougat_md"),
    }
  }
}

/// Mathpix credentials and polling behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudMathConfig {
  /// Register the engine. It is only available with both credentials set.
  pub enabled:            bool,
  /// Mathpix application id.
  pub app_id:             String,
  /// Mathpix application key.
  pub app_key:            String,
  /// API base URL.
  pub api_url:            String,
  /// Delay between status polls.
  pub poll_interval_secs: u64,
}

impl Default for CloudMathConfig {
  fn default() -> Self {
    Self {
      enabled:            true,
      app_id:             String::new(),
      app_key:            String::new(),
      api_url:            "https://api.mathpix.com/v3/".into(),
      poll_interval_secs: 5,
    }
  }
}

/// Zotero Web API settings for the document queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoteroConfig {
  /// Numeric user id.
  pub user_id:        String,
  /// API key with write access.
  pub api_key:        String,
  /// API base URL.
  pub api_url:        String,
  /// Tag of items waiting to be processed.
  pub to_process_tag: String,
  /// Tag set after a successful run.
  pub processed_tag:  String,
  /// Tag set after a failed run.
  pub error_tag:      String,
  /// Items fetched per queue run.
  pub batch_size:     usize,
}

impl Default for ZoteroConfig {
  fn default() -> Self {
    Self {
      user_id:        String::new(),
      api_key:        String::new(),
      api_url:        "https://api.zotero.org/".into(),
      to_process_tag: "/to_process".into(),
      processed_tag:  "/processed".into(),
      error_tag:      "/error".into(),
      batch_size:     10,
    }
  }
}

impl Config {
  /// Loads the configuration from the first file found by [`Config::resolve_path`] and applies
  /// the process environment on top.
  pub fn load(explicit: Option<&Path>) -> Result<Self> {
    let mut config = match Self::resolve_path(explicit) {
      Some(path) => Self::from_file(&path)?,
      None => {
        debug!("No configuration file found, using defaults");
        Self::default()
      },
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
  }

  /// Reads a TOML configuration file without applying environment overrides.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    debug!("Loading configuration from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
  }

  /// Writes this configuration as pretty TOML, creating parent directories.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(self)?)?;
    Ok(())
  }

  /// Returns the configuration file to load, in order of precedence:
  /// the explicit path, `PIPELINE_CONFIG_PATH`, `./folio.toml`, then
  /// [`Config::default_path`]. Only the explicit and environment paths are returned
  /// without checking that they exist.
  pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
      return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
      return Some(PathBuf::from(path));
    }
    [Some(PathBuf::from(CONFIG_FILE_NAME)), Self::default_path()]
      .into_iter()
      .flatten()
      .find(|candidate| candidate.is_file())
  }

  /// Returns the platform configuration file location.
  ///
  /// - On Unix: `~/.config/folio/folio.toml`
  /// - On macOS: `~/Library/Application Support/folio/folio.toml`
  /// - On Windows: `%APPDATA%\folio\folio.toml`
  pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("folio").join(CONFIG_FILE_NAME))
  }

  /// Applies environment overrides through `lookup`. Empty values are ignored, and numeric
  /// values that fail to parse are logged and ignored.
  pub fn apply_env<F>(&mut self, lookup: F)
  where F: Fn(&str) -> Option<String> {
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(raw_dirs) = get("RAW_DIRS") {
      self.paths.raw = std::env::split_paths(&raw_dirs)
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    }
    if let Some(value) = get("MATHPIX_APP_ID") {
      self.engines.cloud_math.app_id = value;
    }
    if let Some(value) = get("MATHPIX_APP_KEY") {
      self.engines.cloud_math.app_key = value;
    }
    if let Some(value) = get("ZOTERO_USER_ID") {
      self.zotero.user_id = value;
    }
    if let Some(value) = get("ZOTERO_API_KEY") {
      self.zotero.api_key = value;
    }
    if let Some(value) = get("NOUGAT_CLI") {
      self.engines.scientific_ocr.cli = value;
    }
    if let Some(value) = get("DUPLICATE_NAME_THRESHOLD") {
      match value.trim().parse::<u8>() {
        Ok(threshold) => self.duplicates.name_threshold = threshold.min(100),
        Err(e) => warn!("Ignoring DUPLICATE_NAME_THRESHOLD={value}: {e}"),
      }
    }
    if let Some(value) = get("PIPELINE_MAX_WORKERS") {
      match value.trim().parse::<usize>() {
        Ok(workers) => self.pipeline.max_workers = workers,
        Err(e) => warn!("Ignoring PIPELINE_MAX_WORKERS={value}: {e}"),
      }
    }
  }

  /// Rebases every relative path onto `root`.
  pub fn rooted_at(mut self, root: impl AsRef<Path>) -> Self {
    let root = root.as_ref();
    let rebase = |path: &mut PathBuf| {
      if path.is_relative() {
        *path = root.join(&*path);
      }
    };
    self.paths.raw.iter_mut().for_each(&rebase);
    rebase(&mut self.paths.text);
    rebase(&mut self.paths.chunks);
    rebase(&mut self.paths.metadata);
    rebase(&mut self.paths.logs);
    rebase(&mut self.formulas.markdown_dir);
    rebase(&mut self.formulas.text_dir);
    rebase(&mut self.formulas.catalog_file);
    rebase(&mut self.formulas.index_db);
    rebase(&mut self.engines.scientific_ocr.output_dir);
    self
  }
}
