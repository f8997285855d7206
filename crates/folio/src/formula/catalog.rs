//! Formula extraction from markdown and persistence of the catalog log.

use super::*;

lazy_static! {
  /// Display formulas, may span lines.
  static ref BLOCK_FORMULA: Regex = Regex::new(r"(?s)\$\$(.+?)\$\$").unwrap();
  /// Inline formulas on a single line.
  static ref INLINE_FORMULA: Regex = Regex::new(r"\$([^$\n]+?)\$").unwrap();
}

/// Markdown file extensions picked up from the markdown directory.
const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "mmd"];

/// Result of extracting formulas from a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
  /// Text with every formula replaced by its placeholder.
  pub text:     String,
  /// One record per distinct `(hash, kind)`, in order of first occurrence.
  pub formulas: Vec<FormulaRecord>,
}

/// Extracts block formulas, then inline formulas from `text`.
///
/// Inline matching runs on the text in which block formulas were already replaced, so a block
/// body is never seen twice.
///
/// # Examples
///
/// ```
/// use folio::formula::{extract_formulas, FormulaKind};
///
/// let doc = extract_formulas("doc1", None, "See $$x^2+y^2=1$$ and $x^2+y^2=1$.");
/// assert_eq!(doc.formulas.len(), 2);
/// assert_eq!(doc.formulas[0].kind, FormulaKind::Block);
/// assert_eq!(doc.formulas[0].hash, doc.formulas[1].hash);
/// assert!(!doc.text.contains('$'));
/// ```
pub fn extract_formulas(doc_id: &str, source: Option<&str>, text: &str) -> ExtractedDocument {
  let mut seen: HashSet<(String, FormulaKind)> = HashSet::new();
  let mut formulas = Vec::new();

  let mut record = |body: &str, kind: FormulaKind| -> Option<String> {
    let latex = normalize_latex(body);
    if latex.is_empty() {
      return None;
    }
    let hash = formula_hash(&latex);
    if seen.insert((hash.clone(), kind)) {
      formulas.push(FormulaRecord {
        doc_id: doc_id.to_string(),
        hash: hash.clone(),
        kind,
        latex,
        source: source.map(String::from),
      });
    }
    Some(placeholder(&hash))
  };

  let blocked = BLOCK_FORMULA
    .replace_all(text, |caps: &regex::Captures| {
      record(&caps[1], FormulaKind::Block).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned();

  // A match touching another `$` is rejected and the scan resumes right after its opening
  // `$`, so its closing `$` can still open the next inline formula.
  let bytes = blocked.as_bytes();
  let mut replaced = String::with_capacity(blocked.len());
  let mut copied = 0;
  let mut pos = 0;
  while let Some(m) = INLINE_FORMULA.find_at(&blocked, pos) {
    let (start, end) = (m.start(), m.end());
    let adjacent = (start > 0 && bytes[start - 1] == b'$') || bytes.get(end) == Some(&b'$');
    if adjacent {
      pos = start + 1;
      continue;
    }
    if let Some(placeholder) = record(&blocked[start + 1..end - 1], FormulaKind::Inline) {
      replaced.push_str(&blocked[copied..start]);
      replaced.push_str(&placeholder);
      copied = end;
    }
    pos = end;
  }
  replaced.push_str(&blocked[copied..]);

  ExtractedDocument { text: replaced, formulas }
}

/// Outcome of a catalog run over a markdown directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
  /// Markdown files found.
  pub files:          usize,
  /// Files processed without error.
  pub processed:      usize,
  /// Catalog rows written.
  pub total_formulas: usize,
  /// Location of the catalog log.
  pub catalog_file:   PathBuf,
  /// Per-file failures as `(path, message)`.
  pub errors:         Vec<(PathBuf, String)>,
}

/// Builds the formula catalog from a directory of markdown files.
#[derive(Debug, Clone)]
pub struct FormulaCatalog {
  markdown_dir: PathBuf,
  text_dir:     PathBuf,
  catalog_file: PathBuf,
}

impl FormulaCatalog {
  /// Creates a catalog over the configured locations.
  pub fn new(config: &FormulasConfig) -> Self {
    Self {
      markdown_dir: config.markdown_dir.clone(),
      text_dir:     config.text_dir.clone(),
      catalog_file: config.catalog_file.clone(),
    }
  }

  /// Location of the JSONL catalog log.
  pub fn catalog_file(&self) -> &Path { &self.catalog_file }

  /// Markdown files in the markdown directory, sorted by path.
  pub fn markdown_files(&self) -> Result<Vec<PathBuf>> {
    if !self.markdown_dir.is_dir() {
      warn!("Markdown directory {} does not exist", self.markdown_dir.display());
      return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(&self.markdown_dir)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| {
        path.is_file()
          && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MARKDOWN_EXTENSIONS.contains(&ext))
      })
      .collect();
    files.sort();
    Ok(files)
  }

  /// Extracts every markdown file, writes `<text_dir>/<stem>.txt` for each and rewrites the
  /// catalog log. A file that cannot be read or written is logged and skipped.
  pub fn build(&self) -> Result<CatalogSummary> {
    let files = self.markdown_files()?;
    std::fs::create_dir_all(&self.text_dir)?;
    if let Some(parent) = self.catalog_file.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }

    let mut summary = CatalogSummary {
      files: files.len(),
      catalog_file: self.catalog_file.clone(),
      ..Default::default()
    };
    let mut log = String::new();

    for path in files {
      match self.process_file(&path) {
        Ok(formulas) => {
          summary.processed += 1;
          summary.total_formulas += formulas.len();
          for formula in &formulas {
            log.push_str(&serde_json::to_string(formula)?);
            log.push('\n');
          }
        },
        Err(e) => {
          error!("Failed to extract formulas from {}: {e}", path.display());
          summary.errors.push((path, e.to_string()));
        },
      }
    }

    std::fs::write(&self.catalog_file, log)?;
    info!(
      "Extracted {} formulas from {} files into {}",
      summary.total_formulas,
      summary.processed,
      self.catalog_file.display()
    );
    Ok(summary)
  }

  fn process_file(&self, path: &Path) -> Result<Vec<FormulaRecord>> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let doc_id = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let source = path.file_name().map(|s| s.to_string_lossy().into_owned());

    let extracted = extract_formulas(&doc_id, source.as_deref(), &text);
    std::fs::write(self.text_dir.join(format!("{doc_id}.txt")), &extracted.text)?;
    debug!("{}: {} formulas", path.display(), extracted.formulas.len());
    Ok(extracted.formulas)
  }
}

/// Reads a catalog log. Malformed lines are logged and skipped.
pub fn read_catalog(path: impl AsRef<Path>) -> Result<Vec<FormulaRecord>> {
  let path = path.as_ref();
  let content = std::fs::read_to_string(path)?;
  let mut records = Vec::new();
  for (line_no, line) in content.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    match serde_json::from_str::<FormulaRecord>(line) {
      Ok(record) => records.push(record),
      Err(e) => warn!("Skipping line {} of {}: {e}", line_no + 1, path.display()),
    }
  }
  Ok(records)
}
