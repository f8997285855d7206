//! Exact and near-name duplicate detection over the raw corpus.
//!
//! Two independent signals are reported side by side and never merged:
//!
//! - **Exact groups**: files whose first `prefix_bytes` bytes have the same SHA-256 digest.
//! - **Near-name pairs**: file names whose token-set similarity reaches the threshold. File
//!   names are compared without their extension, lowercased, and split into alphanumeric
//!   tokens, so `Smith_2020_paper.pdf` and `paper smith 2020.pdf` score 100.
//!
//! ```
//! use folio::duplicates::name_similarity;
//!
//! assert_eq!(name_similarity("duplicates.pdf", "duplicates_copy.pdf"), 100);
//! assert!(name_similarity("alpha.pdf", "omega.pdf") < 90);
//! ```

use std::io::Read;

use sha2::{Digest, Sha256};

use super::*;

/// Duplicate findings for a set of files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
  /// Number of files scanned.
  pub total_files:     usize,
  /// Digest to file names, only for digests shared by two or more files.
  pub exact_groups:    BTreeMap<String, Vec<String>>,
  /// `(score, name_a, name_b)` with `name_a < name_b`, sorted by score descending.
  pub near_name_pairs: Vec<(u8, String, String)>,
}

impl DuplicateReport {
  /// Writes the report as tab separated text with one section per signal.
  ///
  /// Names containing a tab, quote or line break are quoted.
  pub fn write_tsv(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(["kind", "key", "name_a", "name_b"])?;
    for (digest, names) in &self.exact_groups {
      for name in names {
        writer.write_record(["exact", digest.as_str(), name.as_str(), ""])?;
      }
    }
    for (score, a, b) in &self.near_name_pairs {
      writer.write_record(["name", score.to_string().as_str(), a.as_str(), b.as_str()])?;
    }
    writer.flush()?;
    Ok(())
  }
}

/// Scans files for exact and near-name duplicates.
#[derive(Debug, Clone)]
pub struct DuplicateScanner {
  prefix_bytes:   usize,
  name_threshold: u8,
}

impl Default for DuplicateScanner {
  fn default() -> Self { Self::new(&DuplicatesConfig::default()) }
}

impl DuplicateScanner {
  /// Creates a scanner from its configuration section.
  pub fn new(config: &DuplicatesConfig) -> Self {
    Self { prefix_bytes: config.prefix_bytes, name_threshold: config.name_threshold.min(100) }
  }

  /// Scans every PDF below `roots`.
  pub fn scan(&self, roots: &[PathBuf]) -> Result<DuplicateReport> {
    let files = pdf::discover_pdfs(roots)?;
    if files.is_empty() {
      warn!("No PDFs found below {roots:?}");
    }
    Ok(self.scan_files(&files))
  }

  /// Scans an explicit list of files.
  pub fn scan_files(&self, files: &[PathBuf]) -> DuplicateReport {
    let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
    let report = DuplicateReport {
      total_files:     files.len(),
      exact_groups:    self.exact_groups(files),
      near_name_pairs: self.near_name_pairs(&names),
    };
    info!(
      "Scanned {} files: {} exact groups, {} similar name pairs",
      report.total_files,
      report.exact_groups.len(),
      report.near_name_pairs.len()
    );
    report
  }

  /// Digest of the first `prefix_bytes` bytes of `path`.
  pub fn prefix_digest(&self, path: &Path) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(self.prefix_bytes.min(1 << 20));
    std::fs::File::open(path)?.take(self.prefix_bytes as u64).read_to_end(&mut buffer)?;
    let mut hasher = Sha256::new();
    hasher.update(&buffer);
    Ok(format!("{:x}", hasher.finalize()))
  }

  fn exact_groups(&self, files: &[PathBuf]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in files {
      match self.prefix_digest(path) {
        Ok(digest) => groups.entry(digest).or_default().push(file_name(path)),
        Err(e) => warn!("Cannot read {}: {e}", path.display()),
      }
    }
    groups.retain(|_, names| names.len() >= 2);
    groups
  }

  fn near_name_pairs(&self, names: &[String]) -> Vec<(u8, String, String)> {
    let mut reported: HashSet<(&str, &str)> = HashSet::new();
    let mut pairs = Vec::new();
    for (i, a) in names.iter().enumerate() {
      for b in &names[i + 1..] {
        if a == b {
          continue;
        }
        let score = name_similarity(a, b);
        if score < self.name_threshold {
          continue;
        }
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        if reported.insert((first.as_str(), second.as_str())) {
          pairs.push((score, first.clone(), second.clone()));
        }
      }
    }
    pairs.sort_by(|x, y| y.0.cmp(&x.0).then_with(|| x.1.cmp(&y.1)).then_with(|| x.2.cmp(&y.2)));
    pairs
  }
}

fn file_name(path: &Path) -> String {
  path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Lowercased alphanumeric tokens of a file name without its extension.
fn name_tokens(name: &str) -> BTreeSet<String> {
  let stem = Path::new(name).file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
  stem
    .to_lowercase()
    .split(|c: char| !c.is_alphanumeric())
    .filter(|token| !token.is_empty())
    .map(String::from)
    .collect()
}

/// Token-order-insensitive similarity of two file names on a 0..=100 scale.
///
/// Shared tokens are compared against each side's full token list, and the best of the three
/// comparisons wins. When all tokens of one name appear in the other the score is 100.
pub fn name_similarity(a: &str, b: &str) -> u8 {
  let tokens_a = name_tokens(a);
  let tokens_b = name_tokens(b);
  if tokens_a.is_empty() || tokens_b.is_empty() {
    return 0;
  }

  let join = |set: Vec<&String>| set.into_iter().map(String::as_str).collect::<Vec<_>>().join(" ");
  let intersection = join(tokens_a.intersection(&tokens_b).collect());
  let diff_ab = join(tokens_a.difference(&tokens_b).collect());
  let diff_ba = join(tokens_b.difference(&tokens_a).collect());

  if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
    return 100;
  }

  let combine = |diff: &str| format!("{intersection} {diff}").trim().to_string();
  let combined_ab = combine(&diff_ab);
  let combined_ba = combine(&diff_ba);

  let ratio = |x: &str, y: &str| strsim::normalized_levenshtein(x, y);
  let best = if intersection.is_empty() {
    ratio(&combined_ab, &combined_ba)
  } else {
    ratio(&intersection, &combined_ab)
      .max(ratio(&intersection, &combined_ba))
      .max(ratio(&combined_ab, &combined_ba))
  };
  (best * 100.0).round().clamp(0.0, 100.0) as u8
}
