//! Formula cataloguing for markdown emitted by scientific OCR.
//!
//! The catalog works in three stages:
//!
//! 1. [`catalog`]: find `$$…$$` block and `$…$` inline formulas in a markdown file, normalize them,
//!    replace every occurrence with a `FORMULA_<hash>` placeholder and collect one
//!    [`FormulaRecord`] per distinct `(hash, kind)` in the document.
//! 2. [`index`]: load the JSONL catalog into SQLite with a reverse token index.
//! 3. [`search`]: look formulas up by token, by regular expression, or both.
//!
//! Hashes are the first 12 hex characters of the SHA-256 digest of the normalized body, so the
//! same formula always maps to the same placeholder across documents and runs.

use sha2::{Digest, Sha256};

use super::*;

pub mod catalog;
pub mod index;
pub mod search;

pub use self::{catalog::*, index::*, search::*};

/// Number of hex characters kept from the formula digest.
pub const HASH_LEN: usize = 12;

/// Whether a formula was written as a display block or inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormulaKind {
  /// `$$…$$`
  Block,
  /// `$…$`
  Inline,
}

impl Display for FormulaKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Block => write!(f, "block"),
      Self::Inline => write!(f, "inline"),
    }
  }
}

impl FromStr for FormulaKind {
  type Err = FolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "block" => Ok(Self::Block),
      "inline" => Ok(Self::Inline),
      other => Err(FolioError::Config(format!("Unknown formula kind: {other}"))),
    }
  }
}

/// One catalog row, serialized as one JSONL line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaRecord {
  /// Stem of the markdown file the formula came from.
  pub doc_id: String,
  /// Digest of the normalized body.
  pub hash:   String,
  /// Block or inline.
  #[serde(rename = "type")]
  pub kind:   FormulaKind,
  /// Normalized LaTeX body.
  pub latex:  String,
  /// Name of the markdown file.
  pub source: Option<String>,
}

/// Collapses whitespace runs to single spaces and trims.
pub fn normalize_latex(latex: &str) -> String { latex.split_whitespace().collect::<Vec<_>>().join(" ") }

/// Digest of a normalized formula body.
pub fn formula_hash(normalized: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(normalized.as_bytes());
  let mut hash = format!("{:x}", hasher.finalize());
  hash.truncate(HASH_LEN);
  hash
}

/// Placeholder written into the text in place of a formula.
pub fn placeholder(hash: &str) -> String { format!(" FORMULA_{hash} ") }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_normalize_collapses_whitespace() {
    assert_eq!(normalize_latex("  a \n+\t b  "), "a + b");
    assert_eq!(normalize_latex("x^2"), "x^2");
  }

  #[test]
  fn test_hash_is_stable_and_short() {
    let hash = formula_hash("x^2+y^2=1");
    assert_eq!(hash.len(), HASH_LEN);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(hash, formula_hash("x^2+y^2=1"));
    assert_ne!(hash, formula_hash("x^2+y^2=2"));
  }

  #[test]
  fn test_record_serializes_with_type_key() {
    let record = FormulaRecord {
      doc_id: "doc1".into(),
      hash:   "abcdef012345".into(),
      kind:   FormulaKind::Inline,
      latex:  "a+b".into(),
      source: Some("doc1.mmd".into()),
    };
    let line = serde_json::to_string(&record).unwrap();
    assert_eq!(
      line,
      r#"{"doc_id":"doc1","hash":"abcdef012345","type":"inline","latex":"a+b","source":"doc1.mmd"}"#
    );
    assert_eq!(serde_json::from_str::<FormulaRecord>(&line).unwrap(), record);
  }

  #[test]
  fn test_kind_from_str() {
    assert_eq!(FormulaKind::from_str("block").unwrap(), FormulaKind::Block);
    assert!(FormulaKind::from_str("display").is_err());
  }
}
