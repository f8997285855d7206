//! SQLite storage for the formula catalog and its reverse token index.
//!
//! The index holds two tables: `formulas`, one row per catalog record in catalog order, and
//! `tokens`, mapping every distinct token of a formula to its row. Operations on the index are
//! expressed as [`IndexInstruction`]s and executed against a [`FormulaIndex`] handle:
//!
//! ```no_run
//! use folio::{
//!   formula::{read_catalog, FormulaIndex, Rebuild, Stats},
//!   prelude::*,
//! };
//!
//! # fn example() -> Result<(), FolioError> {
//! let records = read_catalog("metadata/formulas.jsonl")?;
//! let mut index = FormulaIndex::open("metadata/formula_index.sqlite")?;
//! let summary = Rebuild::new(&records).execute(&mut index)?;
//! let stats = Stats.execute(&mut index)?;
//! assert_eq!(summary.indexed, stats.total_formulas);
//! # Ok(())
//! # }
//! ```
//!
//! A rebuild runs in a single transaction behind `&mut`, so readers never observe a partially
//! written index.

use rusqlite::{params, Connection, OpenFlags};

use super::*;

lazy_static! {
  /// Alphabetic runs, backslash commands and single structural symbols.
  static ref LATEX_TOKEN: Regex = Regex::new(r"[A-Za-z]+|\\[A-Za-z]+|[=+\-*/^_{}]").unwrap();
}

/// An operation against a [`FormulaIndex`].
pub trait IndexInstruction {
  /// Value produced by the operation.
  type Output;

  /// Runs the operation.
  fn execute(&self, index: &mut FormulaIndex) -> Result<Self::Output>;
}

/// Handle to the formula index database.
pub struct FormulaIndex {
  pub(super) conn: Connection,
  path:            PathBuf,
}

impl FormulaIndex {
  /// Opens or creates the index database, creating parent directories. The schema is created
  /// by [`Rebuild`].
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    Ok(Self { conn, path: path.to_path_buf() })
  }

  /// Opens an index that must already exist.
  ///
  /// # Errors
  ///
  /// Returns [`FolioError::IndexMissing`] if there is no database at `path`.
  pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if !path.is_file() {
      return Err(FolioError::IndexMissing(path.display().to_string()));
    }
    let conn = Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(Self { conn, path: path.to_path_buf() })
  }

  /// Location of the database file.
  pub fn path(&self) -> &Path { &self.path }
}

/// Splits a LaTeX body into index tokens, in order of appearance.
///
/// ```
/// use folio::formula::tokenize_latex;
///
/// assert_eq!(tokenize_latex(r"\alpha^2 = x_{i}"), vec![
///   r"\alpha", "^", "=", "x", "_", "{", "i", "}"
/// ]);
/// ```
pub fn tokenize_latex(latex: &str) -> Vec<&str> {
  LATEX_TOKEN.find_iter(latex).map(|m| m.as_str()).collect()
}

/// Replaces the index content with a set of catalog records.
#[derive(Debug)]
pub struct Rebuild<'a> {
  records: &'a [FormulaRecord],
}

impl<'a> Rebuild<'a> {
  /// Creates a rebuild from records in catalog order.
  pub fn new(records: &'a [FormulaRecord]) -> Self { Self { records } }
}

/// Outcome of a [`Rebuild`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
  /// Records handed to the rebuild.
  pub total:          usize,
  /// Records stored.
  pub indexed:        usize,
  /// Token rows stored.
  pub token_mappings: usize,
  /// Location of the database file.
  pub db_path:        PathBuf,
}

impl IndexInstruction for Rebuild<'_> {
  type Output = IndexSummary;

  fn execute(&self, index: &mut FormulaIndex) -> Result<Self::Output> {
    let mut summary = IndexSummary {
      total: self.records.len(),
      db_path: index.path.clone(),
      ..Default::default()
    };

    let tx = index.conn.transaction()?;
    tx.execute_batch(include_str!(concat!(
      env!("CARGO_MANIFEST_DIR"),
      "/migrations/formula_index.sql"
    )))?;
    {
      let mut insert_formula = tx.prepare_cached(
        "INSERT INTO formulas (hash, doc_id, type, latex, source) VALUES (?1, ?2, ?3, ?4, ?5)",
      )?;
      let mut insert_token =
        tx.prepare_cached("INSERT INTO tokens (token, formula_id) VALUES (?1, ?2)")?;

      for record in self.records {
        insert_formula.execute(params![
          record.hash,
          record.doc_id,
          record.kind.to_string(),
          record.latex,
          record.source,
        ])?;
        let formula_id = tx.last_insert_rowid();

        let tokens: BTreeSet<&str> = tokenize_latex(&record.latex).into_iter().collect();
        for token in &tokens {
          insert_token.execute(params![token, formula_id])?;
        }
        summary.token_mappings += tokens.len();
        summary.indexed += 1;
      }
    }
    tx.commit()?;

    info!(
      "Built formula index at {} with {} formulas and {} token mappings",
      summary.db_path.display(),
      summary.indexed,
      summary.token_mappings
    );
    Ok(summary)
  }
}

/// Aggregate counts of the index content.
#[derive(Debug, Clone, Copy)]
pub struct Stats;

/// Output of [`Stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
  /// Rows in `formulas`.
  pub total_formulas:       usize,
  /// Distinct `doc_id`s.
  pub documents:            usize,
  /// Distinct tokens.
  pub unique_tokens:        usize,
  /// Rows in `tokens`.
  pub total_token_mappings: usize,
}

impl IndexInstruction for Stats {
  type Output = IndexStats;

  fn execute(&self, index: &mut FormulaIndex) -> Result<Self::Output> {
    let count = |sql: &str| -> Result<usize> {
      let value: i64 = index.conn.query_row(sql, [], |row| row.get(0))?;
      Ok(usize::try_from(value).unwrap_or_default())
    };
    Ok(IndexStats {
      total_formulas:       count("SELECT COUNT(*) FROM formulas")?,
      documents:            count("SELECT COUNT(DISTINCT doc_id) FROM formulas")?,
      unique_tokens:        count("SELECT COUNT(DISTINCT token) FROM tokens")?,
      total_token_mappings: count("SELECT COUNT(*) FROM tokens")?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record(doc_id: &str, kind: FormulaKind, latex: &str) -> FormulaRecord {
    FormulaRecord {
      doc_id: doc_id.into(),
      hash: formula_hash(latex),
      kind,
      latex: latex.into(),
      source: None,
    }
  }

  #[test]
  fn test_tokenizer_grammar() {
    assert_eq!(tokenize_latex("a+b"), vec!["a", "+", "b"]);
    assert_eq!(tokenize_latex(r"\frac{1}{2}"), vec![r"\frac", "{", "}", "{", "}"]);
    assert_eq!(tokenize_latex("x < y"), vec!["x", "y"]);
    assert!(tokenize_latex("123").is_empty());
  }

  #[traced_test]
  #[test]
  fn test_rebuild_and_stats() {
    let dir = tempdir().unwrap();
    let mut index = FormulaIndex::open(dir.path().join("nested/index.sqlite")).unwrap();
    let records = vec![
      record("d1", FormulaKind::Block, "x^2+x=1"),
      record("d1", FormulaKind::Inline, "x^2+x=1"),
      record("d2", FormulaKind::Inline, r"\alpha"),
    ];

    let summary = Rebuild::new(&records).execute(&mut index).unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.indexed, 3);
    // {x, ^, +, =} twice plus {\alpha}
    assert_eq!(summary.token_mappings, 9);

    let stats = Stats.execute(&mut index).unwrap();
    assert_eq!(stats, IndexStats {
      total_formulas:       3,
      documents:            2,
      unique_tokens:        5,
      total_token_mappings: 9,
    });
    assert!(logs_contain("Built formula index"));
  }

  #[test]
  fn test_rebuild_replaces_previous_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.sqlite");
    let mut index = FormulaIndex::open(&path).unwrap();

    Rebuild::new(&[record("d1", FormulaKind::Block, "a"), record("d1", FormulaKind::Block, "b")])
      .execute(&mut index)
      .unwrap();
    Rebuild::new(&[record("d2", FormulaKind::Inline, "c")]).execute(&mut index).unwrap();

    let stats = Stats.execute(&mut index).unwrap();
    assert_eq!(stats.total_formulas, 1);
    assert_eq!(stats.documents, 1);
  }

  #[test]
  fn test_schema_indexes_both_token_columns() {
    let dir = tempdir().unwrap();
    let mut index = FormulaIndex::open(dir.path().join("index.sqlite")).unwrap();
    Rebuild::new(&[record("d1", FormulaKind::Inline, "a")]).execute(&mut index).unwrap();

    let mut stmt = index
      .conn
      .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'tokens'")
      .unwrap();
    let names: Vec<String> =
      stmt.query_map([], |row| row.get(0)).unwrap().collect::<rusqlite::Result<_>>().unwrap();
    assert!(names.contains(&"idx_tokens_token".to_string()));
    assert!(names.contains(&"idx_tokens_formula_id".to_string()));
  }

  #[test]
  fn test_open_existing_requires_file() {
    let dir = tempdir().unwrap();
    let result = FormulaIndex::open_existing(dir.path().join("missing.sqlite"));
    assert!(matches!(result, Err(FolioError::IndexMissing(_))));
  }
}
