//! Formula lookup by token and by regular expression.

use super::*;

/// Results returned when no limit is given.
pub const DEFAULT_LIMIT: usize = 10;

/// Columns read for every result row, in [`FormulaRecord`] order.
const RECORD_COLUMNS: &str = "f.hash, f.doc_id, f.type, f.latex, f.source";

/// A formula query.
///
/// A symbol narrows the candidates through the token index first; a pattern then filters the
/// candidates (or the whole catalog without a symbol). Results are returned in catalog order.
///
/// # Examples
///
/// ```no_run
/// use folio::{formula::{FormulaIndex, Search}, prelude::*};
///
/// # fn example() -> Result<(), FolioError> {
/// let mut index = FormulaIndex::open_existing("metadata/formula_index.sqlite")?;
/// let sums = Search::by_symbol(r"\sum").matching(r"_\{i=1\}").limit(5).execute(&mut index)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Search<'a> {
  symbol:  Option<&'a str>,
  pattern: Option<&'a str>,
  limit:   usize,
}

impl<'a> Search<'a> {
  /// Formulas containing `token`.
  pub fn by_symbol(token: &'a str) -> Self {
    Self { symbol: Some(token), pattern: None, limit: DEFAULT_LIMIT }
  }

  /// Formulas whose LaTeX matches `pattern`.
  pub fn by_pattern(pattern: &'a str) -> Self {
    Self { symbol: None, pattern: Some(pattern), limit: DEFAULT_LIMIT }
  }

  /// Builds a query from optional parts. Without either part every formula matches.
  pub fn new(symbol: Option<&'a str>, pattern: Option<&'a str>) -> Self {
    Self { symbol, pattern, limit: DEFAULT_LIMIT }
  }

  /// Additionally filters by `pattern`.
  pub fn matching(mut self, pattern: &'a str) -> Self {
    self.pattern = Some(pattern);
    self
  }

  /// Caps the number of results.
  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = limit;
    self
  }

  /// Runs the query against the index at `path`.
  ///
  /// A missing or unreadable index is not an error: the result is empty and carries a
  /// diagnostic. An invalid pattern is still reported as [`FolioError::InvalidPattern`].
  pub fn run_at(&self, path: impl AsRef<Path>) -> Result<SearchResults> {
    let path = path.as_ref();
    if let Some(pattern) = self.pattern {
      Regex::new(pattern)?;
    }
    let outcome =
      FormulaIndex::open_existing(path).and_then(|mut index| self.execute(&mut index));
    match outcome {
      Ok(records) => Ok(SearchResults { records, diagnostic: None }),
      Err(e @ (FolioError::IndexMissing(_) | FolioError::Sqlite(_))) => {
        warn!("Formula search unavailable: {e}");
        Ok(SearchResults { records: Vec::new(), diagnostic: Some(e.to_string()) })
      },
      Err(e) => Err(e),
    }
  }

  fn candidates(&self, index: &FormulaIndex) -> Result<Vec<FormulaRecord>> {
    let records = match self.symbol {
      Some(symbol) => {
        let mut stmt = index.conn.prepare_cached(&format!(
          "SELECT {RECORD_COLUMNS} FROM tokens t JOIN formulas f ON f.id = t.formula_id
           WHERE t.token = ?1 GROUP BY f.id ORDER BY f.id"
        ))?;
        let rows = stmt.query_map([symbol], row_to_record)?;
        rows.collect::<core::result::Result<Vec<_>, _>>()?
      },
      None => {
        let mut stmt =
          index.conn.prepare_cached(&format!("SELECT {RECORD_COLUMNS} FROM formulas f ORDER BY f.id"))?;
        let rows = stmt.query_map([], row_to_record)?;
        rows.collect::<core::result::Result<Vec<_>, _>>()?
      },
    };
    trace!(candidates = records.len(), symbol = ?self.symbol, "Formula candidates");
    Ok(records)
  }
}

/// Records found by a search plus the reason an empty result was returned early.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
  /// Matching records in catalog order.
  pub records:    Vec<FormulaRecord>,
  /// Set when the index could not be searched.
  pub diagnostic: Option<String>,
}

impl IndexInstruction for Search<'_> {
  type Output = Vec<FormulaRecord>;

  fn execute(&self, index: &mut FormulaIndex) -> Result<Self::Output> {
    let pattern = self.pattern.map(Regex::new).transpose()?;
    let candidates = self.candidates(index)?;

    let results: Vec<FormulaRecord> = candidates
      .into_iter()
      .filter(|record| pattern.as_ref().map_or(true, |re| re.is_match(&record.latex)))
      .take(self.limit)
      .collect();
    debug!(
      "Formula search symbol={:?} pattern={:?} returned {} results",
      self.symbol,
      self.pattern,
      results.len()
    );
    Ok(results)
  }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FormulaRecord> {
  Ok(FormulaRecord {
    hash:   row.get(0)?,
    doc_id: row.get(1)?,
    kind:   FormulaKind::from_str(&row.get::<_, String>(2)?).map_err(|e| {
      rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?,
    latex:  row.get(3)?,
    source: row.get(4)?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn indexed(dir: &Path) -> PathBuf {
    let text = "$$\\sum_{i=1}^n x_i$$ then $\\alpha + \\beta$ and $\\alpha^2$ and $y = mx + b$";
    let doc = extract_formulas("doc1", Some("doc1.mmd"), text);
    let path = dir.join("index.sqlite");
    let mut index = FormulaIndex::open(&path).unwrap();
    Rebuild::new(&doc.formulas).execute(&mut index).unwrap();
    path
  }

  #[test]
  fn test_by_symbol_in_catalog_order() {
    let dir = tempdir().unwrap();
    let mut index = FormulaIndex::open_existing(indexed(dir.path())).unwrap();

    let results = Search::by_symbol("\\alpha").execute(&mut index).unwrap();
    let latex: Vec<_> = results.iter().map(|r| r.latex.as_str()).collect();
    assert_eq!(latex, vec!["\\alpha + \\beta", "\\alpha^2"]);

    let limited = Search::by_symbol("\\alpha").limit(1).execute(&mut index).unwrap();
    assert_eq!(limited.len(), 1);
    assert!(Search::by_symbol("gamma").execute(&mut index).unwrap().is_empty());
  }

  #[test]
  fn test_by_pattern_scans_catalog() {
    let dir = tempdir().unwrap();
    let mut index = FormulaIndex::open_existing(indexed(dir.path())).unwrap();

    let results = Search::by_pattern(r"\^").execute(&mut index).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].kind, FormulaKind::Block);
  }

  #[test]
  fn test_symbol_narrows_before_pattern() {
    let dir = tempdir().unwrap();
    let mut index = FormulaIndex::open_existing(indexed(dir.path())).unwrap();

    let results = Search::by_symbol("\\alpha").matching(r"\^").execute(&mut index).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].latex, "\\alpha^2");

    let none = Search::by_symbol("gamma").matching(".*").execute(&mut index).unwrap();
    assert!(none.is_empty());
  }

  #[traced_test]
  #[test]
  fn test_missing_index_is_empty_with_diagnostic() {
    let dir = tempdir().unwrap();
    let results = Search::by_symbol("x").run_at(dir.path().join("absent.sqlite")).unwrap();

    assert!(results.records.is_empty());
    assert!(results.diagnostic.unwrap().contains("not found"));
    assert!(logs_contain("Formula search unavailable"));
  }

  #[test]
  fn test_invalid_pattern_is_an_error() {
    let dir = tempdir().unwrap();
    let path = indexed(dir.path());
    assert!(matches!(
      Search::by_pattern("(unclosed").run_at(path),
      Err(FolioError::InvalidPattern(_))
    ));
  }
}
