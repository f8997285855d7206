//! Keyword relevance report over extracted text.

use super::*;

/// Keyword counts for one text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelevanceRow {
  /// File name of the text file.
  pub doc:        String,
  /// Sum of all keyword counts.
  pub total_hits: usize,
  /// Count per keyword, in keyword order.
  pub counts:     Vec<usize>,
}

/// Rows sorted by total hits, plus the keywords they were counted for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelevanceReport {
  /// Keywords in column order.
  pub keywords: Vec<String>,
  /// One row per text file.
  pub rows:     Vec<RelevanceRow>,
}

/// Counts case-insensitive, non-overlapping occurrences of each keyword.
pub fn count_keywords(text: &str, keywords: &[String]) -> Vec<usize> {
  let haystack = text.to_lowercase();
  keywords
    .iter()
    .map(|keyword| {
      let needle = keyword.to_lowercase();
      if needle.is_empty() {
        0
      } else {
        haystack.matches(needle.as_str()).count()
      }
    })
    .collect()
}

impl RelevanceReport {
  /// Counts `keywords` in every `*.txt` file of `text_dir`. Rows are sorted by total hits
  /// descending, then by file name.
  pub fn build(text_dir: impl AsRef<Path>, keywords: &[String]) -> Result<Self> {
    let text_dir = text_dir.as_ref();
    let pattern = format!("{}/*.txt", glob::Pattern::escape(&text_dir.to_string_lossy()));

    let mut rows = Vec::new();
    for path in glob::glob(&pattern)?.flatten() {
      let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
          warn!("Cannot read {}: {e}", path.display());
          continue;
        },
      };
      let counts = count_keywords(&String::from_utf8_lossy(&bytes), keywords);
      rows.push(RelevanceRow {
        doc: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        total_hits: counts.iter().sum(),
        counts,
      });
    }
    rows.sort_by(|a, b| b.total_hits.cmp(&a.total_hits).then_with(|| a.doc.cmp(&b.doc)));
    debug!("Relevance report over {} documents", rows.len());
    Ok(Self { keywords: keywords.to_vec(), rows })
  }

  /// Writes the report as CSV with a `doc,total_hits,<keywords…>` header.
  pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(
      ["doc", "total_hits"].into_iter().chain(self.keywords.iter().map(String::as_str)),
    )?;
    for row in &self.rows {
      writer.write_record(
        [row.doc.clone(), row.total_hits.to_string()]
          .into_iter()
          .chain(row.counts.iter().map(usize::to_string)),
      )?;
    }
    writer.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn keywords(list: &[&str]) -> Vec<String> { list.iter().map(|k| (*k).to_string()).collect() }

  #[test]
  fn test_count_keywords_case_insensitive() {
    let counts = count_keywords("POD modes and pod basis; Gappy data", &keywords(&["pod", "gappy", ""]));
    assert_eq!(counts, vec![2, 1, 0]);
  }

  #[test]
  fn test_report_sorted_and_written() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("low.txt"), "uncertainty").unwrap();
    std::fs::write(dir.path().join("high.txt"), "POD pod reconstruction").unwrap();
    std::fs::write(dir.path().join("ignored.md"), "pod pod pod pod").unwrap();

    let report =
      RelevanceReport::build(dir.path(), &keywords(&["POD", "reconstruction", "uncertainty"]))
        .unwrap();
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[0].doc, "high.txt");
    assert_eq!(report.rows[0].total_hits, 3);
    assert_eq!(report.rows[0].counts, vec![2, 1, 0]);

    let csv = dir.path().join("metadata/relevance_report.csv");
    report.write_csv(&csv).unwrap();
    let content = std::fs::read_to_string(csv).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, vec![
      "doc,total_hits,POD,reconstruction,uncertainty",
      "high.txt,3,2,1,0",
      "low.txt,1,0,0,1",
    ]);
  }
}
