use folio::formula::{read_catalog, FormulaCatalog, FormulaIndex, FormulaKind, Rebuild, Search};

use super::*;

#[traced_test]
#[test]
fn test_catalog_index_and_search() -> TestResult<()> {
  let (config, _dir) = workspace();
  std::fs::create_dir_all(&config.formulas.markdown_dir)?;
  std::fs::write(
    config.formulas.markdown_dir.join("doc1.mmd"),
    "The unit circle $$x^2+y^2=1$$ is written inline as $x^2+y^2=1$ too.",
  )?;

  let summary = FormulaCatalog::new(&config.formulas).build()?;
  assert_eq!(summary.total_formulas, 2);

  let records = read_catalog(&config.formulas.catalog_file)?;
  assert_eq!(records.len(), 2);
  assert_eq!(records[0].kind, FormulaKind::Block);
  assert_eq!(records[1].kind, FormulaKind::Inline);
  assert_eq!(records[0].hash, records[1].hash);
  assert!(records.iter().all(|r| r.doc_id == "doc1"));

  let mut index = FormulaIndex::open(&config.formulas.index_db)?;
  Rebuild::new(&records).execute(&mut index)?;
  drop(index);

  let hits = Search::by_symbol("y").run_at(&config.formulas.index_db)?;
  assert_eq!(hits.records, records);
  let inline = Search::new(Some("x"), Some(r"^x\^2")).limit(1).run_at(&config.formulas.index_db)?;
  assert_eq!(inline.records.len(), 1);
  Ok(())
}
