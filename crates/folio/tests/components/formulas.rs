use folio::{
  config::FormulasConfig,
  formula::{
    extract_formulas, formula_hash, read_catalog, FormulaCatalog, FormulaIndex, FormulaKind, Rebuild,
    Search, Stats,
  },
};

use super::*;

fn formulas_config(root: &Path) -> FormulasConfig {
  FormulasConfig {
    markdown_dir: root.join("md"),
    text_dir:     root.join("txt"),
    catalog_file: root.join("metadata/formulas.jsonl"),
    index_db:     root.join("metadata/formula_index.sqlite"),
  }
}

fn write_markdown(root: &Path) {
  let md = root.join("md");
  std::fs::create_dir_all(&md).unwrap();
  std::fs::write(
    md.join("doc1.mmd"),
    "# Gappy POD\n\nThe energy $E = \\alpha^2$ is minimal.\n\n$$\n\\sum_{i} a_i \\phi_i\n$$\n\nAgain $E  =  \\alpha^2$.\n",
  )
  .unwrap();
  std::fs::write(md.join("doc2.md"), "Inline $x+y$ and a price of 5 dollars.\n").unwrap();
  std::fs::write(md.join("notes.txt"), "$ignored$").unwrap();
}

#[test]
fn test_repeated_formula_single_row() {
  let doc = extract_formulas("doc1", None, "First $a+b$, then $a + b$ and $$a+b$$.");
  assert_eq!(doc.formulas.len(), 3);
  assert_eq!(doc.formulas[0].kind, FormulaKind::Block);
  assert_eq!(doc.formulas[1].latex, "a+b");
  assert_eq!(doc.formulas[2].latex, "a + b");

  let doc = extract_formulas("doc1", None, "First $a+b$, then $a+b$ again.");
  assert_eq!(doc.formulas.len(), 1);
  let placeholder = format!("FORMULA_{}", formula_hash("a+b"));
  assert_eq!(doc.text.matches(&placeholder).count(), 2);
}

#[test]
fn test_block_and_inline_share_hash() {
  let doc = extract_formulas("doc1", None, "$$x^2+y^2=1$$ and $x^2+y^2=1$");
  assert_eq!(doc.formulas.len(), 2);
  assert_ne!(doc.formulas[0].kind, doc.formulas[1].kind);
  assert_eq!(doc.formulas[0].hash, doc.formulas[1].hash);
  assert_eq!(doc.formulas[0].hash.len(), 12);
}

#[traced_test]
#[test]
fn test_catalog_is_idempotent() {
  let dir = tempdir().unwrap();
  write_markdown(dir.path());
  let catalog = FormulaCatalog::new(&formulas_config(dir.path()));

  let first = catalog.build().unwrap();
  let first_log = std::fs::read_to_string(catalog.catalog_file()).unwrap();
  let second = catalog.build().unwrap();
  let second_log = std::fs::read_to_string(catalog.catalog_file()).unwrap();

  assert_eq!(first, second);
  assert_eq!(first_log, second_log);
  assert_eq!(first.files, 2);
  assert_eq!(first.total_formulas, 3);

  let records = read_catalog(catalog.catalog_file()).unwrap();
  assert_eq!(records.iter().map(|r| r.doc_id.as_str()).collect::<Vec<_>>(), vec![
    "doc1", "doc1", "doc2"
  ]);
  assert_eq!(records[0].source.as_deref(), Some("doc1.mmd"));

  let text = std::fs::read_to_string(dir.path().join("txt/doc1.txt")).unwrap();
  assert!(!text.contains('$'));
  assert!(text.contains("FORMULA_"));
}

#[traced_test]
#[test]
fn test_index_search() {
  let dir = tempdir().unwrap();
  write_markdown(dir.path());
  let config = formulas_config(dir.path());
  FormulaCatalog::new(&config).build().unwrap();
  let records = read_catalog(&config.catalog_file).unwrap();

  let mut index = FormulaIndex::open(&config.index_db).unwrap();
  let summary = Rebuild::new(&records).execute(&mut index).unwrap();
  assert_eq!(summary.indexed, 3);
  let stats = Stats.execute(&mut index).unwrap();
  assert_eq!(stats.total_formulas, 3);
  assert_eq!(stats.documents, 2);
  drop(index);

  let alpha = Search::by_symbol(r"\alpha").run_at(&config.index_db).unwrap();
  assert_eq!(alpha.records.len(), 1);
  assert_eq!(alpha.records[0].latex, r"E = \alpha^2");

  let sums = Search::by_pattern(r"\\sum").run_at(&config.index_db).unwrap();
  assert_eq!(sums.records.len(), 1);
  assert_eq!(sums.records[0].kind, FormulaKind::Block);

  let combined = Search::new(Some("E"), Some(r"\^3")).run_at(&config.index_db).unwrap();
  assert!(combined.records.is_empty());
  assert!(combined.diagnostic.is_none());

  let unknown = Search::new(Some("zeta"), Some(".")).run_at(&config.index_db).unwrap();
  assert!(unknown.records.is_empty());

  let limited = Search::new(None, None).limit(2).run_at(&config.index_db).unwrap();
  assert_eq!(limited.records.len(), 2);
}

#[traced_test]
#[test]
fn test_search_without_index() {
  let dir = tempdir().unwrap();
  let missing = dir.path().join("missing.sqlite");

  let results = Search::by_symbol("x").run_at(&missing).unwrap();
  assert!(results.records.is_empty());
  assert!(results.diagnostic.unwrap().contains("not found"));

  let err = Search::by_pattern("(unclosed").run_at(&missing).unwrap_err();
  assert!(matches!(err, FolioError::InvalidPattern(_)));
}
