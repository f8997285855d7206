use folio::duplicates::DuplicateScanner;

use super::*;

#[traced_test]
#[test]
fn test_copy_is_exact_and_near_duplicate() -> TestResult<()> {
  let (config, _dir) = workspace();
  let raw = &config.paths.raw[0];
  let mut content = vec![0u8; 300 * 1024];
  content.extend(b"original tail");
  std::fs::write(raw.join("duplicates.pdf"), &content)?;
  content.truncate(300 * 1024);
  content.extend(b"copy tail differs after the prefix");
  std::fs::write(raw.join("duplicates_copy.pdf"), &content)?;
  std::fs::write(raw.join("unrelated.pdf"), b"%PDF-1.5 something else")?;

  let report = DuplicateScanner::new(&config.duplicates).scan(&config.paths.raw)?;
  assert_eq!(report.total_files, 3);
  assert_eq!(report.exact_groups.len(), 1);
  assert_eq!(report.exact_groups.values().next().unwrap(), &vec![
    "duplicates.pdf".to_string(),
    "duplicates_copy.pdf".to_string()
  ]);

  let pair = report
    .near_name_pairs
    .iter()
    .find(|(_, a, b)| a == "duplicates.pdf" && b == "duplicates_copy.pdf")
    .expect("near-name pair");
  assert!(pair.0 >= 90);
  Ok(())
}
