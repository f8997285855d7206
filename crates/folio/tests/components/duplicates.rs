use folio::{
  config::DuplicatesConfig,
  duplicates::{name_similarity, DuplicateScanner},
};

use super::*;

#[test]
fn test_identical_prefixes_grouped() {
  let dir = tempdir().unwrap();
  let prefix = vec![7u8; 1024];
  let scanner = DuplicateScanner::new(&DuplicatesConfig { name_threshold: 90, prefix_bytes: 1024 });

  let mut tail_a = prefix.clone();
  tail_a.extend(b"first tail");
  let mut tail_b = prefix.clone();
  tail_b.extend(b"a completely different tail");
  std::fs::write(dir.path().join("alpha.pdf"), &tail_a).unwrap();
  std::fs::write(dir.path().join("omega.pdf"), &tail_b).unwrap();
  std::fs::write(dir.path().join("other.pdf"), b"unrelated").unwrap();

  let report = scanner.scan(&[dir.path().to_path_buf()]).unwrap();
  assert_eq!(report.total_files, 3);
  assert_eq!(report.exact_groups.len(), 1);
  let names = report.exact_groups.values().next().unwrap();
  assert_eq!(names, &vec!["alpha.pdf".to_string(), "omega.pdf".to_string()]);
}

#[test]
fn test_file_never_paired_with_itself() {
  let dir = tempdir().unwrap();
  let nested = dir.path().join("nested");
  std::fs::create_dir_all(&nested).unwrap();
  std::fs::write(dir.path().join("paper.pdf"), b"one").unwrap();
  std::fs::write(nested.join("paper.pdf"), b"two").unwrap();

  let report = DuplicateScanner::default().scan(&[dir.path().to_path_buf()]).unwrap();
  assert!(report.near_name_pairs.iter().all(|(_, a, b)| a != b));
  assert!(report.exact_groups.is_empty());
}

#[test]
fn test_name_similarity() {
  assert_eq!(name_similarity("duplicates.pdf", "duplicates_copy.pdf"), 100);
  assert_eq!(name_similarity("Smith 2020 Gappy POD.pdf", "gappy_pod_smith_2020.pdf"), 100);
  assert!(name_similarity("flow_reconstruction.pdf", "uncertainty_quantification.pdf") < 60);
  assert_eq!(name_similarity("___.pdf", "paper.pdf"), 0);
}

#[test]
fn test_report_written_as_tsv() {
  let dir = tempdir().unwrap();
  std::fs::write(dir.path().join("a.pdf"), b"same").unwrap();
  std::fs::write(dir.path().join("b.pdf"), b"same").unwrap();

  let report = DuplicateScanner::default().scan(&[dir.path().to_path_buf()]).unwrap();
  let output = dir.path().join("reports/duplicates.tsv");
  report.write_tsv(&output).unwrap();

  let content = std::fs::read_to_string(output).unwrap();
  let lines: Vec<&str> = content.lines().collect();
  assert_eq!(lines[0], "kind\tkey\tname_a\tname_b");
  assert_eq!(lines.iter().filter(|l| l.starts_with("exact\t")).count(), 2);
}
