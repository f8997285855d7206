use folio::relevance::RelevanceReport;

use super::*;

/// 500 characters of prose, well above the text layer threshold.
fn body() -> String {
  let sentence = "Gappy POD enables reconstruction of flow fields. ";
  let mut text = sentence.repeat(11);
  text.truncate(499);
  text.push('.');
  text
}

#[traced_test]
#[tokio::test]
async fn test_text_layer_document() -> TestResult<()> {
  let dir = tempdir()?;
  let pdf = dir.path().join("paper.pdf");
  write_pdf(&pdf, "Paper", &[&body()]);

  let dispatcher = text_layer_dispatcher().await;
  let route = dispatcher.analyze(&pdf, &RoutingHints::default()).await;
  assert_eq!(route.engine, ProcessingEngine::TextLayer);
  assert_eq!(route.confidence, 0.95);

  let result = dispatcher.execute(&pdf, &route).await;
  assert!(result.success);
  assert_eq!(result.text.trim().chars().count(), 500);

  let chunks = Chunker::default().chunk(&result.text);
  assert_eq!(chunks.len(), 1);
  assert_eq!(chunks[0].text, result.text.trim());
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_batch_extraction() -> TestResult<()> {
  let (config, dir) = workspace();
  let raw = &config.paths.raw[0];
  write_pdf(&raw.join("paper.pdf"), "Gappy POD", &[&body(), "Uncertainty of the reconstruction."]);
  std::fs::create_dir_all(raw.join("nested"))?;
  std::fs::write(raw.join("nested/broken.PDF"), b"%PDF-1.4 truncated")?;

  let dispatcher = Arc::new(text_layer_dispatcher().await);
  let pipeline = Pipeline::new(dispatcher.clone(), &config)?.workers(3);
  let summary = pipeline.run().await?;
  assert_eq!(summary.total, 2);
  assert_eq!(summary.processed, 1);
  assert_eq!(summary.errors.len(), 1);
  assert!(summary.errors[0].pdf.ends_with("nested/broken.PDF"));
  assert_eq!(summary.chunks, 1);

  let text = std::fs::read_to_string(config.paths.text.join("paper.txt"))?;
  assert!(text.contains("Uncertainty of the reconstruction."));
  let chunk_lines = std::fs::read_to_string(config.paths.chunks.join("paper.chunks.jsonl"))?;
  assert_eq!(chunk_lines.lines().count(), 1);

  let metadata: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(config.paths.metadata.join("paper.json"))?)?;
  assert_eq!(metadata["engine"]["name"], "text_layer");
  assert_eq!(metadata["route"]["engine"], "text_layer");
  assert_eq!(metadata["metadata"]["title"], "Gappy POD");
  assert_eq!(metadata["chunks"]["count"], 1);
  assert!(metadata["extracted_at"].is_string());

  let rerun = Pipeline::new(dispatcher, &config)?.run().await?;
  assert_eq!((rerun.processed, rerun.skipped, rerun.errors.len()), (0, 1, 1));

  let keywords = vec!["reconstruction".to_string(), "POD".to_string()];
  let report = RelevanceReport::build(&config.paths.text, &keywords)?;
  assert_eq!(report.rows.len(), 1);
  assert_eq!(report.rows[0].doc, "paper.txt");
  assert_eq!(report.rows[0].counts, vec![11, 11]);

  dir.close()?;
  Ok(())
}
