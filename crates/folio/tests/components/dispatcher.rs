use std::time::Duration;

use folio::dispatcher::NO_ENGINE_REASON;

use super::*;

fn scanned_pdf(dir: &Path) -> PathBuf {
  let path = dir.join("scan.pdf");
  std::fs::write(&path, b"%PDF-1.5\nnot really a pdf").unwrap();
  path
}

#[traced_test]
#[tokio::test]
async fn test_all_engines_unavailable() {
  let dir = tempdir().unwrap();
  let dispatcher = Dispatcher::builder()
    .with_engines(ProcessingEngine::ALL.map(|kind| Scripted::unavailable(kind) as Arc<dyn Engine>))
    .build()
    .await;

  let route = dispatcher.analyze(scanned_pdf(dir.path()), &RoutingHints::default()).await;
  assert_eq!(route.confidence, 0.0);
  assert_eq!(route.reason, NO_ENGINE_REASON);
  assert!(matches!(dispatcher.ensure_any_available(), Err(FolioError::NoEngineAvailable)));
}

#[traced_test]
#[tokio::test]
async fn test_scientific_tags_prefer_scientific_ocr() {
  let dir = tempdir().unwrap();
  let pdf = scanned_pdf(dir.path());
  let dispatcher = Dispatcher::builder()
    .with_engine(Scripted::ok(ProcessingEngine::RasterOcr, "ocr"))
    .with_engine(Scripted::ok(ProcessingEngine::ScientificOcr, "$x$"))
    .with_engine(Scripted::ok(ProcessingEngine::CloudMath, "$y$"))
    .scientific_tags(["math", "physics"])
    .build()
    .await;

  let route = dispatcher.analyze(&pdf, &RoutingHints::with_tags(["physics", "math", "misc"])).await;
  assert_eq!(route.engine, ProcessingEngine::ScientificOcr);
  assert_eq!(route.confidence, 0.85);
  assert_eq!(route.reason, "Scientific document with tags: math, physics");

  let route = dispatcher.analyze(&pdf, &RoutingHints::with_tags(["misc"])).await;
  assert_eq!((route.engine, route.confidence), (ProcessingEngine::RasterOcr, 0.70));
}

#[traced_test]
#[tokio::test]
async fn test_cloud_math_when_scientific_ocr_missing() {
  let dir = tempdir().unwrap();
  let dispatcher = Dispatcher::builder()
    .with_engine(Scripted::unavailable(ProcessingEngine::ScientificOcr))
    .with_engine(Scripted::ok(ProcessingEngine::CloudMath, "$y$"))
    .scientific_tags(["math"])
    .build()
    .await;

  let route =
    dispatcher.analyze(scanned_pdf(dir.path()), &RoutingHints::with_tags(["math"])).await;
  assert_eq!((route.engine, route.confidence), (ProcessingEngine::CloudMath, 0.80));

  let route = dispatcher.analyze(scanned_pdf(dir.path()), &RoutingHints::default()).await;
  assert_eq!((route.engine, route.confidence), (ProcessingEngine::CloudMath, 0.50));
  assert_eq!(route.reason, "Fallback to cloud_math (other engines unavailable)");
}

#[traced_test]
#[tokio::test]
async fn test_execute_reports_failures() {
  let dir = tempdir().unwrap();
  let pdf = scanned_pdf(dir.path());
  let failing = Scripted::failing(ProcessingEngine::RasterOcr, "tesseract crashed");
  let dispatcher = Dispatcher::builder().with_engine(failing.clone()).build().await;

  let route = RouteDecision::new(ProcessingEngine::RasterOcr, 0.7, "test");
  let result = dispatcher.execute(&pdf, &route).await;
  assert!(!result.success);
  assert_eq!(result.engine_used, ProcessingEngine::RasterOcr);
  assert!(result.error_message.unwrap().contains("tesseract crashed"));
  assert_eq!(failing.call_count(), 1);

  let route = RouteDecision::new(ProcessingEngine::CloudMath, 0.8, "test");
  let result = dispatcher.execute(&pdf, &route).await;
  assert!(!result.success);
  assert!(result.error_message.unwrap().contains("not registered"));
}

struct Sleeper;

#[async_trait]
impl Engine for Sleeper {
  fn kind(&self) -> ProcessingEngine { ProcessingEngine::RasterOcr }

  async fn probe(&self) -> bool { true }

  async fn extract(&self, _path: &Path) -> folio::error::Result<Extraction> {
    tokio::time::sleep(Duration::from_secs(30)).await;
    Ok(Extraction::new("too late"))
  }
}

#[traced_test]
#[tokio::test]
async fn test_execute_times_out() {
  let dir = tempdir().unwrap();
  let dispatcher = Dispatcher::builder()
    .with_engine(Arc::new(Sleeper))
    .timeout(Duration::from_millis(50))
    .build()
    .await;

  let route = RouteDecision::new(ProcessingEngine::RasterOcr, 0.7, "test");
  let result = dispatcher.execute(scanned_pdf(dir.path()), &route).await;
  assert!(!result.success);
  assert!(result.error_message.unwrap().contains("Timed out"));
  assert!(result.duration_seconds < 5.0);
}

#[traced_test]
#[tokio::test]
async fn test_queue_marks_items() {
  let dispatcher =
    Dispatcher::builder().with_engine(Scripted::ok(ProcessingEngine::RasterOcr, "text")).build().await;
  let mut queue = MemoryQueue::with_items(&["A1", "B2", "C3"]);
  queue.broken.push("B2".into());

  let outcomes = dispatcher.run_queue(&queue, 10).await.unwrap();
  assert_eq!(outcomes.len(), 3);
  assert!(outcomes[0].succeeded());
  assert!(!outcomes[1].succeeded());
  assert!(outcomes[2].succeeded());

  assert_eq!(*queue.processed.lock().unwrap(), vec!["A1".to_string(), "C3".to_string()]);
  let failed = queue.failed.lock().unwrap();
  assert_eq!(failed.len(), 1);
  assert!(failed["B2"].contains("No PDF attachment"));
}

#[traced_test]
#[tokio::test]
async fn test_queue_respects_limit_and_empty_text() {
  let dispatcher =
    Dispatcher::builder().with_engine(Scripted::ok(ProcessingEngine::RasterOcr, "  ")).build().await;
  let queue = MemoryQueue::with_items(&["A1", "B2", "C3"]);

  let outcomes = dispatcher.run_queue(&queue, 2).await.unwrap();
  assert_eq!(outcomes.len(), 2);
  assert!(outcomes.iter().all(|o| !o.succeeded()));
  assert!(queue.processed.lock().unwrap().is_empty());
  assert_eq!(queue.failed.lock().unwrap().len(), 2);
}
