//! Per-document engine selection and execution.
//!
//! The [`Dispatcher`] owns the registered [`Engine`]s and the availability map probed when it
//! is built. [`Dispatcher::analyze`] picks an engine with a fixed precedence:
//!
//! 1. The text layer, if it yields more than `min_text_chars` trimmed characters
//! 2. Scientific OCR (then the cloud math service) for documents tagged as scientific
//! 3. Raster OCR
//! 4. Any other available engine
//!
//! and [`Dispatcher::execute`] runs it under a hard timeout. Neither method returns an error:
//! routing always produces a [`RouteDecision`] and every failure during extraction is captured
//! in the [`ProcessingResult`]. The only failure escalated to the caller is a dispatcher with no
//! available engine at all, see [`Dispatcher::ensure_any_available`].

use crate::queue::{DocumentQueue, QueueItem};

use super::*;

/// Reason reported when routing finds no available engine.
pub const NO_ENGINE_REASON: &str = "No processing engine available";

/// Failure reason of a run that finished without producing text.
pub const NO_TEXT_REASON: &str = "Engine produced no text";

/// Routing hints for a document, typically the tags of its queue item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingHints {
  /// Free-form tags, e.g. `#scientific`.
  pub tags: Vec<String>,
}

impl RoutingHints {
  /// Hints carrying `tags`.
  pub fn with_tags<I, S>(tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>, {
    Self { tags: tags.into_iter().map(Into::into).collect() }
  }
}

/// The engine chosen for a document and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
  /// Selected engine.
  pub engine:     ProcessingEngine,
  /// Confidence in `0.0..=1.0`.
  pub confidence: f32,
  /// Human readable reason.
  pub reason:     String,
}

impl RouteDecision {
  /// Creates a decision, e.g. to force a specific engine.
  pub fn new(engine: ProcessingEngine, confidence: f32, reason: impl Into<String>) -> Self {
    Self { engine, confidence, reason: reason.into() }
  }
}

/// Outcome of running an engine on a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingResult {
  /// Whether non-empty text was produced.
  pub success:          bool,
  /// Extracted text, empty on failure.
  pub text:             String,
  /// The engine that ran.
  pub engine_used:      ProcessingEngine,
  /// Engine specific metadata.
  pub metadata:         BTreeMap<String, serde_json::Value>,
  /// Failure reason when `success` is false.
  pub error_message:    Option<String>,
  /// Wall-clock duration of the run.
  pub duration_seconds: f64,
}

impl ProcessingResult {
  fn failed(engine: ProcessingEngine, message: impl Into<String>, started: Instant) -> Self {
    Self {
      success:          false,
      text:             String::new(),
      engine_used:      engine,
      metadata:         BTreeMap::new(),
      error_message:    Some(message.into()),
      duration_seconds: started.elapsed().as_secs_f64(),
    }
  }
}

/// Result of processing a single queue item.
#[derive(Debug)]
pub struct QueueOutcome {
  /// Queue item key.
  pub key:    String,
  /// Queue item title.
  pub title:  String,
  /// The processing result, or the reason the item never reached an engine.
  pub result: core::result::Result<ProcessingResult, String>,
}

impl QueueOutcome {
  /// Whether the item was processed successfully.
  pub fn succeeded(&self) -> bool { self.result.as_ref().is_ok_and(|r| r.success) }
}

/// Selects and runs extraction engines.
pub struct Dispatcher {
  engines:         Vec<Arc<dyn Engine>>,
  availability:    BTreeMap<ProcessingEngine, bool>,
  scientific_tags: HashSet<String>,
  min_text_chars:  usize,
  timeout:         Duration,
}

impl std::fmt::Debug for Dispatcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Dispatcher")
      .field("availability", &self.availability)
      .field("min_text_chars", &self.min_text_chars)
      .field("timeout", &self.timeout)
      .finish()
  }
}

/// Builder for a [`Dispatcher`]. Engines are probed once in [`DispatcherBuilder::build`].
pub struct DispatcherBuilder {
  engines:         Vec<Arc<dyn Engine>>,
  scientific_tags: HashSet<String>,
  min_text_chars:  usize,
  timeout:         Duration,
}

impl Default for DispatcherBuilder {
  fn default() -> Self {
    let pipeline = PipelineConfig::default();
    Self {
      engines:         Vec::new(),
      scientific_tags: pipeline.scientific_tags.iter().cloned().collect(),
      min_text_chars:  pipeline.min_text_chars,
      timeout:         pipeline.engine_timeout(),
    }
  }
}

impl DispatcherBuilder {
  /// Registers an engine. A later engine of the same kind replaces an earlier one.
  pub fn with_engine(mut self, engine: Arc<dyn Engine>) -> Self {
    self.engines.retain(|e| e.kind() != engine.kind());
    self.engines.push(engine);
    self
  }

  /// Registers several engines.
  pub fn with_engines(self, engines: impl IntoIterator<Item = Arc<dyn Engine>>) -> Self {
    engines.into_iter().fold(self, Self::with_engine)
  }

  /// Replaces the tags that route a document to formula-aware engines.
  pub fn scientific_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>, {
    self.scientific_tags = tags.into_iter().map(Into::into).collect();
    self
  }

  /// Sets the text layer length required for routing to the text layer.
  pub fn min_text_chars(mut self, chars: usize) -> Self {
    self.min_text_chars = chars;
    self
  }

  /// Sets the wall-clock budget of a single engine invocation.
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Probes every registered engine and builds the dispatcher.
  pub async fn build(self) -> Dispatcher {
    let probes = futures::future::join_all(self.engines.iter().map(|engine| async move {
      let available = engine.probe().await;
      (engine.kind(), available)
    }))
    .await;

    let mut availability: BTreeMap<ProcessingEngine, bool> =
      ProcessingEngine::ALL.into_iter().map(|engine| (engine, false)).collect();
    availability.extend(probes);
    info!(
      "Engine availability: {}",
      availability
        .iter()
        .map(|(engine, available)| format!("{engine}={available}"))
        .collect::<Vec<_>>()
        .join(", ")
    );

    Dispatcher {
      engines: self.engines,
      availability,
      scientific_tags: self.scientific_tags,
      min_text_chars: self.min_text_chars,
      timeout: self.timeout,
    }
  }
}

impl Dispatcher {
  /// Starts building a dispatcher without engines.
  pub fn builder() -> DispatcherBuilder { DispatcherBuilder::default() }

  /// Builds a dispatcher with the engines enabled in `config`.
  pub async fn from_config(config: &Config) -> Result<Self> {
    let dispatcher = Self::builder()
      .with_engines(engines_from_config(config))
      .scientific_tags(config.pipeline.scientific_tags.iter().cloned())
      .min_text_chars(config.pipeline.min_text_chars)
      .timeout(config.pipeline.engine_timeout())
      .build()
      .await;
    Ok(dispatcher)
  }

  /// Availability of every engine as probed at construction.
  pub fn availability(&self) -> &BTreeMap<ProcessingEngine, bool> { &self.availability }

  /// Whether `engine` passed its probe.
  pub fn is_available(&self, engine: ProcessingEngine) -> bool {
    self.availability.get(&engine).copied().unwrap_or(false)
  }

  /// Fails if no engine is available.
  pub fn ensure_any_available(&self) -> Result<()> {
    if self.availability.values().any(|available| *available) {
      Ok(())
    } else {
      error!("{NO_ENGINE_REASON}");
      Err(FolioError::NoEngineAvailable)
    }
  }

  fn engine(&self, kind: ProcessingEngine) -> Option<&Arc<dyn Engine>> {
    self.engines.iter().find(|engine| engine.kind() == kind)
  }

  /// Chooses an engine for the document at `path`. Never fails.
  pub async fn analyze(&self, path: impl AsRef<Path>, hints: &RoutingHints) -> RouteDecision {
    let path = path.as_ref();

    if let Some(route) = self.text_layer_route(path).await {
      return route;
    }

    let mut tags: Vec<&str> =
      hints.tags.iter().map(String::as_str).filter(|t| self.scientific_tags.contains(*t)).collect();
    if !tags.is_empty() {
      tags.sort_unstable();
      tags.dedup();
      let tags = tags.join(", ");
      if self.is_available(ProcessingEngine::ScientificOcr) {
        return RouteDecision::new(
          ProcessingEngine::ScientificOcr,
          0.85,
          format!("Scientific document with tags: {tags}"),
        );
      }
      if self.is_available(ProcessingEngine::CloudMath) {
        return RouteDecision::new(
          ProcessingEngine::CloudMath,
          0.80,
          format!("Scientific document, using cloud API: {tags}"),
        );
      }
    }

    if self.is_available(ProcessingEngine::RasterOcr) {
      return RouteDecision::new(
        ProcessingEngine::RasterOcr,
        0.70,
        "Scanned or image-based PDF, using standard OCR",
      );
    }

    if let Some(engine) = ProcessingEngine::ALL
      .into_iter()
      .find(|engine| *engine != ProcessingEngine::TextLayer && self.is_available(*engine))
    {
      return RouteDecision::new(
        engine,
        0.50,
        format!("Fallback to {engine} (other engines unavailable)"),
      );
    }

    RouteDecision::new(ProcessingEngine::TextLayer, 0.0, NO_ENGINE_REASON)
  }

  async fn text_layer_route(&self, path: &Path) -> Option<RouteDecision> {
    if !self.is_available(ProcessingEngine::TextLayer) {
      return None;
    }
    let engine = self.engine(ProcessingEngine::TextLayer)?;
    match tokio::time::timeout(self.timeout, engine.extract(path)).await {
      Ok(Ok(sample)) if sample.text.trim().chars().count() > self.min_text_chars => Some(
        RouteDecision::new(
          ProcessingEngine::TextLayer,
          0.95,
          "Text-based PDF with sufficient extractable content",
        ),
      ),
      Ok(Ok(_)) => {
        debug!("{}: text layer too short", path.display());
        None
      },
      Ok(Err(e)) => {
        debug!("{}: text layer unreadable: {e}", path.display());
        None
      },
      Err(_) => {
        debug!("{}: text layer probe timed out", path.display());
        None
      },
    }
  }

  /// Runs the engine chosen by `route`. Never fails; errors are reported in the result.
  pub async fn execute(&self, path: impl AsRef<Path>, route: &RouteDecision) -> ProcessingResult {
    let path = path.as_ref();
    let started = Instant::now();

    let Some(engine) = self.engine(route.engine) else {
      return ProcessingResult::failed(
        route.engine,
        format!("Engine {} is not registered", route.engine),
        started,
      );
    };

    let result = match tokio::time::timeout(self.timeout, engine.extract(path)).await {
      Ok(Ok(extraction)) => {
        let success = !extraction.text.trim().is_empty();
        ProcessingResult {
          success,
          text: extraction.text,
          engine_used: route.engine,
          metadata: extraction.metadata,
          error_message: (!success).then(|| NO_TEXT_REASON.to_string()),
          duration_seconds: started.elapsed().as_secs_f64(),
        }
      },
      Ok(Err(e)) => ProcessingResult::failed(route.engine, e.to_string(), started),
      Err(_) => ProcessingResult::failed(
        route.engine,
        FolioError::Timeout(self.timeout.as_secs()).to_string(),
        started,
      ),
    };

    if result.success {
      debug!(
        document = %path.display(),
        engine = %result.engine_used,
        seconds = result.duration_seconds,
        "Extracted {} characters",
        result.text.len()
      );
    } else {
      warn!(
        document = %path.display(),
        engine = %result.engine_used,
        "Extraction failed: {}",
        result.error_message.as_deref().unwrap_or_default()
      );
    }
    result
  }

  /// Processes up to `max_items` pending queue items one after another.
  ///
  /// Each item is staged into its own temporary directory, which is removed when the item is
  /// done. Items are marked processed or failed on the queue; a failure on one item never stops
  /// the run.
  ///
  /// # Errors
  ///
  /// Only listing the pending items can fail the run.
  pub async fn run_queue(
    &self,
    queue: &dyn DocumentQueue,
    max_items: usize,
  ) -> Result<Vec<QueueOutcome>> {
    let items = queue.pending(max_items).await?;
    if items.is_empty() {
      info!("No pending queue items");
      return Ok(Vec::new());
    }
    info!("Processing {} queue items", items.len());

    let mut outcomes = Vec::with_capacity(items.len());
    for item in items.into_iter().take(max_items) {
      let result = self.process_queue_item(queue, &item).await;
      let outcome = match &result {
        Ok(processed) if processed.success => queue.mark_processed(&item).await,
        Ok(processed) => {
          let reason = processed.error_message.as_deref().unwrap_or(NO_TEXT_REASON);
          queue.mark_failed(&item, reason).await
        },
        Err(reason) => queue.mark_failed(&item, reason).await,
      };
      if let Err(e) = outcome {
        warn!("Could not update queue item {}: {e}", item.key);
      }
      outcomes.push(QueueOutcome { key: item.key, title: item.title, result });
    }
    Ok(outcomes)
  }

  async fn process_queue_item(
    &self,
    queue: &dyn DocumentQueue,
    item: &QueueItem,
  ) -> core::result::Result<ProcessingResult, String> {
    let staging = tempfile::tempdir().map_err(|e| e.to_string())?;
    let path = queue.stage(item, staging.path()).await.map_err(|e| e.to_string())?;

    let route = self.analyze(&path, &RoutingHints::with_tags(item.tags.iter().cloned())).await;
    info!("{}: {} -> {}", item.key, route.reason, route.engine);
    Ok(self.execute(&path, &route).await)
  }
}
