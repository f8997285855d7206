//! Adaptive, boundary-aware text chunking.
//!
//! [`Chunker::chunk`] walks a text with a sliding window and cuts each window at the
//! best natural boundary it can find close to the window end: a paragraph break, a line
//! break, a sentence end or a plain space. Adjacent chunks share up to `overlap`
//! characters. For very large documents the window grows so that the number of chunks
//! stays near `target_count`.
//!
//! All offsets are character offsets (Unicode scalar values) into the text after `\r\n`
//! has been normalized to `\n`. Every chunk is trimmed, and its offsets describe the
//! trimmed content exactly: `char_end - char_start == text.chars().count()`.
//!
//! # Examples
//!
//! ```
//! use folio::chunk::Chunker;
//!
//! let chunker = Chunker::builder().base_size(40).overlap(10).min_size(10).build().unwrap();
//! let chunks = chunker.chunk("First paragraph here.\n\nSecond paragraph follows it.");
//!
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].text, "First paragraph here.");
//! assert_eq!(chunks[1].index, 1);
//! ```

use super::*;

/// Name recorded with every chunk written by the pipeline.
pub const STRATEGY_NAME: &str = "adaptive-paragraph";

/// Split tokens in order of preference.
const SPLIT_TOKENS: [&str; 5] = ["\n\n", "\n", ". ", ".", " "];

/// A trimmed segment of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
  /// 0-based position in the chunk sequence.
  pub index:      usize,
  /// Trimmed chunk content.
  pub text:       String,
  /// Character offset of the first character.
  pub char_start: usize,
  /// Character offset one past the last character.
  pub char_end:   usize,
}

impl Chunk {
  /// Number of characters in the chunk.
  pub fn len(&self) -> usize { self.char_end - self.char_start }

  /// Whether the chunk holds no characters. Chunks produced by [`Chunker`] never do.
  pub fn is_empty(&self) -> bool { self.char_end == self.char_start }
}

/// Splits text into overlapping [`Chunk`]s.
#[derive(Debug, Clone)]
pub struct Chunker {
  config: ChunkingConfig,
}

impl Default for Chunker {
  fn default() -> Self { Self { config: ChunkingConfig::default() } }
}

/// Builder for a validated [`Chunker`].
#[derive(Debug, Clone, Default)]
pub struct ChunkerBuilder {
  config: ChunkingConfig,
}

impl ChunkerBuilder {
  /// Sets the window size for documents below the large document threshold.
  pub fn base_size(mut self, size: usize) -> Self {
    self.config.base_size = size;
    self
  }

  /// Sets the overlap between adjacent chunks.
  pub fn overlap(mut self, overlap: usize) -> Self {
    self.config.overlap = overlap;
    self
  }

  /// Sets the upper bound of the adaptive window size.
  pub fn max_size(mut self, size: usize) -> Self {
    self.config.max_size = size;
    self
  }

  /// Sets the document length from which the window size scales.
  pub fn large_doc_threshold(mut self, threshold: usize) -> Self {
    self.config.large_doc_threshold = threshold;
    self
  }

  /// Sets the desired chunk count for large documents.
  pub fn target_count(mut self, count: usize) -> Self {
    self.config.target_count = count;
    self
  }

  /// Sets the minimum offset of a split point from the window start.
  pub fn min_size(mut self, size: usize) -> Self {
    self.config.min_size = size;
    self
  }

  /// Replaces all settings at once.
  pub fn with_config(mut self, config: ChunkingConfig) -> Self {
    self.config = config;
    self
  }

  /// Validates the settings.
  ///
  /// # Errors
  ///
  /// Returns [`FolioError::InvalidChunkConfig`] if the base size or target count is zero,
  /// the maximum size is below the base size, or the minimum size exceeds the base size.
  pub fn build(self) -> Result<Chunker> {
    let ChunkingConfig { base_size, max_size, min_size, target_count, .. } = self.config;
    if base_size == 0 {
      return Err(FolioError::InvalidChunkConfig("base_size must be positive".into()));
    }
    if max_size < base_size {
      return Err(FolioError::InvalidChunkConfig(format!(
        "max_size ({max_size}) must be at least base_size ({base_size})"
      )));
    }
    if min_size > base_size {
      return Err(FolioError::InvalidChunkConfig(format!(
        "min_size ({min_size}) must not exceed base_size ({base_size})"
      )));
    }
    if target_count == 0 {
      return Err(FolioError::InvalidChunkConfig("target_count must be positive".into()));
    }
    Ok(Chunker { config: self.config })
  }
}

impl Chunker {
  /// Starts a builder with the default settings.
  pub fn builder() -> ChunkerBuilder { ChunkerBuilder::default() }

  /// Builds a chunker from a configuration section.
  pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
    Self::builder().with_config(*config).build()
  }

  /// The active settings.
  pub fn config(&self) -> &ChunkingConfig { &self.config }

  /// Strategy name recorded with emitted chunks.
  pub fn strategy_name(&self) -> &'static str { STRATEGY_NAME }

  /// Window size used for a document of `len` characters.
  pub fn effective_size(&self, len: usize) -> usize {
    let ChunkingConfig { base_size, max_size, large_doc_threshold, target_count, .. } =
      self.config;
    if len < large_doc_threshold {
      base_size
    } else {
      max_size.min(base_size.max(len / target_count))
    }
  }

  /// Overlap used together with a window of `size` characters.
  pub fn effective_overlap(&self, size: usize) -> usize { self.config.overlap.min(size / 3) }

  /// Splits `text` into trimmed, overlapping chunks.
  pub fn chunk(&self, text: &str) -> Vec<Chunk> {
    let normalized = text.replace("\r\n", "\n");
    if normalized.trim().is_empty() {
      return Vec::new();
    }

    let chars: Vec<char> = normalized.chars().collect();
    let len = chars.len();
    let size = self.effective_size(len);
    let overlap = self.effective_overlap(size);
    let min_offset = self.config.min_size;
    trace!(len, size, overlap, min_offset, "Chunking text");

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut start = 0;
    while start < len {
      let window_end = len.min(start + size);
      let split_end = find_split_point(&chars, start, window_end, min_offset);

      let slice = &chars[start..split_end];
      let leading = slice.iter().take_while(|c| c.is_whitespace()).count();
      let trailing = slice[leading..].iter().rev().take_while(|c| c.is_whitespace()).count();
      let chunk_start = start + leading;
      let chunk_end = split_end - trailing;

      if chunk_end > chunk_start {
        chunks.push(Chunk {
          index:      chunks.len(),
          text:       chars[chunk_start..chunk_end].iter().collect(),
          char_start: chunk_start,
          char_end:   chunk_end,
        });
      }

      if split_end >= len {
        break;
      }

      let last_start = chunks.last().map_or(0, |c| c.char_start + 1);
      start = (start + 1).max(split_end.saturating_sub(overlap)).max(last_start);
    }

    debug!(chunks = chunks.len(), size, "Chunked text");
    chunks
  }
}

/// Returns the end of the preferred split in `chars[start..window_end]`, or `window_end`.
fn find_split_point(chars: &[char], start: usize, window_end: usize, min_offset: usize) -> usize {
  for token in SPLIT_TOKENS {
    let token: Vec<char> = token.chars().collect();
    if let Some(pos) = rfind(&chars[start..window_end], &token) {
      if pos >= min_offset {
        return start + pos + token.len();
      }
    }
  }
  window_end
}

/// Position of the last occurrence of `needle` in `haystack`.
fn rfind(haystack: &[char], needle: &[char]) -> Option<usize> {
  if needle.len() > haystack.len() {
    return None;
  }
  (0..=haystack.len() - needle.len()).rev().find(|&i| haystack[i..i + needle.len()] == *needle)
}
