use folio::chunk::{Chunk, Chunker};

use super::*;

/// Joins chunks, dropping the part of each chunk that repeats the previous one.
fn reconstruct(text: &str, chunks: &[Chunk]) -> String {
  let chars: Vec<char> = text.replace("\r\n", "\n").chars().collect();
  let mut out = String::new();
  let mut covered = 0;
  for chunk in chunks {
    let from = chunk.char_start.max(covered);
    if from > covered {
      assert!(chars[covered..from].iter().all(|c| c.is_whitespace()), "gap before {}", chunk.index);
      out.extend(&chars[covered..from]);
    }
    out.extend(&chars[from..chunk.char_end.max(from)]);
    covered = covered.max(chunk.char_end);
  }
  out
}

fn paragraphs(count: usize) -> String {
  (0..count)
    .map(|i| format!("Paragraph {i} discusses reconstruction of sparse flow fields. It ends here."))
    .collect::<Vec<_>>()
    .join("\n\n")
}

#[test]
fn test_reconstructs_trimmed_text() {
  let chunker =
    Chunker::builder().base_size(120).overlap(30).max_size(240).min_size(40).build().unwrap();
  for text in [paragraphs(40), "word ".repeat(700), "x".repeat(1000), paragraphs(3).replace("\n\n", "\r\n")] {
    let chunks = chunker.chunk(&text);
    assert!(!chunks.is_empty());
    assert_eq!(reconstruct(&text, &chunks).trim(), text.replace("\r\n", "\n").trim());
    for (i, chunk) in chunks.iter().enumerate() {
      assert_eq!(chunk.index, i);
      assert_eq!(chunk.text.chars().count(), chunk.len());
      assert_eq!(chunk.text.trim(), chunk.text);
    }
  }
}

#[test]
fn test_short_text_is_single_chunk() {
  let chunker = Chunker::default();
  let chunks = chunker.chunk("   A short abstract about gappy POD.  \n");
  assert_eq!(chunks.len(), 1);
  assert_eq!(chunks[0].text, "A short abstract about gappy POD.");
}

#[test]
fn test_whitespace_only_yields_nothing() {
  assert!(Chunker::default().chunk(" \n\r\n\t ").is_empty());
}

#[test]
fn test_terminates_with_large_overlap() {
  let text = "abcdefghij".repeat(200);
  for overlap in [0, 10, 50, 99] {
    let chunker = Chunker::builder().base_size(100).overlap(overlap).min_size(1).build().unwrap();
    let chunks = chunker.chunk(&text);
    let size = chunker.effective_size(text.len());
    assert!(chunks.len() <= 8 * text.len() / size + 1, "overlap {overlap}: {} chunks", chunks.len());
    assert_eq!(chunks.last().map(|c| c.char_end), Some(text.len()));
  }
}

#[test]
fn test_large_documents_use_wider_windows() {
  let chunker = Chunker::default();
  assert_eq!(chunker.effective_size(10_000), 1200);
  assert_eq!(chunker.effective_size(600_000), 2343);
  assert_eq!(chunker.effective_size(10_000_000), 2400);
}

#[test]
fn test_prefers_paragraph_breaks() {
  let chunker =
    Chunker::builder().base_size(120).overlap(0).max_size(240).min_size(20).build().unwrap();
  let text = paragraphs(6);
  let chunks = chunker.chunk(&text);
  // The final window reaches the end of the text and may split at a sentence instead
  let full_windows: Vec<_> = chunks.iter().filter(|c| c.char_start + 120 < text.len()).collect();
  assert_eq!(full_windows.len(), 5);
  for chunk in full_windows {
    assert!(chunk.text.ends_with("It ends here."), "{:?}", chunk.text);
  }
}
