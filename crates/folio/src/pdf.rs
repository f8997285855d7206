//! PDF inspection with `lopdf`: text layer, document information and discovery of source files.
//!
//! [`PdfAnalyzer`] reads everything the pipeline needs from a PDF without invoking any external
//! program: the text layer page by page, the `Info` dictionary referenced from the trailer, the
//! page count and whether the file is encrypted.

use lopdf::{Dictionary, Document, Object};

use super::*;

/// Document information and structural facts about a PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMetadata {
  /// `/Title` from the information dictionary.
  pub title:      Option<String>,
  /// `/Author` from the information dictionary.
  pub author:     Option<String>,
  /// `/Subject` from the information dictionary.
  pub subject:    Option<String>,
  /// `/Keywords` from the information dictionary.
  pub keywords:   Option<String>,
  /// `/Producer` from the information dictionary.
  pub producer:   Option<String>,
  /// Number of pages in the page tree.
  pub page_count: usize,
  /// Whether the trailer carries an `/Encrypt` entry.
  pub encrypted:  bool,
  /// File size in bytes.
  pub file_size:  u64,
}

/// Text of a single page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
  /// 1-based page number.
  pub page_number: u32,
  /// Extracted text.
  pub text:        String,
}

/// Metadata plus page texts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfContent {
  /// Document information.
  pub metadata: PdfMetadata,
  /// Page texts in page order. Pages without a readable text layer are left out.
  pub pages:    Vec<PageContent>,
}

impl PdfContent {
  /// Page texts joined with blank lines.
  pub fn text(&self) -> String {
    self.pages.iter().map(|p| p.text.trim_end()).collect::<Vec<_>>().join("\n\n")
  }
}

/// Reads PDFs in-process.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfAnalyzer;

impl PdfAnalyzer {
  /// Creates an analyzer.
  pub fn new() -> Self { Self }

  /// Loads `path` and extracts its metadata and text layer.
  pub fn analyze<P: AsRef<Path>>(&self, path: P) -> Result<PdfContent> {
    let path = path.as_ref();
    let doc = Document::load(path)?;
    let metadata = self.extract_metadata(path, &doc)?;
    let pages = self.extract_pages(&doc);
    trace!("{}: {} of {} pages with text", path.display(), pages.len(), metadata.page_count);
    Ok(PdfContent { metadata, pages })
  }

  /// Loads `path` and extracts only its metadata.
  pub fn metadata<P: AsRef<Path>>(&self, path: P) -> Result<PdfMetadata> {
    let path = path.as_ref();
    let doc = Document::load(path)?;
    self.extract_metadata(path, &doc)
  }

  fn extract_pages(&self, doc: &Document) -> Vec<PageContent> {
    doc
      .get_pages()
      .into_keys()
      .filter_map(|page_number| match doc.extract_text(&[page_number]) {
        Ok(text) if !text.trim().is_empty() => Some(PageContent { page_number, text }),
        Ok(_) => None,
        Err(e) => {
          debug!("No text layer on page {page_number}: {e}");
          None
        },
      })
      .collect()
  }

  fn extract_metadata(&self, path: &Path, doc: &Document) -> Result<PdfMetadata> {
    let mut metadata = PdfMetadata {
      page_count: doc.get_pages().len(),
      encrypted: doc.trailer.get(b"Encrypt").is_ok(),
      file_size: std::fs::metadata(path)?.len(),
      ..Default::default()
    };

    let info = match doc.trailer.get(b"Info") {
      Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_dict).ok(),
      Ok(Object::Dictionary(dict)) => Some(dict),
      _ => None,
    };
    if let Some(info) = info {
      metadata.title = text_from_dict(info, "Title");
      metadata.author = text_from_dict(info, "Author");
      metadata.subject = text_from_dict(info, "Subject");
      metadata.keywords = text_from_dict(info, "Keywords");
      metadata.producer = text_from_dict(info, "Producer");
    }
    Ok(metadata)
  }
}

/// Decodes a text string entry, honoring a UTF-16BE byte order mark.
fn text_from_dict(dict: &Dictionary, key: &str) -> Option<String> {
  let bytes = dict.get(key.as_bytes()).ok().and_then(|obj| obj.as_str().ok())?;
  let text = match bytes.strip_prefix(&[0xFE, 0xFF]) {
    Some(utf16) => char::decode_utf16(
      utf16.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])),
    )
    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
    .collect(),
    None => String::from_utf8_lossy(bytes).into_owned(),
  };
  let text = text.trim().to_string();
  (!text.is_empty()).then_some(text)
}

/// Finds every `*.pdf` below `roots`, sorted per root. Missing roots are skipped.
pub fn discover_pdfs(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
  let options = glob::MatchOptions { case_sensitive: false, ..Default::default() };
  let mut pdfs = Vec::new();
  for root in roots {
    if !root.is_dir() {
      debug!("Skipping missing input directory {}", root.display());
      continue;
    }
    let pattern = format!("{}/**/*.pdf", glob::Pattern::escape(&root.to_string_lossy()));
    let mut found: Vec<PathBuf> =
      glob::glob_with(&pattern, options)?.flatten().filter(|p| p.is_file()).collect();
    found.sort();
    pdfs.extend(found);
  }
  Ok(pdfs)
}

/// Writes a minimal PDF with one page per entry of `pages` using the standard Courier font.
#[cfg(test)]
pub(crate) fn write_test_pdf(path: &Path, title: &str, pages: &[&str]) {
  use lopdf::{
    content::{Content, Operation},
    dictionary, Stream, StringFormat,
  };

  let mut doc = Document::with_version("1.5");
  let pages_id = doc.new_object_id();
  let font_id = doc.add_object(dictionary! {
    "Type" => "Font",
    "Subtype" => "Type1",
    "BaseFont" => "Courier",
  });
  let resources_id = doc.add_object(dictionary! {
    "Font" => dictionary! { "F1" => font_id },
  });

  let mut kids: Vec<Object> = Vec::new();
  for text in pages {
    let operations: Vec<Operation> = text
      .lines()
      .enumerate()
      .flat_map(|(i, line)| {
        vec![
          Operation::new("BT", vec![]),
          Operation::new("Tf", vec!["F1".into(), 10.into()]),
          Operation::new("Td", vec![40.into(), (800 - 12 * i as i64).into()]),
          Operation::new("Tj", vec![Object::String(line.as_bytes().to_vec(), StringFormat::Literal)]),
          Operation::new("ET", vec![]),
        ]
      })
      .collect();
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
      "Type" => "Page",
      "Parent" => pages_id,
      "Contents" => content_id,
      "Resources" => resources_id,
      "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    kids.push(page_id.into());
  }

  let count = kids.len() as i64;
  doc.objects.insert(
    pages_id,
    Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count }),
  );
  let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
  let info_id = doc.add_object(dictionary! {
    "Title" => Object::string_literal(title),
    "Author" => Object::string_literal("Folio Tests"),
  });
  doc.trailer.set("Root", catalog_id);
  doc.trailer.set("Info", info_id);
  doc.save(path).unwrap();
}
