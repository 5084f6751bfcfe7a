//! Document ingestion.
//!
//! Every file in the corpus directory becomes one or more [`Document`]s:
//! PDFs yield one document per page, anything else is read as UTF-8 text.
//! Hidden files are skipped.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Where a document came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub file_name: String,
    pub file_path: PathBuf,
    /// 1-indexed page label for documents cut from a PDF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_label: Option<String>,
}

/// A unit of ingested text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier: file name, plus `#p{n}` for PDF pages.
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a document from raw text content.
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            text: text.into(),
            metadata: DocumentMetadata {
                file_name: name.clone(),
                file_path: PathBuf::from(name),
                page_label: None,
            },
        }
    }

    /// Approximate token count of the text.
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }
}

/// Loads every file in a directory into documents.
#[derive(Debug, Clone)]
pub struct DirectoryReader {
    dir: PathBuf,
    recursive: bool,
}

impl DirectoryReader {
    /// Create a reader for the given directory (top level only).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            recursive: false,
        }
    }

    /// Also descend into subdirectories.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Read all files, in path order.
    pub fn load_data(&self) -> Result<Vec<Document>> {
        if !self.dir.is_dir() {
            return Err(EvalError::CorpusNotFound(self.dir.clone()));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut documents = Vec::new();

        let walker = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name().to_str()));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.dir.clone());
                EvalError::io(path, std::io::Error::other(e.to_string()))
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let loaded = load_file(entry.path())?;
            debug!(path = %entry.path().display(), documents = loaded.len(), "Loaded file");
            documents.extend(loaded);
        }

        if documents.is_empty() {
            return Err(EvalError::EmptyCorpus(self.dir.clone()));
        }

        info!(
            "Loaded {} documents from {}",
            documents.len(),
            self.dir.display()
        );
        Ok(documents)
    }
}

fn is_hidden(name: Option<&str>) -> bool {
    name.is_some_and(|n| n.starts_with('.'))
}

/// Load a single file into zero or more documents.
pub fn load_file(path: &Path) -> Result<Vec<Document>> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string();

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        let pages = pdf_extract::extract_text_by_pages(path).map_err(|e| EvalError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        return Ok(pdf_page_documents(&file_name, path, pages));
    }

    let bytes = std::fs::read(path).map_err(|e| EvalError::io(path, e))?;
    match String::from_utf8(bytes) {
        Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
        Ok(text) => Ok(vec![Document {
            id: file_name.clone(),
            text,
            metadata: DocumentMetadata {
                file_name,
                file_path: path.to_path_buf(),
                page_label: None,
            },
        }]),
        Err(_) => {
            warn!("Skipping '{}': not UTF-8 text", path.display());
            Ok(Vec::new())
        }
    }
}

/// One document per non-empty page, labelled with its 1-based page number.
fn pdf_page_documents(file_name: &str, path: &Path, pages: Vec<String>) -> Vec<Document> {
    pages
        .iter()
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| {
            let label = (i + 1).to_string();
            Document {
                id: format!("{}#p{}", file_name, label),
                text: page.trim().to_string(),
                metadata: DocumentMetadata {
                    file_name: file_name.to_string(),
                    file_path: path.to_path_buf(),
                    page_label: Some(label),
                },
            }
        })
        .collect()
}

/// Estimate token count from text (rough approximation: words / 0.75).
pub fn estimate_tokens(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    (word_count as f64 / 0.75) as usize
}

/// Cut text down to roughly `max_tokens`, keeping whole words.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    if estimate_tokens(text) <= max_tokens {
        return text.to_string();
    }
    let max_words = (max_tokens as f64 * 0.75) as usize;
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_document_from_text() {
        let doc = Document::from_text("notes", "This is the content.");
        assert_eq!(doc.id, "notes");
        assert!(doc.metadata.page_label.is_none());
        assert!(doc.estimated_tokens() > 0);
    }

    #[test]
    fn test_estimate_tokens() {
        let text = "one two three four five six seven eight";
        let tokens = estimate_tokens(text);
        assert!((10..=12).contains(&tokens));
    }

    #[test]
    fn test_truncate_to_tokens() {
        let text = "one two three four five six seven eight";
        assert_eq!(truncate_to_tokens(text, 100), text);
        assert_eq!(truncate_to_tokens(text, 4), "one two three");
        assert_eq!(truncate_to_tokens(text, 0), "");
    }

    #[test]
    fn test_reader_loads_sorted_and_skips_hidden() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "Second file.").unwrap();
        fs::write(dir.path().join("a.md"), "# First\nfile").unwrap();
        fs::write(dir.path().join(".hidden"), "secret").unwrap();
        fs::write(dir.path().join("blank.txt"), "   ").unwrap();

        let docs = DirectoryReader::new(dir.path()).load_data().unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md", "b.txt"]);
    }

    #[test]
    fn test_reader_recursion_is_opt_in() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("top.txt"), "top level").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("deep.txt"), "nested").unwrap();

        let flat = DirectoryReader::new(dir.path()).load_data().unwrap();
        assert_eq!(flat.len(), 1);

        let deep = DirectoryReader::new(dir.path())
            .recursive(true)
            .load_data()
            .unwrap();
        assert_eq!(deep.len(), 2);
    }

    #[test]
    fn test_reader_skips_binary_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x81]).unwrap();
        fs::write(dir.path().join("ok.txt"), "fine").unwrap();

        let docs = DirectoryReader::new(dir.path()).load_data().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "ok.txt");
    }

    #[test]
    fn test_reader_missing_dir() {
        let result = DirectoryReader::new("/nonexistent/corpus").load_data();
        assert!(matches!(result, Err(EvalError::CorpusNotFound(_))));
    }

    #[test]
    fn test_reader_empty_dir() {
        let dir = TempDir::new().unwrap();
        let result = DirectoryReader::new(dir.path()).load_data();
        assert!(matches!(result, Err(EvalError::EmptyCorpus(_))));
    }

    #[test]
    fn test_pdf_page_documents_skip_blank_pages() {
        let pages = vec![
            "Page one text\n".to_string(),
            "  \n".to_string(),
            "Page three text".to_string(),
        ];
        let docs = pdf_page_documents("manual.pdf", Path::new("data/manual.pdf"), pages);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "manual.pdf#p1");
        assert_eq!(docs[1].metadata.page_label.as_deref(), Some("3"));
        assert_eq!(docs[1].text, "Page three text");
    }

    /// Write a minimal PDF with one Helvetica text line per page; an empty
    /// string gives a blank page.
    fn write_pdf(path: &Path, pages: &[&str]) {
        let font_id = 3;
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            String::new(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];
        let mut kids = Vec::new();
        for text in pages {
            let page_id = objects.len() + 1;
            let content = if text.is_empty() {
                String::new()
            } else {
                format!("BT /F1 24 Tf 72 700 Td ({}) Tj ET", text)
            };
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 {} 0 R >> >> /Contents {} 0 R >>",
                font_id,
                page_id + 1
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ));
            kids.push(format!("{} 0 R", page_id));
        }
        objects[1] = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        );

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
        }
        let xref_offset = out.len();
        out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
        for offset in offsets {
            out.push_str(&format!("{:010} 00000 n \n", offset));
        }
        out.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        ));
        fs::write(path, out).unwrap();
    }

    #[test]
    fn test_load_pdf_one_document_per_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.pdf");
        write_pdf(&path, &["First page text", "", "Third page text"]);

        let docs = load_file(&path).unwrap();

        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["manual.pdf#p1", "manual.pdf#p3"]);
        assert!(docs[0].text.contains("First page text"));
        assert!(!docs[0].text.contains("Third"));
        assert!(docs[1].text.contains("Third page text"));
        assert_eq!(docs[1].metadata.page_label.as_deref(), Some("3"));
        assert_eq!(docs[1].metadata.file_name, "manual.pdf");
    }
}
