//! Word document loading

use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::json;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use rnr_core::{Document, DocumentLoader, Error, Result};

const DOCUMENT_XML: &str = "word/document.xml";

/// Reads the body text of `.docx` files
#[derive(Debug, Default, Clone)]
pub struct DocxLoader;

impl DocxLoader {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for DocxLoader {
    fn extensions(&self) -> &[&'static str] {
        &["docx"]
    }

    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let is_docx = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("docx"));
        if !is_docx {
            return Err(Error::Ingestion(format!(
                "unsupported file format: {} (only .docx files can be ingested)",
                path.display()
            )));
        }

        let file = File::open(path)
            .map_err(|e| Error::Ingestion(format!("cannot read {}: {}", path.display(), e)))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| {
            Error::Ingestion(format!("{} is not a valid .docx file: {}", path.display(), e))
        })?;

        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_XML)
            .map_err(|e| {
                Error::Ingestion(format!("{} has no document body: {}", path.display(), e))
            })?
            .read_to_string(&mut xml)
            .map_err(|e| Error::Ingestion(format!("cannot read {}: {}", path.display(), e)))?;

        let content = extract_text(&xml)?;
        tracing::debug!(path = %path.display(), chars = content.chars().count(), "loaded docx");

        Ok(vec![Document {
            content,
            metadata: json!({ "source": path.display().to_string() }),
        }])
    }
}

/// Text runs of a WordprocessingML body. Paragraphs end with a blank line.
pub fn extract_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;
    // Tabs and breaks only count inside a run; `w:pPr/w:tabs` holds tab stop definitions
    let mut run_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:t" => in_run_text = true,
                b"w:r" => run_depth += 1,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:r" => run_depth = run_depth.saturating_sub(1),
                b"w:p" => text.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Empty(e)) if run_depth > 0 => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_run_text => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| Error::Ingestion(format!("malformed document text: {}", e)))?;
                text.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Ingestion(format!(
                    "malformed document XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(text.trim_end().to_string())
}
