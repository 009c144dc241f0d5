//! Document processors: extract text from PDF and DOCX files.

use std::io::{Cursor, Read};
use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::ProcessorError;
use crate::pipeline::registry::{FileProcessor, ProcessorRegistry};
use crate::pipeline::types::{ProcessorInput, ProcessorOutput};

pub const PDF_DESCRIPTION: &str = "Extract text from PDF files";
pub const DOCX_DESCRIPTION: &str = "Extract text from Word documents";
pub const DOCX_MIMETYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const TRUNCATION_MARKER: &str = "...(truncated)";

/// Extracts text from PDFs.
#[derive(Debug, Clone, Copy)]
pub struct PdfTextExtractor {
    preview_chars: usize,
}

impl PdfTextExtractor {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }
}

impl FileProcessor for PdfTextExtractor {
    fn process(&self, input: &ProcessorInput) -> Result<Option<ProcessorOutput>, ProcessorError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(&input.content).map_err(|e| {
            ProcessorError::Decode {
                format: "pdf".into(),
                reason: e.to_string(),
            }
        })?;

        Ok(Some(ProcessorOutput::text(format!(
            "*PDF Extracted: {}*\nPages: {}\n\n{}",
            input.filename,
            pages.len(),
            code_block_preview(&pages.join("\n"), self.preview_chars)
        ))))
    }
}

/// Extracts paragraph text from DOCX files.
#[derive(Debug, Clone, Copy)]
pub struct DocxTextExtractor {
    preview_chars: usize,
}

impl DocxTextExtractor {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }
}

impl FileProcessor for DocxTextExtractor {
    fn process(&self, input: &ProcessorInput) -> Result<Option<ProcessorOutput>, ProcessorError> {
        let text = extract_docx_text(&input.content)?;

        Ok(Some(ProcessorOutput::text(format!(
            "*Document Extracted: {}*\n\n{}",
            input.filename,
            code_block_preview(&text, self.preview_chars)
        ))))
    }
}

/// Read `word/document.xml` out of a DOCX archive and join its paragraphs.
pub fn extract_docx_text(content: &[u8]) -> Result<String, ProcessorError> {
    let decode_err = |reason: String| ProcessorError::Decode {
        format: "docx".into(),
        reason,
    };

    let mut archive =
        zip::ZipArchive::new(Cursor::new(content)).map_err(|e| decode_err(e.to_string()))?;
    let mut xml = Vec::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| decode_err(format!("word/document.xml: {e}")))?
        .read_to_end(&mut xml)
        .map_err(|e| decode_err(e.to_string()))?;

    paragraphs_from_document_xml(&xml).map_err(decode_err)
}

fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().check_end_names = false;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_run => {
                current.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::GeneralRef(e)) if in_text_run => match e.resolve_char_ref() {
                Ok(Some(ch)) => current.push(ch),
                Ok(None) => current.push_str(resolve_entity(&String::from_utf8_lossy(&e))),
                Err(err) => {
                    return Err(format!(
                        "invalid character reference at position {}: {err}",
                        reader.buffer_position()
                    ));
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML parsing error at position {}: {e}",
                    reader.buffer_position()
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}

fn resolve_entity(name: &str) -> &str {
    match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        _ => "",
    }
}

/// Code-fenced preview, cut to `max_chars` characters.
pub fn code_block_preview(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "_(no extractable text)_".to_string();
    }
    let (preview, truncated) = match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (&text[..cut], TRUNCATION_MARKER),
        None => (text, ""),
    };
    format!("```\n{preview}{truncated}\n```")
}

/// Register the PDF and DOCX processors, in that order.
pub fn register(registry: &mut ProcessorRegistry, preview_chars: usize) {
    registry.register(
        ["pdf"],
        ["application/pdf"],
        PDF_DESCRIPTION,
        Arc::new(PdfTextExtractor::new(preview_chars)),
    );
    registry.register(
        ["docx"],
        [DOCX_MIMETYPE],
        DOCX_DESCRIPTION,
        Arc::new(DocxTextExtractor::new(preview_chars)),
    );
}
