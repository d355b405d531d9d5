use std::io::{Cursor, Read, Seek};

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, Event};
use quick_xml::Reader;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, DocumentProcessor};

/// Paragraph text of `word/document.xml`, one line per paragraph.
#[derive(Default)]
pub struct DocxProcessor;

impl DocxProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentProcessor for DocxProcessor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.docx").entered();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ProcessError::DocxProcessing(format!("Failed to open DOCX: {}", e)))?;

        extract_docx_text(&mut archive)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Docx)
    }
}

fn extract_docx_text<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, ProcessError> {
    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| ProcessError::DocxProcessing(format!("Failed to find document.xml: {}", e)))?;

    let mut xml_content = String::new();
    document_xml
        .read_to_string(&mut xml_content)
        .map_err(|e| ProcessError::DocxProcessing(format!("Failed to read document.xml: {}", e)))?;

    parse_docx_xml(&xml_content)
}

fn parse_docx_xml(xml: &str) -> Result<String, ProcessError> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text_element = true,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"tab" => text.push('\t'),
            Ok(Event::Text(e)) if in_text_element => {
                let decoded = e
                    .decode()
                    .map_err(|e| ProcessError::DocxProcessing(format!("Bad text run: {}", e)))?;
                text.push_str(&decoded);
            }
            Ok(Event::GeneralRef(e)) if in_text_element => push_reference(&mut text, &e)?,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProcessError::DocxProcessing(format!(
                    "XML parsing error: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(text.trim_end().to_string())
}

/// Appends the character behind `&name;` or `&#NN;` inside a text run.
fn push_reference(text: &mut String, reference: &BytesRef<'_>) -> Result<(), ProcessError> {
    let bad_ref = |e: &dyn std::fmt::Display| {
        ProcessError::DocxProcessing(format!("Bad entity reference: {}", e))
    };

    if let Some(ch) = reference.resolve_char_ref().map_err(|e| bad_ref(&e))? {
        text.push(ch);
        return Ok(());
    }

    let name = reference.decode().map_err(|e| bad_ref(&e))?;
    match resolve_predefined_entity(&name) {
        Some(value) => {
            text.push_str(value);
            Ok(())
        }
        None => Err(bad_ref(&format!("&{};", name))),
    }
}
