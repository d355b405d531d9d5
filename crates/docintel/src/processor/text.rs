use crate::error::ProcessError;
use crate::processor::{DocumentFormat, DocumentProcessor};

/// UTF-8 decoding; invalid sequences become U+FFFD instead of failing.
#[derive(Default)]
pub struct TextProcessor;

impl TextProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentProcessor for TextProcessor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ProcessError> {
        let text = String::from_utf8_lossy(bytes);
        Ok(text.strip_prefix('\u{FEFF}').unwrap_or(&text[..]).to_string())
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}
