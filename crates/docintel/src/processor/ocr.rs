use std::io::Cursor;
use std::sync::Arc;

use crate::error::ProcessError;

/// Recognition profile used for every document, whatever its language.
pub const OCR_LANGUAGES: &str = "eng+mal";

/// Image bytes in, recognized text out.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<String, ProcessError>;

    /// Identifier reported in the record's processing metadata.
    fn version(&self) -> &str;
}

#[derive(Clone)]
pub struct TesseractOcr {
    inner: Arc<TesseractInner>,
}

struct TesseractInner {
    languages: String,
    version: String,
}

impl TesseractOcr {
    pub fn new() -> Self {
        Self::with_languages(OCR_LANGUAGES)
    }

    pub fn with_languages(languages: &str) -> Self {
        let languages = if languages.trim().is_empty() {
            OCR_LANGUAGES.to_string()
        } else {
            languages.to_string()
        };

        Self {
            inner: Arc::new(TesseractInner {
                version: format!("tesseract/{}", languages),
                languages,
            }),
        }
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr", languages = %self.inner.languages).entered();

        let img = image::load_from_memory(image)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to load image: {}", e)))?;

        // leptess only reads a handful of encodings; normalise to PNG
        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &self.inner.languages).map_err(|e| {
            ProcessError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))
    }

    fn version(&self) -> &str {
        &self.inner.version
    }
}
