//! Text extraction: the first stage, and the only one that can fail a job.
//!
//! The file-name extension picks a [`DocumentProcessor`]; PDFs and raster
//! images go through OCR, text and OOXML documents are decoded directly.

pub mod docx;
pub mod image;
pub mod ocr;
pub mod pdf;
pub mod text;

use std::sync::Arc;

use crate::error::ProcessError;

pub use ocr::{OcrEngine, TesseractOcr, OCR_LANGUAGES};
pub use pdf::{PageRasterizer, PopplerRasterizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Image,
    Text,
    Docx,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" | "md" => Some(Self::Text),
            "png" | "jpg" | "jpeg" | "tiff" | "tif" | "bmp" | "gif" | "webp" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Lower-cased text after the last `.` of `file_name`, or the whole name
/// when it has no dot.
pub fn extension_of(file_name: &str) -> String {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => name.to_lowercase(),
    }
}

pub trait DocumentProcessor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ProcessError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

pub struct ProcessorRegistry {
    processors: Vec<Box<dyn DocumentProcessor>>,
    ocr_version: String,
}

impl ProcessorRegistry {
    pub fn new(ocr: Arc<dyn OcrEngine>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        let ocr_version = ocr.version().to_string();
        let processors: Vec<Box<dyn DocumentProcessor>> = vec![
            Box::new(text::TextProcessor::new()),
            Box::new(image::ImageProcessor::new(ocr.clone())),
            Box::new(pdf::PdfProcessor::new(ocr, rasterizer)),
            Box::new(docx::DocxProcessor::new()),
        ];

        Self {
            processors,
            ocr_version,
        }
    }

    /// Production registry: Tesseract with the fixed language profile and
    /// poppler page rendering at `dpi`.
    pub fn with_tesseract(dpi: u32) -> Self {
        Self::new(
            Arc::new(TesseractOcr::new()),
            Arc::new(PopplerRasterizer::new(dpi)),
        )
    }

    pub fn ocr_version(&self) -> &str {
        &self.ocr_version
    }

    pub fn extract(&self, file_name: &str, bytes: &[u8]) -> Result<String, ProcessError> {
        let extension = extension_of(file_name);

        let format = DocumentFormat::from_extension(&extension)
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.clone()))?;

        for processor in &self.processors {
            if processor.supports(format) {
                return processor.extract(bytes);
            }
        }

        Err(ProcessError::UnsupportedFormat(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOcr;

    impl OcrEngine for FixedOcr {
        fn recognize(&self, _image: &[u8]) -> Result<String, ProcessError> {
            Ok("scanned text".to_string())
        }

        fn version(&self) -> &str {
            "fixed-ocr"
        }
    }

    struct NoPages;

    impl PageRasterizer for NoPages {
        fn page_count(&self, _pdf: &[u8]) -> Result<usize, ProcessError> {
            Err(ProcessError::PdfProcessing("not a PDF".to_string()))
        }

        fn render_page(&self, _pdf: &[u8], _page: u32) -> Result<Vec<u8>, ProcessError> {
            Err(ProcessError::PdfProcessing("not a PDF".to_string()))
        }
    }

    fn registry() -> ProcessorRegistry {
        ProcessorRegistry::new(Arc::new(FixedOcr), Arc::new(NoPages))
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("scan.PDF"), "pdf");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("uploads/2024/notice.Jpeg"), "jpeg");
        assert_eq!(extension_of("README"), "readme");
    }

    #[test]
    fn test_routes_text() {
        let text = registry().extract("notes.txt", b"Plain notes").unwrap();
        assert_eq!(text, "Plain notes");
    }

    #[test]
    fn test_routes_image_to_ocr() {
        let text = registry().extract("photo.JPG", b"\xff\xd8\xff").unwrap();
        assert_eq!(text, "scanned text");
    }

    #[test]
    fn test_unsupported_format_names_extension() {
        match registry().extract("sheet.xlsx", b"PK") {
            Err(ProcessError::UnsupportedFormat(ext)) => assert_eq!(ext, "xlsx"),
            other => panic!("Expected UnsupportedFormat error, got {:?}", other),
        }
    }

    #[test]
    fn test_no_extension_error() {
        match registry().extract("Makefile", b"all:") {
            Err(ProcessError::UnsupportedFormat(ext)) => assert_eq!(ext, "makefile"),
            other => panic!("Expected UnsupportedFormat error, got {:?}", other),
        }
    }

    #[test]
    fn test_pdf_failure_propagates() {
        let result = registry().extract("broken.pdf", b"garbage");
        assert!(matches!(result, Err(ProcessError::PdfProcessing(_))));
    }

    #[test]
    fn test_ocr_version_reported() {
        assert_eq!(registry().ocr_version(), "fixed-ocr");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_extension("TIFF"), Some(DocumentFormat::Image));
        assert_eq!(DocumentFormat::from_extension("md"), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_extension("docx"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension("doc"), None);
    }
}
