use std::sync::Arc;

use crate::error::ProcessError;
use crate::processor::ocr::OcrEngine;
use crate::processor::{DocumentFormat, DocumentProcessor};

pub struct ImageProcessor {
    ocr: Arc<dyn OcrEngine>,
}

impl ImageProcessor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }
}

impl DocumentProcessor for ImageProcessor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.image", bytes = bytes.len()).entered();

        if bytes.is_empty() {
            return Err(ProcessError::ImageProcessing("image is empty".to_string()));
        }

        self.ocr.recognize(bytes)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Image)
    }
}
