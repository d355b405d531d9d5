use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::error::ProcessError;
use crate::processor::ocr::OcrEngine;
use crate::processor::{DocumentFormat, DocumentProcessor};

/// Separator placed between the OCR output of consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Turns PDF pages into images for OCR.
pub trait PageRasterizer: Send + Sync {
    fn page_count(&self, pdf: &[u8]) -> Result<usize, ProcessError>;

    /// Renders page `page` (1-based) to PNG bytes.
    fn render_page(&self, pdf: &[u8], page: u32) -> Result<Vec<u8>, ProcessError>;
}

/// Every page is rasterized and OCR'd, in page order. A page that cannot be
/// rendered or recognized fails the whole document.
pub struct PdfProcessor {
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl PdfProcessor {
    pub fn new(ocr: Arc<dyn OcrEngine>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self { ocr, rasterizer }
    }
}

impl DocumentProcessor for PdfProcessor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.pdf").entered();

        let page_count = self.rasterizer.page_count(bytes)?;
        let last_page = u32::try_from(page_count).map_err(|_| {
            ProcessError::PdfProcessing(format!("PDF reports {} pages, too many to render", page_count))
        })?;
        tracing::debug!(pages = page_count, "Rasterizing PDF");

        let mut pages = Vec::with_capacity(page_count);
        for page_num in 1..=last_page {
            let image = self.rasterizer.render_page(bytes, page_num)?;
            let text = self.ocr.recognize(&image).map_err(|e| {
                ProcessError::PdfProcessing(format!("page {}: {}", page_num, e))
            })?;
            pages.push(text);
        }

        Ok(pages.join(PAGE_SEPARATOR))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

/// Rasterizer backed by poppler-utils (`pdfinfo`, `pdftoppm`).
pub struct PopplerRasterizer {
    dpi: u32,
}

impl PopplerRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

impl PageRasterizer for PopplerRasterizer {
    fn page_count(&self, pdf: &[u8]) -> Result<usize, ProcessError> {
        match lopdf::Document::load_mem(pdf) {
            Ok(doc) => Ok(doc.get_pages().len()),
            Err(e) => {
                // lopdf rejects some damaged cross-reference tables that poppler reads fine
                tracing::warn!(error = %e, "lopdf could not parse PDF, asking pdfinfo");
                count_pdf_pages(pdf)
            }
        }
    }

    fn render_page(&self, pdf: &[u8], page: u32) -> Result<Vec<u8>, ProcessError> {
        render_pdf_page_to_image(pdf, page, self.dpi)
    }
}

fn pdf_error(context: &str, e: impl std::fmt::Display) -> ProcessError {
    ProcessError::PdfProcessing(format!("{}: {}", context, e))
}

/// Copies the PDF to a named temp file for the poppler tools. The file is
/// removed when the handle drops.
fn spill_pdf(pdf: &[u8]) -> Result<NamedTempFile, ProcessError> {
    let mut file = tempfile::Builder::new()
        .prefix("docintel_")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| pdf_error("Failed to create temp PDF", e))?;
    file.write_all(pdf)
        .and_then(|()| file.flush())
        .map_err(|e| pdf_error("Failed to write temp PDF", e))?;
    Ok(file)
}

fn run_poppler(command: &mut Command, tool: &str) -> Result<Vec<u8>, ProcessError> {
    let output = command.output().map_err(|e| {
        ProcessError::PdfProcessing(format!(
            "Could not start {} ({}); poppler-utils must be on PATH",
            tool, e
        ))
    })?;

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "{} exited with {}: {}",
            tool,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output.stdout)
}

fn count_pdf_pages(pdf: &[u8]) -> Result<usize, ProcessError> {
    let spilled = spill_pdf(pdf)?;
    let stdout = run_poppler(Command::new("pdfinfo").arg(spilled.path()), "pdfinfo")?;

    parse_page_count(&String::from_utf8_lossy(&stdout)).ok_or_else(|| {
        ProcessError::PdfProcessing("pdfinfo did not report a page count".to_string())
    })
}

fn parse_page_count(pdfinfo_output: &str) -> Option<usize> {
    pdfinfo_output
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
}

/// Renders one page into a scratch directory and reads the PNG back.
fn render_pdf_page_to_image(pdf: &[u8], page_num: u32, dpi: u32) -> Result<Vec<u8>, ProcessError> {
    let spilled = spill_pdf(pdf)?;
    let scratch = tempfile::tempdir().map_err(|e| pdf_error("Failed to create render dir", e))?;
    let page = page_num.to_string();
    let dpi = dpi.to_string();

    run_poppler(
        Command::new("pdftoppm")
            .args(["-png", "-r", dpi.as_str(), "-f", page.as_str(), "-l", page.as_str()])
            .arg(spilled.path())
            .arg(scratch.path().join("page")),
        "pdftoppm",
    )?;

    // pdftoppm pads the page suffix to the width of the page count, so the
    // file name is not predictable; the scratch dir holds exactly one image
    let rendered = first_png(scratch.path())?.ok_or_else(|| {
        ProcessError::PdfProcessing(format!("pdftoppm produced no image for page {}", page_num))
    })?;

    std::fs::read(&rendered).map_err(|e| pdf_error("Failed to read rendered page", e))
}

fn first_png(dir: &Path) -> Result<Option<PathBuf>, ProcessError> {
    let entries = std::fs::read_dir(dir).map_err(|e| pdf_error("Failed to list render dir", e))?;
    Ok(entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| path.extension().is_some_and(|ext| ext == "png")))
}
