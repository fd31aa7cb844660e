//! Format-specific content extraction.
//!
//! Extractors report problems through `ExtractionError` internally; the
//! dispatcher folds every failure into `Extraction::Degraded`, so nothing
//! here can fail an upload.

pub mod dispatch;
pub mod image;
pub mod ocr;
pub mod pdf;
pub mod pdfium;
pub mod spreadsheet;
pub mod types;

pub use dispatch::*;
pub use ocr::*;
pub use pdf::*;
pub use spreadsheet::*;
pub use types::*;

pub use self::image::ImageExtractor;
pub use self::pdfium::PdfiumTextSource;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF is password-protected")]
    PdfEncrypted,

    #[error("PDFium unavailable: {0}")]
    PdfiumUnavailable(String),

    #[error("Workbook could not be read: {0}")]
    Spreadsheet(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),
}
