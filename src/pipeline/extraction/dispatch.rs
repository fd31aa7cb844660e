use std::path::Path;
use std::sync::Arc;

use super::image::ImageExtractor;
use super::pdf::PdfExtractor;
use super::spreadsheet::SpreadsheetExtractor;
use super::types::{Extraction, OcrEngine};
use crate::models::SourceKind;

/// Routes a stored file to the extractor for its kind.
pub struct ExtractionDispatcher {
    pdf: PdfExtractor,
    spreadsheet: SpreadsheetExtractor,
    image: ImageExtractor,
}

impl ExtractionDispatcher {
    pub fn new(pdf: PdfExtractor, spreadsheet: SpreadsheetExtractor, image: ImageExtractor) -> Self {
        Self {
            pdf,
            spreadsheet,
            image,
        }
    }

    /// Default extractors, with text recognition only if `ocr` is given.
    pub fn with_ocr(ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        Self::new(
            PdfExtractor::default(),
            SpreadsheetExtractor,
            ImageExtractor::new(ocr),
        )
    }

    /// Never fails; every problem comes back as `Extraction::Degraded`
    /// with a payload of the requested kind.
    pub fn extract(&self, path: &Path, kind: SourceKind) -> Extraction {
        let extraction = match kind {
            SourceKind::Pdf => self.pdf.extract(path),
            SourceKind::Spreadsheet => self.spreadsheet.extract(path),
            SourceKind::Image => self.image.extract(path),
        };
        debug_assert_eq!(extraction.payload().kind(), kind);
        extraction
    }
}
