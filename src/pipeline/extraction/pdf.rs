use std::path::Path;

use lopdf::Document;

use super::pdfium::PdfiumTextSource;
use super::types::{Extraction, PdfTextSource};
use super::ExtractionError;
use crate::models::{ExtractionPayload, PdfContent, PdfPage, SourceKind};

/// Pure-Rust fallback text source built on lopdf's content-stream decoder.
/// Weaker on CID fonts and complex layouts, but needs no native library.
pub struct LopdfTextSource;

impl PdfTextSource for LopdfTextSource {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(ExtractionError::PdfEncrypted);
        }

        let texts = doc
            .get_pages()
            .keys()
            .map(|&number| match doc.extract_text(&[number]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(page = number, error = %e, "Page has no decodable text");
                    String::new()
                }
            })
            .collect();
        Ok(texts)
    }
}

/// PDF extraction: primary source first, fallback on any primary error.
pub struct PdfExtractor {
    primary: Box<dyn PdfTextSource>,
    fallback: Box<dyn PdfTextSource>,
}

impl PdfExtractor {
    pub fn new(primary: Box<dyn PdfTextSource>, fallback: Box<dyn PdfTextSource>) -> Self {
        Self { primary, fallback }
    }

    pub fn extract(&self, path: &Path) -> Extraction {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return Extraction::empty(SourceKind::Pdf, format!("cannot read file: {e}")),
        };

        let primary_err = match self.primary.page_texts(&bytes) {
            Ok(texts) => return Extraction::Complete(pdf_payload(texts)),
            Err(e) => e,
        };
        tracing::warn!(
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            error = %primary_err,
            "Primary PDF extraction failed, trying fallback"
        );

        match self.fallback.page_texts(&bytes) {
            Ok(texts) => Extraction::Complete(pdf_payload(texts)),
            Err(fallback_err) => Extraction::empty(
                SourceKind::Pdf,
                format!(
                    "{}: {primary_err}; {}: {fallback_err}",
                    self.primary.name(),
                    self.fallback.name()
                ),
            ),
        }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new(Box::new(PdfiumTextSource), Box::new(LopdfTextSource))
    }
}

/// Keep pages that carry text, numbered by their position in the document.
fn pdf_payload(texts: Vec<String>) -> ExtractionPayload {
    let pages = texts
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| PdfPage {
            page: i as u32 + 1,
            text,
        })
        .collect();
    ExtractionPayload::Pdf(PdfContent::from_pages(pages))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Generate a valid PDF with one text page per entry using lopdf.
    /// An empty entry produces a page with no content.
    pub(crate) fn make_test_pdf(pages: &[&str]) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Object, Stream};

        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources = dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        };

        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for text in pages {
            let content = if text.is_empty() {
                String::new()
            } else {
                format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET")
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => resources.clone(),
            });
            kids.push(Object::from(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    struct FixedSource(Vec<&'static str>);

    impl PdfTextSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn page_texts(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct BrokenSource;

    impl PdfTextSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        fn page_texts(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
            Err(ExtractionError::PdfParsing("corrupt xref".into()))
        }
    }

    fn write_pdf(dir: &Path, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join("doc.pdf");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn pages_of(extraction: &Extraction) -> &PdfContent {
        match extraction.payload() {
            ExtractionPayload::Pdf(content) => content,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn lopdf_extracts_text_from_digital_pdf() {
        let pdf = make_test_pdf(&["Hello World from Intake"]);
        let texts = LopdfTextSource.page_texts(&pdf).unwrap();
        assert_eq!(texts.len(), 1);
        assert!(
            texts[0].contains("Hello") || texts[0].contains("World"),
            "Expected extracted text, got: {:?}",
            texts[0]
        );
    }

    #[test]
    fn lopdf_rejects_invalid_pdf() {
        assert!(LopdfTextSource.page_texts(b"not a pdf").is_err());
    }

    #[test]
    fn primary_result_used_and_blank_pages_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), b"%PDF-1.4");
        let extractor = PdfExtractor::new(
            Box::new(FixedSource(vec!["Intro", "", "  \n", "Summary"])),
            Box::new(BrokenSource),
        );

        let extraction = extractor.extract(&path);
        assert!(!extraction.is_degraded());
        let content = pages_of(&extraction);
        assert_eq!(content.page_count, 2);
        assert_eq!(content.pages[0].page, 1);
        assert_eq!(content.pages[1].page, 4);
        assert_eq!(content.pages[1].text, "Summary");
    }

    #[test]
    fn fallback_used_when_primary_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), &make_test_pdf(&["Fallback text", ""]));
        let extractor = PdfExtractor::new(Box::new(BrokenSource), Box::new(LopdfTextSource));

        let extraction = extractor.extract(&path);
        assert!(!extraction.is_degraded());
        let content = pages_of(&extraction);
        assert_eq!(content.page_count, 1);
        assert_eq!(content.pages[0].page, 1);
        assert!(content.pages[0].text.contains("Fallback"));
    }

    #[test]
    fn both_failing_degrades_with_empty_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), b"garbage");
        let extractor = PdfExtractor::new(Box::new(BrokenSource), Box::new(BrokenSource));

        let extraction = extractor.extract(&path);
        assert!(extraction.is_degraded());
        let content = pages_of(&extraction);
        assert!(content.pages.is_empty());
        assert_eq!(content.page_count, 0);
        assert!(content.error.as_deref().unwrap().contains("corrupt xref"));
    }

    #[test]
    fn unreadable_file_degrades() {
        let extraction = PdfExtractor::new(Box::new(BrokenSource), Box::new(BrokenSource))
            .extract(Path::new("/nonexistent/doc.pdf"));
        assert!(extraction.is_degraded());
        assert_eq!(extraction.payload().kind(), SourceKind::Pdf);
    }
}
