//! Layout-aware PDF text via Google PDFium.
//!
//! `PdfiumTextSource` is stateless (`Send + Sync`). Each call binds a fresh
//! `Pdfium` instance; the OS caches the `dlopen`, so repeat binds are cheap.

use pdfium_render::prelude::*;
use tracing::debug;

use super::types::PdfTextSource;
use super::ExtractionError;

/// Primary PDF text source.
///
/// Library discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to the library file)
/// 2. Alongside the running executable, then `<exe_dir>/lib`
/// 3. System library search paths
pub struct PdfiumTextSource;

impl PdfTextSource for PdfiumTextSource {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        let mut texts = Vec::with_capacity(document.pages().len() as usize);
        for page in document.pages().iter() {
            let text = page
                .text()
                .map_err(|e| ExtractionError::PdfParsing(format!("page text layer: {e}")))?;
            texts.push(text.all());
        }

        debug!(pages = texts.len(), "PDFium text extraction finished");
        Ok(texts)
    }
}

fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            ExtractionError::PdfiumUnavailable(format!("cannot load {path}: {e}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            for dir in [exe_dir.to_path_buf(), exe_dir.join("lib")] {
                let lib_path =
                    Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium next to executable");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ExtractionError::PdfiumUnavailable(format!(
            "library not found, set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Map PDF load errors, singling out encrypted documents.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let lower = e.to_string().to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfEncrypted
    } else {
        ExtractionError::PdfParsing(format!("PDFium could not load document: {e}"))
    }
}
