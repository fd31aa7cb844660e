use std::path::Path;
use std::sync::Arc;

use super::types::OcrEngine;
#[cfg(feature = "ocr")]
use super::ExtractionError;

/// Tesseract OCR engine.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    tessdata_dir: std::path::PathBuf,
    lang: String,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    /// Initialize with a tessdata directory containing at least English.
    pub fn new(tessdata_dir: &Path) -> Result<Self, ExtractionError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(ExtractionError::TessdataNotFound(tessdata_dir.to_path_buf()));
        }
        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            lang: "eng".to_string(),
        })
    }

    /// Set language(s) for OCR (e.g., "eng", "eng+fra")
    pub fn with_languages(mut self, langs: &str) -> Self {
        self.lang = langs.to_string();
        self
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, ExtractionError> {
        let tessdata = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?;

        let mut tess = tesseract::Tesseract::new(Some(tessdata), Some(self.lang.as_str()))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        tess.get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))
    }
}

/// Build the OCR engine for this build, if any.
///
/// Returns `None` when the crate was compiled without `ocr`, when no
/// tessdata directory is configured, or when Tesseract cannot start. Image
/// uploads then extract metadata only.
pub fn default_ocr_engine(tessdata_dir: Option<&Path>) -> Option<Arc<dyn OcrEngine>> {
    let Some(dir) = tessdata_dir else {
        tracing::info!("No tessdata directory configured, text recognition disabled");
        return None;
    };

    start_engine(dir)
}

#[cfg(feature = "ocr")]
fn start_engine(dir: &Path) -> Option<Arc<dyn OcrEngine>> {
    match TesseractOcr::new(dir) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            tracing::warn!(error = %e, "Tesseract unavailable, text recognition disabled");
            None
        }
    }
}

#[cfg(not(feature = "ocr"))]
fn start_engine(dir: &Path) -> Option<Arc<dyn OcrEngine>> {
    tracing::info!(
        tessdata = %dir.display(),
        "Built without the ocr feature, text recognition disabled"
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_tessdata_means_no_engine() {
        assert!(default_ocr_engine(None).is_none());
    }

    #[test]
    fn empty_tessdata_dir_means_no_engine() {
        let dir = tempfile::tempdir().unwrap();
        assert!(default_ocr_engine(Some(dir.path())).is_none());
    }

    #[cfg(feature = "ocr")]
    #[test]
    fn tesseract_rejects_missing_tessdata() {
        let dir = tempfile::tempdir().unwrap();
        let result = TesseractOcr::new(dir.path());
        assert!(matches!(result, Err(ExtractionError::TessdataNotFound(_))));
    }
}
