use std::path::Path;
use std::sync::Arc;

use ::image::{ColorType, GenericImageView, ImageFormat};

use super::types::{Extraction, OcrEngine};
use super::ExtractionError;
use crate::models::{ExtractionPayload, ImageContent};

/// Reads image metadata and, when an engine is configured, recognized text.
pub struct ImageExtractor {
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl ImageExtractor {
    pub fn new(ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        Self { ocr }
    }

    pub fn extract(&self, path: &Path) -> Extraction {
        let mut content = match read_metadata(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(error = %e, "Image could not be decoded");
                return Extraction::degraded(
                    ExtractionPayload::Image(ImageContent::default()),
                    e.to_string(),
                );
            }
        };

        let Some(engine) = &self.ocr else {
            return Extraction::degraded(
                ExtractionPayload::Image(content),
                "text recognition unavailable",
            );
        };

        let recognized = std::fs::read(path)
            .map_err(ExtractionError::from)
            .and_then(|bytes| engine.recognize(&bytes));
        match recognized {
            Ok(text) => {
                content.text = Some(text.trim().to_string());
                Extraction::Complete(ExtractionPayload::Image(content))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Text recognition failed");
                Extraction::degraded(
                    ExtractionPayload::Image(content),
                    format!("text recognition failed: {e}"),
                )
            }
        }
    }
}

fn read_metadata(path: &Path) -> Result<ImageContent, ExtractionError> {
    let reader = ::image::io::Reader::open(path)?.with_guessed_format()?;
    let format = reader.format();
    let img = reader
        .decode()
        .map_err(|e| ExtractionError::ImageProcessing(e.to_string()))?;
    let (width, height) = img.dimensions();

    Ok(ImageContent {
        text: None,
        width: Some(width),
        height: Some(height),
        color_mode: Some(color_mode_name(img.color()).to_string()),
        format: format.map(format_name),
        error: None,
    })
}

/// Conventional short mode names ("L", "RGB", "RGBA", ...).
fn color_mode_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 | ColorType::Bgr8 => "RGB",
        ColorType::Rgba8 | ColorType::Bgra8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        _ => "unknown",
    }
}

fn format_name(format: ImageFormat) -> String {
    format!("{format:?}").to_uppercase()
}
