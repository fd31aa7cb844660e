use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::ImageOutputFormat;
use lopdf::{Dictionary, Document, Object};
use tempfile::NamedTempFile;

use crate::models::SourceKind;

/// PDF keys that carry scripts, auto-run actions or embedded payloads.
const ACTIVE_CONTENT_KEYS: &[&[u8]] = &[
    b"JavaScript",
    b"JS",
    b"OpenAction",
    b"AA",
    b"Launch",
    b"EmbeddedFiles",
    b"RichMedia",
    b"SubmitForm",
    b"ImportData",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeReport {
    pub success: bool,
    /// File later stages must read. Equal to the input path for the
    /// shipped sanitizer, which rewrites in place.
    pub path: PathBuf,
    pub detail: String,
}

impl SanitizeReport {
    fn ok(path: &Path, detail: impl Into<String>) -> Self {
        Self {
            success: true,
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }

    fn failed(path: &Path, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }
}

/// Active-content removal abstraction. Failure is reported, never raised.
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, path: &Path, kind: SourceKind) -> SanitizeReport;
}

/// Rewrites PDFs without active content and re-encodes images.
/// Spreadsheets pass through untouched.
pub struct ContentSanitizer;

impl Sanitizer for ContentSanitizer {
    fn sanitize(&self, path: &Path, kind: SourceKind) -> SanitizeReport {
        let result = match kind {
            SourceKind::Pdf => sanitize_pdf(path),
            SourceKind::Image => reencode_image(path),
            SourceKind::Spreadsheet => Ok("sanitization not applicable".to_string()),
        };

        match result {
            Ok(detail) => SanitizeReport::ok(path, detail),
            Err(reason) => {
                tracing::warn!(kind = %kind, reason = %reason, "Sanitization failed");
                SanitizeReport::failed(path, reason)
            }
        }
    }
}

fn sanitize_pdf(path: &Path) -> Result<String, String> {
    let mut doc = Document::load(path).map_err(|e| format!("cannot parse PDF: {e}"))?;

    let mut removed = strip_dictionary(&mut doc.trailer);
    for object in doc.objects.values_mut() {
        removed += strip_object(object);
    }

    replace_atomically(path, |out| {
        doc.save_to(out).map(|_| ()).map_err(|e| e.to_string())
    })?;

    tracing::debug!(removed, "PDF active content stripped");
    Ok(format!("removed {removed} active-content entries"))
}

fn strip_object(object: &mut Object) -> usize {
    match object {
        Object::Dictionary(dict) => strip_dictionary(dict),
        Object::Stream(stream) => strip_dictionary(&mut stream.dict),
        Object::Array(items) => items.iter_mut().map(strip_object).sum(),
        _ => 0,
    }
}

/// Remove active-content keys from `dict` and any dictionaries nested in it.
fn strip_dictionary(dict: &mut Dictionary) -> usize {
    let mut removed = 0;
    for key in ACTIVE_CONTENT_KEYS {
        if dict.remove(key).is_some() {
            removed += 1;
        }
    }
    for (_, value) in dict.iter_mut() {
        removed += strip_object(value);
    }
    removed
}

fn reencode_image(path: &Path) -> Result<String, String> {
    let reader = image::io::Reader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| format!("cannot open image: {e}"))?;
    let format = reader
        .format()
        .ok_or_else(|| "unrecognized image format".to_string())?;
    let img = reader
        .decode()
        .map_err(|e| format!("cannot decode image: {e}"))?;

    replace_atomically(path, |out| {
        img.write_to(out, ImageOutputFormat::from(format))
            .map_err(|e| e.to_string())
    })?;

    Ok(format!("re-encoded as {format:?}"))
}

/// Write a replacement next to `path`, then rename it over the original.
/// The original is left untouched if writing fails.
fn replace_atomically(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<&mut std::fs::File>) -> Result<(), String>,
) -> Result<(), String> {
    let dir = path
        .parent()
        .ok_or_else(|| "stored file has no parent directory".to_string())?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| e.to_string())?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write(&mut out)?;
        out.flush().map_err(|e| e.to_string())?;
    }
    tmp.as_file().sync_all().map_err(|e| e.to_string())?;
    tmp.persist(path).map_err(|e| e.error.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    /// PDF whose catalog auto-runs a script and carries embedded files.
    fn make_active_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");

        let content = Stream::new(dictionary! {}, b"BT /F1 12 Tf 72 700 Td (Hi) Tj ET".to_vec());
        let content_id = doc.add_object(content);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "AA" => dictionary! { "O" => dictionary! { "S" => "JavaScript", "JS" => Object::string_literal("app.alert(1)") } },
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });
        if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
            page.set("Parent", pages_id);
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "OpenAction" => dictionary! { "S" => "JavaScript", "JS" => Object::string_literal("app.alert(2)") },
            "Names" => dictionary! {
                "JavaScript" => dictionary! { "Names" => Vec::<Object>::new() },
                "EmbeddedFiles" => dictionary! { "Names" => Vec::<Object>::new() },
            },
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn pdf_active_content_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active.pdf");
        std::fs::write(&path, make_active_pdf()).unwrap();

        let report = ContentSanitizer.sanitize(&path, SourceKind::Pdf);
        assert!(report.success, "{}", report.detail);
        assert_eq!(report.path, path);

        let cleaned = std::fs::read(&path).unwrap();
        assert!(!contains(&cleaned, b"/OpenAction"));
        assert!(!contains(&cleaned, b"/JavaScript"));
        assert!(!contains(&cleaned, b"/EmbeddedFiles"));
        assert!(!contains(&cleaned, b"app.alert"));

        // Still a loadable document with its page
        let doc = Document::load_mem(&cleaned).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn malformed_pdf_reports_failure_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 this is not a real document").unwrap();

        let report = ContentSanitizer.sanitize(&path, SourceKind::Pdf);
        assert!(!report.success);
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"%PDF-1.4 this is not a real document"
        );
    }

    #[test]
    fn image_reencoded_in_same_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
        img.save(&path).unwrap();

        // Trailing bytes after IEND are not part of the image
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(b"<script>payload</script>");
        std::fs::write(&path, &bytes).unwrap();

        let report = ContentSanitizer.sanitize(&path, SourceKind::Image);
        assert!(report.success, "{}", report.detail);

        let cleaned = std::fs::read(&path).unwrap();
        assert!(!contains(&cleaned, b"payload"));
        let decoded = image::open(&path).unwrap();
        assert_eq!(image::GenericImageView::dimensions(&decoded), (4, 3));
    }

    #[test]
    fn undecodable_image_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.png");
        std::fs::write(&path, b"not an image at all").unwrap();

        let report = ContentSanitizer.sanitize(&path, SourceKind::Image);
        assert!(!report.success);
    }

    #[test]
    fn spreadsheet_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        std::fs::write(&path, b"PK\x03\x04").unwrap();

        let report = ContentSanitizer.sanitize(&path, SourceKind::Spreadsheet);
        assert!(report.success);
        assert_eq!(report.detail, "sanitization not applicable");
        assert_eq!(std::fs::read(&path).unwrap(), b"PK\x03\x04");
    }

    #[test]
    fn no_temp_files_left_after_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active.pdf");
        std::fs::write(&path, make_active_pdf()).unwrap();
        ContentSanitizer.sanitize(&path, SourceKind::Pdf);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
