use std::path::Path;

use super::ValidationError;
use crate::models::SourceKind;

/// Longest stored file name, in bytes. Most filesystems cap a path
/// component at 255 bytes, not characters.
const MAX_FILE_NAME_BYTES: usize = 255;

/// Fallback name when nothing usable survives sanitization.
const FALLBACK_FILE_NAME: &str = "upload";

/// Resolve a caller-declared kind. `excel` is accepted as a legacy alias.
pub fn parse_declared_kind(declared: &str) -> Option<SourceKind> {
    match declared.trim().to_ascii_lowercase().as_str() {
        "pdf" => Some(SourceKind::Pdf),
        "spreadsheet" | "excel" => Some(SourceKind::Spreadsheet),
        "image" => Some(SourceKind::Image),
        _ => None,
    }
}

/// Lowercased text after the final `.`, or empty when there is none.
pub fn file_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Check that the file name's extension belongs to the declared kind.
///
/// Extension checking is the whole check: content sniffing is left to the
/// sanitizer and extractors, which fail soft on content that lies.
pub fn validate_upload(declared: &str, file_name: &str) -> Result<SourceKind, ValidationError> {
    let kind = parse_declared_kind(declared)
        .ok_or_else(|| ValidationError::UnsupportedKind(declared.trim().to_string()))?;

    let extension = file_extension(file_name);
    if kind.allowed_extensions().contains(&extension.as_str()) {
        Ok(kind)
    } else {
        Err(ValidationError::ExtensionMismatch {
            declared: declared.trim().to_string(),
            extension,
        })
    }
}

/// Reject empty uploads and uploads over `limit` bytes.
pub fn check_size(size: u64, limit: u64) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError::Empty);
    }
    if size > limit {
        return Err(ValidationError::TooLarge { size, limit });
    }
    Ok(())
}

/// Reduce a client-supplied name to a single safe path component.
///
/// Overlong names lose the end of their stem; the extension survives so
/// validation still sees what the client sent.
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(FALLBACK_FILE_NAME);

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0') && !c.is_control())
        .collect();
    let clean = clean.trim();

    if clean.is_empty() || clean == "." || clean == ".." {
        FALLBACK_FILE_NAME.to_string()
    } else {
        fit_file_name(clean)
    }
}

/// Shorten `name` to `MAX_FILE_NAME_BYTES`, cutting the stem at a char
/// boundary and keeping `.ext`.
fn fit_file_name(name: &str) -> String {
    if name.len() <= MAX_FILE_NAME_BYTES {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() + 1 < MAX_FILE_NAME_BYTES => {
            let stem = truncate_bytes(stem, MAX_FILE_NAME_BYTES - ext.len() - 1);
            format!("{stem}.{ext}")
        }
        _ => truncate_bytes(name, MAX_FILE_NAME_BYTES).to_string(),
    }
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
