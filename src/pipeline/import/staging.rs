use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::models::Identity;

/// Directory holding one identity's stored uploads.
pub fn identity_dir(uploads_root: &Path, owner: &Identity) -> PathBuf {
    uploads_root.join(owner.as_str())
}

/// Final location of a stored upload.
pub fn stored_path(uploads_root: &Path, owner: &Identity, file_name: &str) -> PathBuf {
    identity_dir(uploads_root, owner).join(file_name)
}

/// Write `bytes` to a private temp file in the identity's directory.
///
/// Scanning, sanitizing and hashing work on the staged file. It only takes
/// its final name through `place_staged`; dropping it discards the upload
/// without touching any file a committed source points at.
pub fn stage_upload(uploads_root: &Path, owner: &Identity, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let dir = identity_dir(uploads_root, owner);
    std::fs::create_dir_all(&dir)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".intake-")
        .suffix(".part")
        .tempfile_in(&dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;

    tracing::debug!(size = bytes.len(), "Upload staged");
    Ok(staged)
}

/// Rename a staged upload onto `target`. A same-named file already present
/// is replaced, so readers see either the old or the new bytes.
pub fn place_staged(staged: NamedTempFile, target: &Path) -> io::Result<()> {
    staged.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Remove a stored upload. Returns `Ok(false)` when it was already gone.
pub fn remove_stored(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
