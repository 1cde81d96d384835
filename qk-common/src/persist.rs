//! Whole-file document persistence
//!
//! Every persisted artifact is rewritten as a unit: the new contents go to a
//! sibling `<name>.tmp` file which is synced and then renamed over the
//! original. A crash at any point leaves either the previous file or the new
//! one on disk, never a torn mix of both.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sibling temp path used while a document is being replaced
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically replace `path` with `bytes` (write temp, fsync, rename)
///
/// On Unix the file is created with 0600 permissions.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = temp_path_for(path);

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&temp, path)?;
        Ok(())
    })();

    if result.is_err() && temp.is_file() {
        // Leave nothing half-written next to the original
        let _ = fs::remove_file(&temp);
    }

    if result.is_ok() {
        debug!(path = %path.display(), bytes = bytes.len(), "Document replaced");
    }
    result
}

/// Serialize `value` as 4-space indented JSON
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

/// Atomically replace `path` with the JSON form of `value`
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = to_pretty_json(value)?;
    write_atomic(path, &bytes)
}

/// Read a text document, `None` when the file does not exist
pub fn read_text_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read a JSON document, falling back to `T::default()` when the file is missing
///
/// A present but unparseable document is an [`Error::Corrupt`], not a default.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match read_text_optional(path)? {
        None => {
            debug!(path = %path.display(), "Document missing, starting empty");
            Ok(T::default())
        }
        Some(text) => serde_json::from_str(&text).map_err(|e| Error::corrupt(path, e.to_string())),
    }
}
