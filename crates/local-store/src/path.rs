//! Identifier to filesystem path mapping.

use std::path::{Path, PathBuf};

use tpcopy_protocol::{BackendError, BackendErrorCode};

/// Directly transferable local files.
pub const FILE_SCHEME: &str = "file://";
/// Local files reachable only through a negotiated reservation.
pub const STAGE_SCHEME: &str = "stage://";

/// Resolves an identifier to an absolute local path.
///
/// Accepts `file://`, `stage://` and bare absolute paths.
pub fn to_path(identifier: &str) -> Result<PathBuf, BackendError> {
    let raw = identifier
        .strip_prefix(FILE_SCHEME)
        .or_else(|| identifier.strip_prefix(STAGE_SCHEME))
        .unwrap_or(identifier);
    let path = Path::new(raw);
    if !path.is_absolute() {
        return Err(BackendError::new(
            BackendErrorCode::InvalidArgument,
            format!("not an absolute local path: {identifier}"),
        ));
    }
    Ok(path.to_path_buf())
}

pub fn file_url(path: &Path) -> String {
    format!("{FILE_SCHEME}{}", path.display())
}

/// Hidden sibling that receives data until a PUT is finalized.
pub fn staging_path(target: &Path, token: &str) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{token}.part"));
    target.with_file_name(name)
}

/// Maps an I/O error to a backend error naming `path`.
pub(crate) fn io_error(path: &Path, e: std::io::Error) -> BackendError {
    let mapped = BackendError::from(e);
    BackendError::new(mapped.code, format!("{}: {}", path.display(), mapped.message))
}
