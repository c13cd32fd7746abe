//! Cloud-init user-data loading for the create request.
//!
//! The provider expects the cloud-init payload base64-encoded inside the
//! create request's OS configuration. A driver without a configured user-data
//! file sends an empty payload; a configured but unreadable file is a hard
//! error so a machine is never provisioned with silently missing first-boot
//! configuration.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::warn;

/// Errors raised while resolving cloud-init user-data.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum UserDataError {
    /// Raised when the configured user-data file cannot be read.
    #[error("failed to read user data file `{path}`: {message}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// Reads the configured user-data file and base64-encodes its contents.
///
/// Returns an empty string when no file is configured.
///
/// # Errors
///
/// Returns [`UserDataError::Read`] when a file is configured but unreadable.
pub fn encoded_user_data(file: Option<&Utf8Path>) -> Result<String, UserDataError> {
    let Some(path) = file else {
        return Ok(String::new());
    };

    let bytes = read_ambient(path).map_err(|message| {
        warn!("failed to read user data file {path}: {message}");
        UserDataError::Read {
            path: path.to_string(),
            message,
        }
    })?;

    Ok(BASE64_STANDARD.encode(bytes))
}

/// Reads a file through an ambient-authority capability handle.
///
/// Absolute paths open the parent directory; relative paths resolve against
/// the current directory.
pub(crate) fn read_ambient(path: &Utf8Path) -> Result<Vec<u8>, String> {
    let (dir_path, file_path) = if path.is_absolute() {
        let parent = path
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path}"))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read(file_path).map_err(|err| err.to_string())
}
