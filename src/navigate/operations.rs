//! Navigation operations implementation

use crate::error::NavigateError;

/// Virtual root every session starts in
pub const ROOT_PATH: &str = "/";

/// Computes the new working directory for a CWD request.
///
/// The root resets the session to `/`; any other target is stored verbatim.
pub fn change_directory(target_path: &str) -> Result<String, NavigateError> {
    if target_path.is_empty() {
        return Err(NavigateError::InvalidPath("Empty path provided".into()));
    }

    if target_path.contains(['\r', '\n', '\0']) {
        return Err(NavigateError::InvalidPath(target_path.escape_default().to_string()));
    }

    if target_path == ROOT_PATH {
        return Ok(ROOT_PATH.to_string());
    }

    Ok(target_path.to_string())
}
