//! User script resolution.
//!
//! Scripts are opaque launchable units living in one directory. A request
//! names a file; it must resolve to an existing file directly inside that
//! directory with one of the configured extensions.

use super::launcher::LaunchSpec;
use crate::error::{ConsoleError, Result};
use std::path::{Path, PathBuf};

/// Resolve `file_name` inside `scripts_dir`.
///
/// # Errors
/// - [`ConsoleError::Validation`] for names with path components or a
///   disallowed extension
/// - [`ConsoleError::ScriptNotFound`] if the file does not exist
pub fn resolve_script(scripts_dir: &Path, file_name: &str, extensions: &[String]) -> Result<PathBuf> {
    let invalid = |message: &str| ConsoleError::Validation {
        field: "script_name".to_string(),
        message: message.to_string(),
    };

    if file_name.trim().is_empty() {
        return Err(invalid("script name must not be empty"));
    }

    let is_bare_name = Path::new(file_name)
        .file_name()
        .is_some_and(|name| name == file_name)
        && !file_name.contains(['/', '\\']);
    if !is_bare_name || file_name == ".." {
        return Err(invalid("script name must not contain path components"));
    }

    let lower = file_name.to_lowercase();
    if !extensions.iter().any(|ext| lower.ends_with(&ext.to_lowercase())) {
        return Err(invalid("script type is not allowed"));
    }

    let path = scripts_dir.join(file_name);
    if !path.is_file() {
        return Err(ConsoleError::ScriptNotFound(path));
    }

    Ok(path)
}

/// How to execute a resolved script, chosen by extension.
pub fn script_launch_spec(path: &Path, scripts_dir: &Path) -> LaunchSpec {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let path_str = path.to_string_lossy().into_owned();

    let spec = match extension.as_str() {
        "ps1" => LaunchSpec::new("powershell")
            .with_arg("-ExecutionPolicy")
            .with_arg("Bypass")
            .with_arg("-File")
            .with_arg(path_str),
        "sh" => LaunchSpec::new("sh").with_arg(path_str),
        _ => LaunchSpec::new(path_str),
    };

    spec.with_cwd(scripts_dir)
}
