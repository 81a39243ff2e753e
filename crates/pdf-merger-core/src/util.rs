//! Utility functions shared across the crate.

use std::path::{Path, PathBuf};

/// Fallback name for uploads whose filename sanitizes to nothing.
const FALLBACK_FILENAME: &str = "document.pdf";

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Get the user's cache directory following XDG conventions.
///
/// Returns `$XDG_CACHE_HOME` if set, otherwise `$HOME/.cache`.
pub fn cache_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
}

/// Get the default root for per-session upload directories.
pub fn default_upload_root() -> PathBuf {
    cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("pdf-merger")
        .join("uploads")
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Directory components (either separator) are dropped, whitespace becomes
/// `_`, and anything outside `[A-Za-z0-9._-]` is removed. Leading dots and
/// underscores are trimmed so the result can never be `..` or a hidden file.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);

    let mut cleaned = String::with_capacity(base.len());
    for word in base.split_whitespace() {
        if !cleaned.is_empty() {
            cleaned.push('_');
        }
        cleaned.extend(
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')),
        );
    }

    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Remove a directory tree, treating an already-missing directory as success.
pub fn remove_dir_if_exists(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
