//! Path validation and escaping for paths that end up inside generated
//! configuration text.
//!
//! `normalize`/`escape_for_config` produce strings for *embedding* into
//! Dockerfile/compose output. Real filesystem calls must always use the
//! unescaped `Path` forms.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

/// Upper bound on accepted path length. Generously above every real
/// platform limit; anything longer is treated as hostile input.
pub const MAX_PATH_LEN: usize = 4000;

/// Shell/template metacharacters that force quoting in `escape_for_config`.
const META_CHARS: &[char] = &[
    ' ', '\t', '"', '\'', '$', '`', '\\', '&', '|', ';', '(', ')', '<', '>', '*', '?', '#',
];

/// Returns false for paths containing NUL bytes, `..` traversal segments,
/// or exceeding [`MAX_PATH_LEN`]. Pure, no filesystem access.
pub fn is_valid_path(path: &str) -> bool {
    if path.is_empty() || path.len() > MAX_PATH_LEN {
        return false;
    }
    if path.contains('\0') {
        return false;
    }
    !Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

/// Resolves `path` against the current directory and converts separators
/// to forward slashes, the single canonical form used in generated text.
pub fn normalize(path: &Path) -> anyhow::Result<String> {
    let absolute: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(absolute.to_string_lossy().replace('\\', "/"))
}

/// Quotes and escapes `path` if it contains whitespace or shell/template
/// metacharacters; otherwise returns it unchanged.
pub fn escape_for_config(path: &str) -> Cow<'_, str> {
    if !path.contains(META_CHARS) {
        return Cow::Borrowed(path);
    }
    let escaped = path.replace('\\', "\\\\").replace('"', "\\\"");
    Cow::Owned(format!("\"{escaped}\""))
}
