//! Common Utilities Module
//!
//! Small file and string helpers shared by the tools.

use std::path::Path;

/// Lower-case extension of `path`, or an empty string.
///
/// ```
/// use std::path::Path;
/// use shared_utils::common_utils::get_extension_lowercase;
///
/// assert_eq!(get_extension_lowercase(Path::new("IMG_0001.HEIC")), "heic");
/// assert_eq!(get_extension_lowercase(Path::new("noext")), "");
/// ```
pub fn get_extension_lowercase(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Case-insensitive extension check; `extensions` are given without dots.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = get_extension_lowercase(path);
    extensions.contains(&ext.as_str())
}

pub fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Strip a trailing `.ext` when it is one of `extensions` (case-insensitive).
///
/// ```
/// use shared_utils::common_utils::strip_extension;
///
/// assert_eq!(strip_extension("IMG_0001.HEIC", &["heic", "heif"]), "IMG_0001");
/// assert_eq!(strip_extension("notes.txt", &["heic"]), "notes.txt");
/// ```
pub fn strip_extension<'a>(name: &'a str, extensions: &[&str]) -> &'a str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = &name[idx + 1..];
            if extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                &name[..idx]
            } else {
                name
            }
        }
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_extension_lowercase() {
        assert_eq!(get_extension_lowercase(Path::new("test.HEIF")), "heif");
        assert_eq!(get_extension_lowercase(Path::new(".hidden")), "");
    }

    #[test]
    fn test_has_extension() {
        let extensions = &["heic", "heif"];
        assert!(has_extension(Path::new("photo.HEIC"), extensions));
        assert!(!has_extension(Path::new("photo.heic.jpg"), extensions));
    }

    #[test]
    fn test_is_hidden_file() {
        assert!(is_hidden_file(Path::new(".DS_Store")));
        assert!(!is_hidden_file(Path::new("IMG_0001.heic")));
    }

    #[test]
    fn test_strip_extension() {
        let exts = &["heic", "heif"];
        assert_eq!(strip_extension("a.heic", exts), "a");
        assert_eq!(strip_extension("a.HeIf", exts), "a");
        assert_eq!(strip_extension("a.b.heic", exts), "a.b");
        assert_eq!(strip_extension(".heic", exts), ".heic");
        assert_eq!(strip_extension("heic", exts), "heic");
        assert_eq!(strip_extension("a.jpg", exts), "a.jpg");
    }
}
