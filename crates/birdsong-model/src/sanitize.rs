use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Characters rejected by at least one common filesystem.
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid regex"));

/// Longest extension kept, counting the leading dot.
const MAX_EXTENSION_LEN: usize = 4;

/// Replace every character disallowed on common filesystems with `_`.
///
/// Each match is a single character, so the result has exactly as many
/// characters as the input.
pub fn sanitize_filename(filename: &str) -> String {
    DISALLOWED.replace_all(filename, "_").into_owned()
}

/// Clamp the extension to a dot plus at most three characters.
///
/// Provider URLs often carry a cache-busting query string after the
/// extension (`123.m4a?1600000000`); once sanitized that becomes part of
/// the extension and is dropped here.
pub fn clean_extension(filename: &str) -> String {
    let (stem, extension) = split_extension(filename);
    if extension.chars().count() > MAX_EXTENSION_LEN {
        let clamped: String = extension.chars().take(MAX_EXTENSION_LEN).collect();
        format!("{stem}{clamped}")
    } else {
        filename.to_string()
    }
}

/// Sanitize, then clamp the extension. This is the on-disk name for a recording.
pub fn safe_filename(raw: &str) -> String {
    clean_extension(&sanitize_filename(raw))
}

/// Directory name for a species, derived from its common name.
///
/// "Torresian Crow" -> "Torresian_Crow".
pub fn folder_name(common_name: &str) -> String {
    let nfc: String = common_name.trim().nfc().collect();
    sanitize_filename(&nfc.replace(' ', "_"))
}

/// Split `name` into `(stem, extension)` where the extension includes its dot.
///
/// Leading dots never start an extension, so `.hidden` has none.
fn split_extension(name: &str) -> (&str, &str) {
    let Some(dot) = name.rfind('.') else {
        return (name, "");
    };
    if name[..dot].chars().all(|c| c == '.') {
        return (name, "");
    }
    name.split_at(dot)
}
