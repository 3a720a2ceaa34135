const MAX_FILE_NAME_LEN: usize = 120;

/// Reduces an arbitrary label to a single safe path component.
pub fn sanitize_file_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => ch,
            ' ' => '_',
            _ => '-',
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    let mut cleaned: String = cleaned.chars().take(MAX_FILE_NAME_LEN).collect();
    if cleaned.is_empty() {
        cleaned.push_str("item");
    }
    cleaned
}

/// Splits `name.ext` into `(name, Some(ext))`.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

pub fn with_extension(name: &str, ext: &str) -> String {
    let (stem, _) = split_extension(name);
    format!("{stem}.{ext}")
}
