//! Shared handle generation for storage backends.
//!
//! Handle format: `{prefix}/{uuid}-{sanitized filename}`.

use uuid::Uuid;

const MAX_NAME_LEN: usize = 128;

/// Generate a fresh blob handle under `prefix` for `filename`.
pub fn generate_storage_key(prefix: &str, filename: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = sanitize_filename(filename);
    if prefix.is_empty() {
        format!("{}-{}", Uuid::new_v4(), name)
    } else {
        format!("{}/{}-{}", prefix, Uuid::new_v4(), name)
    }
}

/// Keep only the last path component and a conservative character set.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }
    let cleaned = cleaned.trim_start_matches('.');

    let mut cleaned: String = cleaned.chars().take(MAX_NAME_LEN).collect();
    if cleaned.is_empty() {
        cleaned.push_str("blob");
    }
    cleaned
}

/// Reject handles that could escape a backend's namespace.
pub fn validate_key(key: &str) -> bool {
    !key.is_empty() && !key.contains("..") && !key.starts_with('/') && !key.contains('\\')
}
