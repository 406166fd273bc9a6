//! Artifact naming
//!
//! Opaque keys and on-disk names for stored documents and images.

use std::path::Path;

use uuid::Uuid;

/// Generate a fresh opaque key for a stored artifact
pub fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Replace anything outside `[A-Za-z0-9._-]` so the name is safe as a path component
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// On-disk name for an uploaded or derived document: `<key>-<sanitized name>`
pub fn document_disk_name(key: &str, display_name: &str) -> String {
    format!("{}-{}", key, sanitize_file_name(display_name))
}

/// Split a display name into base and extension (extension keeps its dot)
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Display name for a truncated copy: `<base>_truncated<ext>`
pub fn truncated_name(original: &str) -> String {
    let (base, ext) = split_extension(original);
    format!("{}_truncated{}", base, ext)
}

/// Display name for a rendered page: `<base>_page_<n>.<ext>`
pub fn page_image_name(original: &str, page_number: u32, extension: &str) -> String {
    let (base, _) = split_extension(original);
    format!("{}_page_{}.{}", base, page_number, extension)
}
