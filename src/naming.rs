//! Filesystem names for a mirrored page and its resources.
//!
//! All functions here are pure: the same URL always maps to the same name,
//! which is what makes re-mirroring a page into a fresh directory
//! reproducible.

use url::Url;

/// Name used when a URL sanitizes down to nothing.
pub const FALLBACK_NAME: &str = "index";

/// Extension given to resources whose path carries none.
pub const DEFAULT_EXTENSION: &str = ".html";

const SEPARATOR: char = '-';

/// Names derived once from the page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedNames {
    /// Sanitized `hostname + pathname`, e.g. `example-test-page`.
    pub base_name: String,
    /// `base_name` + `.html`.
    pub html_file_name: String,
    /// `base_name` + `_files`.
    pub resources_dir_name: String,
}

/// Derives the main HTML file name and the resources directory name for a page.
pub fn derive_main_name(page_url: &Url) -> DerivedNames {
    let raw = format!("{}{}", page_url.host_str().unwrap_or_default(), page_url.path());
    let mut base_name = sanitize(&raw);
    if base_name.is_empty() {
        base_name = FALLBACK_NAME.to_string();
    }

    DerivedNames {
        html_file_name: format!("{base_name}.html"),
        resources_dir_name: format!("{base_name}_files"),
        base_name,
    }
}

/// Resolves `resource` against `page_url` and derives its local file name.
pub fn derive_resource_name(resource: &str, page_url: &Url) -> Result<String, url::ParseError> {
    let absolute = page_url.join(resource)?;
    Ok(resource_file_name(&absolute))
}

/// Local file name for an already absolute resource URL.
///
/// The name is `<host>-<path without extension><extension>`, with the host and
/// path sanitized. Query strings and fragments do not take part.
pub fn resource_file_name(resource_url: &Url) -> String {
    let path = resource_url.path();
    let (stem, extension) = split_extension(path);

    let host = sanitize(resource_url.host_str().unwrap_or_default());
    let mut stem = sanitize(stem);
    if stem.is_empty() {
        stem = FALLBACK_NAME.to_string();
    }

    let name = if host.is_empty() {
        stem
    } else {
        format!("{host}{SEPARATOR}{stem}")
    };
    format!("{name}{extension}")
}

/// Splits a URL path into the part before the extension and the extension
/// itself (including the dot). The extension comes from the last `.` of the
/// final segment; a segment that only starts with a dot has none.
fn split_extension(path: &str) -> (&str, String) {
    let segment_start = path.rfind('/').map_or(0, |i| i + 1);
    let segment = &path[segment_start..];

    match segment.rfind('.') {
        Some(dot) if dot > 0 => {
            let ext: String = segment[dot + 1..]
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect();
            let stem = &path[..segment_start + dot];
            if ext.is_empty() {
                (stem, DEFAULT_EXTENSION.to_string())
            } else {
                (stem, format!(".{ext}"))
            }
        }
        _ => (path, DEFAULT_EXTENSION.to_string()),
    }
}

/// Replaces every run of non-alphanumeric characters with a single `-` and
/// trims separators from both ends.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_separator = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push(SEPARATOR);
            }
            pending_separator = false;
            out.push(c);
        } else {
            pending_separator = true;
        }
    }

    out
}
