//! Local file-name derivation for media references.

use std::path::{Component, Path};

use tracing::debug;
use url::Url;

/// Longest extension (including the dot) accepted from a URL.
const MAX_EXTENSION_LEN: usize = 12;

/// Returns the percent-decoded, sanitized last path segment of `url`.
///
/// Returns `None` when the URL does not parse or has no usable basename.
pub(crate) fn basename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
        debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
        last.into()
    });
    let sanitized = sanitize_filename(&decoded);
    (!sanitized.trim_matches('_').is_empty()).then_some(sanitized)
}

/// Returns the lowercase extension (with dot) of the URL's last segment.
pub(crate) fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let dot = last.rfind('.')?;
    let ext = &last[dot..];
    if ext.len() <= 1 || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    ext[1..]
        .chars()
        .all(|c| c.is_ascii_alphanumeric())
        .then(|| ext.to_ascii_lowercase())
}

/// Replaces characters that are invalid on common filesystems and neutralizes
/// dot segments, so the result is always a single path component.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Inserts `_{index}` before the extension: `clip.mp4` → `clip_2.mp4`.
pub(crate) fn with_index_suffix(name: &str, index: usize) -> String {
    match name.rfind('.') {
        Some(pos) if pos > 0 => format!("{}_{index}{}", &name[..pos], &name[pos..]),
        _ => format!("{name}_{index}"),
    }
}
