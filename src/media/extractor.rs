//! Ordered media extraction from a post.
//!
//! Order is: photos, the attached video, body links to recognized video hosts,
//! then body video tags. A URL is extracted at most once per post, and file
//! names that would collide get a `_2`, `_3`, ... suffix in extraction order.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::source::Post;

use super::filename::{basename_from_url, extension_from_url, with_index_suffix};
use super::{
    CAPTION_FILE_NAME, EMBEDDED_VIDEO_FILE_NAME, MediaKind, MediaReference, POST_VIDEO_FILE_NAME,
    VIDEO_TAG_FILE_NAME, is_video_host_url,
};

/// Any http(s) URL in free text, up to whitespace, quotes, or angle brackets.
#[allow(clippy::expect_used)]
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'\]]+"#).expect("URL regex is valid")
});

/// A `<video>` element, including its children when it is closed.
#[allow(clippy::expect_used)]
static VIDEO_ELEMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<video\b[^>]*>(?:.*?</video>)?").expect("video element regex is valid")
});

/// The `src` attribute of a `<video>` or `<source>` tag.
#[allow(clippy::expect_used)]
static SRC_ATTRIBUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<(?:video|source)\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#)
        .expect("src attribute regex is valid")
});

/// Produces the ordered media references for `post`.
#[must_use]
#[tracing::instrument(skip(post), fields(post_id = %post.id))]
pub fn extract_media(post: &Post) -> Vec<MediaReference> {
    let mut builder = ReferenceBuilder::new();

    for (index, photo) in post.photos.iter().enumerate() {
        let url = photo.original_size.url.trim();
        let name = basename_from_url(url).unwrap_or_else(|| {
            let ext = extension_from_url(url).unwrap_or_else(|| ".bin".to_string());
            format!("image_{}{ext}", index + 1)
        });
        builder.push(MediaKind::Image, url, &name);
    }

    if let Some(url) = post.video_url.as_deref() {
        builder.push(MediaKind::PostVideo, url.trim(), POST_VIDEO_FILE_NAME);
    }

    if let Some(body) = post.body.as_deref() {
        for url in embedded_host_links(body) {
            builder.push(MediaKind::EmbeddedVideo, &url, EMBEDDED_VIDEO_FILE_NAME);
        }
        for url in video_tag_sources(body) {
            builder.push(MediaKind::VideoTag, &url, VIDEO_TAG_FILE_NAME);
        }
    }

    let references = builder.finish();
    debug!(count = references.len(), "extracted media references");
    references
}

struct ReferenceBuilder {
    references: Vec<MediaReference>,
    seen_urls: HashSet<String>,
    used_names: HashSet<String>,
}

impl ReferenceBuilder {
    fn new() -> Self {
        Self {
            references: Vec::new(),
            seen_urls: HashSet::new(),
            used_names: HashSet::from([CAPTION_FILE_NAME.to_string()]),
        }
    }

    fn push(&mut self, kind: MediaKind, url: &str, base_name: &str) {
        if url.is_empty() || !self.seen_urls.insert(url.to_string()) {
            trace!(%url, "skipping empty or repeated media URL");
            return;
        }
        let mut name = base_name.to_string();
        let mut index = 2;
        while self.used_names.contains(&name) {
            name = with_index_suffix(base_name, index);
            index += 1;
        }
        self.used_names.insert(name.clone());
        self.references.push(MediaReference::new(kind, url, name));
    }

    fn finish(self) -> Vec<MediaReference> {
        self.references
    }
}

fn embedded_host_links(body: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(body)
        .map(|m| decode_entities(clean_url_trailing(m.as_str())))
        .filter(|url| is_video_host_url(url))
        .collect()
}

fn video_tag_sources(body: &str) -> Vec<String> {
    VIDEO_ELEMENT_PATTERN
        .find_iter(body)
        .flat_map(|element| {
            SRC_ATTRIBUTE_PATTERN
                .captures_iter(element.as_str())
                .filter_map(|caps| caps.get(1))
                .map(|src| decode_entities(src.as_str().trim()))
                .collect::<Vec<_>>()
        })
        .filter(|url| !url.is_empty())
        .collect()
}

/// Markup bodies escape `&` in attribute and link text.
fn decode_entities(url: &str) -> String {
    url.replace("&amp;", "&")
}

/// Strips sentence punctuation and unbalanced closing brackets that the URL
/// pattern swallows when a link ends a sentence.
fn clean_url_trailing(url: &str) -> &str {
    let mut result = url;
    while let Some(last) = result.chars().last() {
        match last {
            '.' | ',' | ';' | ':' | '!' | '?' => result = &result[..result.len() - 1],
            ')' => {
                let open = result.chars().filter(|&c| c == '(').count();
                let close = result.chars().filter(|&c| c == ')').count();
                if close > open {
                    result = &result[..result.len() - 1];
                } else {
                    break;
                }
            }
            _ => break,
        }
    }
    result
}
