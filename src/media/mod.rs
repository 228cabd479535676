//! Media discovery for posts.
//!
//! [`extract_media`] turns a [`Post`](crate::source::Post) into the ordered list
//! of [`MediaReference`]s that must exist in the post's directory once it is
//! backed up. Extraction is pure: it looks only at the post's fields.

mod extractor;
pub(crate) mod filename;

pub use extractor::extract_media;

use std::fmt;

use url::Url;

/// Caption file written into each post directory. No media file may take
/// this name.
pub const CAPTION_FILE_NAME: &str = "caption.txt";

/// Conventional file name for a post's directly attached video.
pub const POST_VIDEO_FILE_NAME: &str = "video.mp4";

/// Conventional file name for a body link to a recognized video host.
pub const EMBEDDED_VIDEO_FILE_NAME: &str = "embedded_video.mp4";

/// Conventional file name for a `<video>`/`<source>` tag found in the body.
pub const VIDEO_TAG_FILE_NAME: &str = "video_tag.mp4";

/// Domains whose pages must go through stream extraction instead of a plain
/// byte fetch. Subdomains (`www.`, `m.`, `player.`) match too.
pub const VIDEO_HOSTS: &[&str] = &["youtube.com", "youtu.be", "youtube-nocookie.com", "vimeo.com"];

/// Where a media reference was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Entry of the post's photo list.
    Image,
    /// The post's own attached video.
    PostVideo,
    /// Body link whose host is a recognized video host.
    EmbeddedVideo,
    /// Source URL of a markup video tag in the body.
    VideoTag,
}

impl MediaKind {
    /// Stable label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::PostVideo => "post_video",
            Self::EmbeddedVideo => "embedded_video",
            Self::VideoTag => "video_tag",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One media asset to fetch, with its resolved local file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    /// Discovery source.
    pub kind: MediaKind,
    /// Remote URL.
    pub url: String,
    /// File name inside the post directory; unique within the post.
    pub file_name: String,
}

impl MediaReference {
    /// Creates a reference.
    #[must_use]
    pub fn new(kind: MediaKind, url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            file_name: file_name.into(),
        }
    }
}

/// Returns true if the URL's host is (a subdomain of) a recognized video host.
#[must_use]
pub fn is_video_host_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    VIDEO_HOSTS.iter().any(|known| {
        host == *known
            || host
                .strip_suffix(known)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_host_url_matches_subdomains() {
        assert!(is_video_host_url("https://www.youtube.com/watch?v=abc"));
        assert!(is_video_host_url("https://youtu.be/abc"));
        assert!(is_video_host_url("https://player.vimeo.com/video/123"));
        assert!(is_video_host_url("https://M.YouTube.com/watch?v=abc"));
    }

    #[test]
    fn test_is_video_host_url_rejects_lookalikes() {
        assert!(!is_video_host_url("https://notyoutube.com/watch?v=abc"));
        assert!(!is_video_host_url("https://youtube.com.evil.test/x"));
        assert!(!is_video_host_url("https://va.media.tumblr.com/x.mp4"));
        assert!(!is_video_host_url("youtube.com/watch"));
    }

    #[test]
    fn test_media_kind_labels_are_distinct() {
        let labels = [
            MediaKind::Image.as_str(),
            MediaKind::PostVideo.as_str(),
            MediaKind::EmbeddedVideo.as_str(),
            MediaKind::VideoTag.as_str(),
        ];
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
