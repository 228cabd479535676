//! Remote post model.
//!
//! Field shapes follow the Tumblr v2 `posts` payload. Everything except the
//! identifier is optional, and the timestamp fields are kept as raw JSON so a
//! malformed value on one post never fails decoding of the whole page.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Remote-assigned post identifier, normalized to its string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(String);

impl PostId {
    /// Creates an identifier from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PostId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        let id = match RawId::deserialize(deserializer)? {
            RawId::Text(text) => text,
            RawId::Unsigned(n) => n.to_string(),
            RawId::Signed(n) => n.to_string(),
        };
        if id.trim().is_empty() {
            return Err(serde::de::Error::custom("post id is empty"));
        }
        Ok(Self(id))
    }
}

/// One photo attached to a post.
#[derive(Debug, Clone, Deserialize)]
pub struct Photo {
    /// Full-resolution rendition.
    pub original_size: PhotoSize,
}

/// A single photo rendition.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    /// Direct image URL.
    pub url: String,
}

/// One item of the remote collection.
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    /// Unique identifier.
    pub id: PostId,
    /// Creation time as unix seconds (number or numeric string).
    #[serde(default)]
    pub timestamp: Option<Value>,
    /// Creation time as text (`YYYY-MM-DD HH:MM:SS GMT` or RFC 3339).
    #[serde(default)]
    pub date: Option<Value>,
    /// Caption text (may contain markup).
    #[serde(default, deserialize_with = "lenient_string")]
    pub caption: Option<String>,
    /// Free-text body (may embed video links and tags).
    #[serde(default, deserialize_with = "lenient_string")]
    pub body: Option<String>,
    /// Attached photos, in display order.
    #[serde(default, deserialize_with = "lenient_photos")]
    pub photos: Vec<Photo>,
    /// Directly attached video.
    #[serde(default, deserialize_with = "lenient_string")]
    pub video_url: Option<String>,
}

impl Post {
    /// Creates a post with only an identifier set.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: PostId::new(id),
            timestamp: None,
            date: None,
            caption: None,
            body: None,
            photos: Vec::new(),
            video_url: None,
        }
    }

    /// Sets the unix-seconds timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, seconds: i64) -> Self {
        self.timestamp = Some(Value::from(seconds));
        self
    }

    /// Sets the textual date field.
    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(Value::String(date.into()));
        self
    }

    /// Sets the caption.
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Sets the body text.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Appends a photo.
    #[must_use]
    pub fn with_photo(mut self, url: impl Into<String>) -> Self {
        self.photos.push(Photo {
            original_size: PhotoSize { url: url.into() },
        });
        self
    }

    /// Sets the directly attached video.
    #[must_use]
    pub fn with_video_url(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }

    /// Returns the creation instant if either timestamp field parses.
    ///
    /// `timestamp` is preferred over `date`.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_ref()
            .and_then(parse_timestamp_value)
            .or_else(|| self.date.as_ref().and_then(parse_timestamp_value))
    }
}

fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0)),
        Value::String(text) => parse_timestamp_text(text),
        _ => None,
    }
}

fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(seconds) = text.parse::<i64>() {
        return DateTime::from_timestamp(seconds, 0);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = text
        .strip_suffix(" GMT")
        .or_else(|| text.strip_suffix(" UTC"))
        .unwrap_or(text);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|parsed| parsed.and_utc())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

fn lenient_photos<'de, D>(deserializer: D) -> Result<Vec<Photo>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<Photo>(entry).ok())
        .collect())
}
