// ABOUTME: The fetched Document handed to strategies: URL, content type and raw bytes.
// ABOUTME: Also hosts content-type normalization shared with preference lookup.

use std::borrow::Cow;

use bytes::Bytes;
use url::Url;

/// A fetched document. Cloning is cheap; the body is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Document {
    pub fn new(
        url: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            url: url.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Host component of the URL, if the URL parses and has one.
    pub fn host(&self) -> Option<String> {
        let parsed = Url::parse(&self.url).ok()?;
        parsed.host_str().map(|h| h.to_string())
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// The normalized content type used for preference lookups.
    pub fn mime(&self) -> String {
        normalize_content_type(&self.content_type)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lowercases a content type and strips parameters such as `charset`.
///
/// `"Text/HTML; charset=UTF-8"` becomes `"text/html"`.
pub fn normalize_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
