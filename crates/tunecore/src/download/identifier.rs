//! Content identifier extraction from user-supplied links

use lazy_regex::regex_is_match;
use std::fmt;
use url::Url;

const WATCH_BASE: &str = "https://www.youtube.com/watch?v=";

/// Canonical token derived from a source link.
///
/// Used verbatim as the upload-cache key; [`file_stem`](Self::file_stem) is the
/// filesystem-safe form used for artifact names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentIdentifier(String);

impl ContentIdentifier {
    /// Extracts the identifier from a link.
    ///
    /// - `...?v=ID&...` → `ID`
    /// - `youtu.be/ID?...` → `ID`
    /// - anything else is taken as-is, surrounding whitespace included
    pub fn from_link(link: &str) -> Self {
        if let Some(pos) = link.rfind("v=") {
            let rest = &link[pos + 2..];
            return Self(rest.split('&').next().unwrap_or(rest).to_string());
        }
        if let Some(pos) = link.rfind("youtu.be/") {
            let rest = &link[pos + "youtu.be/".len()..];
            let id = rest.split(['?', '&']).next().unwrap_or(rest);
            return Self(id.to_string());
        }
        Self(link.to_string())
    }

    /// Wraps an already-extracted identifier without parsing.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe stem: every char outside `[A-Za-z0-9_-]` becomes `_`.
    pub fn file_stem(&self) -> String {
        let stem: String = self
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if stem.is_empty() {
            "_".to_string()
        } else {
            stem
        }
    }

    /// The link handed to yt-dlp for this identifier.
    ///
    /// Absolute http(s) URLs that were not recognised as YouTube links are passed
    /// through untouched; anything else is treated as a YouTube video id.
    pub fn watch_url(&self) -> String {
        match Url::parse(&self.0) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => self.0.clone(),
            _ => format!("{}{}", WATCH_BASE, self.0),
        }
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the link points at YouTube at all.
pub fn is_youtube_link(link: &str) -> bool {
    regex_is_match!(r"(?:youtube\.com|youtu\.be)", link)
}

/// Drops everything from the first `&` on (playlist index, timestamps, tracking).
pub fn strip_extra_params(link: &str) -> &str {
    link.split('&').next().unwrap_or(link)
}
