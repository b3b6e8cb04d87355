//! Video identifiers.

/// YouTube video identifier (11 URL-safe characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    /// Extract the video ID from a URL, or accept a bare ID
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim();
        if regex!(r"^[A-Za-z0-9_-]{11}$").is_match(url) {
            return Some(Self(url.to_string()));
        }

        regex!(r"(?:youtu\.be/|youtube\.com/watch\?(?:.*&)?v=|youtube\.com/(?:embed|shorts)/)([A-Za-z0-9_-]{11})")
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| Self(m.as_str().to_string()))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
