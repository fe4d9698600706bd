//! Audiobook tags and their mapping onto MP4 container keys.

/// Album used when none is given.
pub const DEFAULT_ALBUM: &str = "Audiobook";

/// Genre used when none is given.
pub const DEFAULT_GENRE: &str = "Audiobook";

/// FFmpeg key for the iTunes media kind (`stik`) atom.
pub const MEDIA_TYPE_KEY: &str = "media_type";

/// `stik` value for audiobooks; players treat these differently from music
/// (bookmarking, no shuffle).
pub const MEDIA_TYPE_AUDIOBOOK: &str = "2";

/// Descriptive tags for the final artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    pub title: Option<String>,
    pub author: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub comment: Option<String>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Container tags as `(key, value)` pairs, in a fixed order.
    ///
    /// Album and genre fall back to defaults, blank values are skipped, and
    /// the audiobook media kind is always present.
    pub fn container_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = Vec::new();

        let mut push = |key: &'static str, value: Option<&str>| {
            if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
                tags.push((key, v.to_string()));
            }
        };

        push("title", self.title.as_deref());
        push("artist", self.author.as_deref());
        push("album_artist", self.author.as_deref());
        push("album", Some(self.album.as_deref().unwrap_or(DEFAULT_ALBUM)));
        push("genre", Some(self.genre.as_deref().unwrap_or(DEFAULT_GENRE)));
        push("date", self.year.as_deref());
        push("comment", self.comment.as_deref());

        tags.push((MEDIA_TYPE_KEY, MEDIA_TYPE_AUDIOBOOK.to_string()));
        tags
    }

    /// Tags as `-metadata key=value` encoder arguments.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        self.container_tags()
            .into_iter()
            .flat_map(|(key, value)| ["-metadata".to_string(), format!("{}={}", key, value)])
            .collect()
    }
}

/// Escape special characters in FFMETADATA values.
///
/// FFmpeg metadata values need to escape: = ; # \ and newlines
pub fn escape_metadata_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '=' | ';' | '#' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag<'a>(tags: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        tags.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_tag_table() {
        let record = MetadataRecord::new()
            .with_title("Book")
            .with_author("Author")
            .with_year("1999")
            .with_comment("Narrated");
        let tags = record.container_tags();

        assert_eq!(tag(&tags, "title"), Some("Book"));
        assert_eq!(tag(&tags, "artist"), Some("Author"));
        assert_eq!(tag(&tags, "album_artist"), Some("Author"));
        assert_eq!(tag(&tags, "album"), Some(DEFAULT_ALBUM));
        assert_eq!(tag(&tags, "genre"), Some(DEFAULT_GENRE));
        assert_eq!(tag(&tags, "date"), Some("1999"));
        assert_eq!(tag(&tags, "comment"), Some("Narrated"));
        assert_eq!(tag(&tags, MEDIA_TYPE_KEY), Some("2"));
    }

    #[test]
    fn test_explicit_album_and_genre() {
        let tags = MetadataRecord::new()
            .with_album("Collected Works")
            .with_genre("Fiction")
            .container_tags();
        assert_eq!(tag(&tags, "album"), Some("Collected Works"));
        assert_eq!(tag(&tags, "genre"), Some("Fiction"));
    }

    #[test]
    fn test_blank_values_skipped() {
        let tags = MetadataRecord::new().with_title("  ").container_tags();
        assert_eq!(tag(&tags, "title"), None);
        assert_eq!(tag(&tags, "artist"), None);
        // defaults and media kind only
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = MetadataRecord::new().with_title("Book").ffmpeg_args();
        assert_eq!(args[0], "-metadata");
        assert_eq!(args[1], "title=Book");
        assert!(args.contains(&"media_type=2".to_string()));
    }

    #[test]
    fn test_escape_metadata_value() {
        assert_eq!(escape_metadata_value("Simple"), "Simple");
        assert_eq!(escape_metadata_value("Test=Value"), "Test\\=Value");
        assert_eq!(escape_metadata_value("Test;Value"), "Test\\;Value");
        assert_eq!(escape_metadata_value("Test#Value"), "Test\\#Value");
        assert_eq!(escape_metadata_value("Test\\Value"), "Test\\\\Value");
        assert_eq!(escape_metadata_value("Line1\r\nLine2"), "Line1\\\nLine2");
    }
}
