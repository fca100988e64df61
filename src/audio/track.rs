use serenity::model::id::UserId;
use std::{fmt, time::Duration};

/// Elemento reproducible, creado por un resolver e inmutable después.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    source_id: String,
    title: String,
    author: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    url: String,
    requested_by: UserId,
}

impl Track {
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        requested_by: UserId,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            author: None,
            duration: None,
            thumbnail: None,
            url: url.into(),
            requested_by,
        }
    }

    // Getters
    pub fn source_id(&self) -> &str {
        &self.source_id
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    // Builders
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.author {
            Some(author) => write!(f, "{} - {}", self.title, author),
            None => write!(f, "{}", self.title),
        }
    }
}
