//! Conversión del input del usuario en tracks reproducibles.

use async_trait::async_trait;
use serenity::model::id::UserId;

use crate::{audio::track::Track, error::ResolveError};

pub mod youtube;

/// Resuelve una URL o texto libre en un único [`Track`].
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Una URL resuelve a ese video; cualquier otra cosa al primer resultado de búsqueda.
    async fn resolve(&self, input: &str, requested_by: UserId) -> Result<Track, ResolveError>;
}

/// Indica si el input es un enlace y no una búsqueda.
pub fn is_url(input: &str) -> bool {
    url::Url::parse(input.trim())
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false)
}
