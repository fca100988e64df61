use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::{sync::LazyLock, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{is_url, TrackResolver};
use crate::{audio::track::Track, error::ResolveError};

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?(www\.|m\.)?(youtube\.com/(watch\?v=|embed/|v/|shorts/)|youtu\.be/|music\.youtube\.com/watch\?v=)([A-Za-z0-9_-]{11})",
    )
    .expect("YouTube URL pattern is valid")
});

/// Campos de `yt-dlp --dump-json` que usamos.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
}

/// Consultas de metadata a través del binario `yt-dlp`.
pub struct YouTubeClient {
    // Limita los procesos yt-dlp concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Verifica si el enlace apunta a un video de YouTube.
    pub fn is_youtube_url(url: &str) -> bool {
        YOUTUBE_URL.is_match(url.trim())
    }

    /// ID de 11 caracteres del video de un enlace de YouTube.
    pub fn video_id(url: &str) -> Option<&str> {
        YOUTUBE_URL
            .captures(url.trim())
            .and_then(|captures| captures.get(5))
            .map(|id| id.as_str())
    }

    async fn dump_json(&self, target: &str) -> Result<Vec<YtDlpInfo>, ResolveError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolveError::Metadata(e.to_string()))?;

        debug!("📊 Consulta yt-dlp: {}", target);

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                target,
            ])
            .output()
            .await
            .map_err(|e| ResolveError::Metadata(format!("could not run yt-dlp: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Metadata(error.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let infos = stdout
            .lines()
            .filter_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!("Ignorando línea ilegible de yt-dlp: {}", e);
                    None
                }
            })
            .collect();
        Ok(infos)
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackResolver for YouTubeClient {
    async fn resolve(&self, input: &str, requested_by: UserId) -> Result<Track, ResolveError> {
        let input = input.trim();
        let target = if is_url(input) {
            if !Self::is_youtube_url(input) {
                debug!("Enlace que no es de YouTube, se pasa a yt-dlp tal cual: {}", input);
            }
            input.to_string()
        } else {
            info!("🔍 Buscando en YouTube: {}", input);
            format!("ytsearch1:{input}")
        };

        let info = self
            .dump_json(&target)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::NotFound(input.to_string()))?;

        Ok(info_to_track(info, input, requested_by))
    }
}

fn info_to_track(info: YtDlpInfo, input: &str, requested_by: UserId) -> Track {
    let url = info
        .webpage_url
        .unwrap_or_else(|| match YouTubeClient::video_id(input) {
            Some(_) => input.to_string(),
            None => format!("https://www.youtube.com/watch?v={}", info.id),
        });

    let mut track = Track::new(info.id, info.title, url, requested_by);
    if let Some(uploader) = info.uploader {
        track = track.with_author(uploader);
    }
    if let Some(duration) = info.duration.filter(|d| d.is_finite() && *d >= 0.0) {
        track = track.with_duration(Duration::from_secs_f64(duration));
    }
    if let Some(thumbnail) = info.thumbnail {
        track = track.with_thumbnail(thumbnail);
    }
    track
}
