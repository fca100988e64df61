//! Implementaciones de [`VoiceTransport`] y [`AudioPipeline`] sobre songbird.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{Input, YoutubeDl},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{
    backend::{ActiveStream, AudioPipeline, EncoderHandle, StreamHandle, VoiceConnection, VoiceTransport},
    track::Track,
};
use crate::error::{PlaybackError, VoiceError};

/// Se une a canales a través del manager de songbird registrado en el cliente.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| VoiceError::Join(e.to_string()))?;

        info!("🔊 Conectado a canal de voz {} en guild {}", channel_id, guild_id);
        Ok(Arc::new(SongbirdConnection {
            manager: self.manager.clone(),
            call,
            guild_id,
            channel_id,
        }))
    }
}

struct SongbirdConnection {
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    guild_id: GuildId,
    channel_id: ChannelId,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn is_ready(&self) -> bool {
        self.call.lock().await.current_connection().is_some()
    }

    async fn set_speaking(&self, speaking: bool) {
        // El driver envía el estado de speaking por su cuenta cuando tiene frames que mezclar
        debug!(guild_id = %self.guild_id, speaking, "Estado de speaking actualizado");
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| VoiceError::Leave(e.to_string()))
    }
}

/// Reproduce tracks con yt-dlp en la llamada de songbird de la guild.
pub struct SongbirdPipeline {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdPipeline {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { manager, http }
    }
}

#[async_trait]
impl AudioPipeline for SongbirdPipeline {
    async fn start(
        &self,
        track: &Track,
        connection: Arc<dyn VoiceConnection>,
    ) -> Result<ActiveStream, PlaybackError> {
        let call = self
            .manager
            .get(connection.guild_id())
            .ok_or(PlaybackError::ConnectionLost)?;

        let url = source_url(track)?;
        let input: Input = YoutubeDl::new(self.http.clone(), url).into();
        let handle = call.lock().await.play_input(input);

        let (done_tx, done_rx) = oneshot::channel();
        let done_tx = Arc::new(Mutex::new(Some(done_tx)));
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackDoneHandler {
                        done: done_tx.clone(),
                    },
                )
                .map_err(|e| PlaybackError::Stream(e.to_string()))?;
        }

        info!("🎵 Reproduciendo: {} ({})", track.title(), track.source_id());
        Ok(ActiveStream {
            encoder: Box::new(SongbirdEncoder(handle.clone())),
            stream: Box::new(SongbirdStream(handle)),
            done: Box::pin(async move {
                // Sender descartado: la llamada desapareció durante el track
                done_rx.await.unwrap_or(Err(PlaybackError::ConnectionLost))
            }),
        })
    }
}

struct SongbirdEncoder(TrackHandle);

impl EncoderHandle for SongbirdEncoder {
    fn cancel(&self) {
        if let Err(e) = self.0.stop() {
            debug!("El track ya estaba detenido: {}", e);
        }
    }
}

struct SongbirdStream(TrackHandle);

impl StreamHandle for SongbirdStream {
    fn set_paused(&self, paused: bool) {
        let result = if paused { self.0.pause() } else { self.0.play() };
        if let Err(e) = result {
            warn!("No se pudo cambiar el estado de pausa: {}", e);
        }
    }
}

/// Reenvía el primer evento de fin o error de un track a su señal de término.
struct TrackDoneHandler {
    done: Arc<Mutex<Option<oneshot::Sender<Result<(), PlaybackError>>>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackDoneHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let Some(done) = self.done.lock().take() else {
            return Some(Event::Cancel);
        };

        let mut result = Ok(());
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                if let PlayMode::Errored(e) = &state.playing {
                    error!("❌ Error en track: {:?}", e);
                    result = Err(PlaybackError::Stream(format!("{e:?}")));
                }
            }
        }

        let _ = done.send(result);
        Some(Event::Cancel)
    }
}

/// URL que se entrega a yt-dlp. Solo se aceptan enlaces http(s).
fn source_url(track: &Track) -> Result<String, PlaybackError> {
    let url = Url::parse(track.url())
        .map_err(|e| PlaybackError::Source(format!("{}: {e}", track.url())))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PlaybackError::Source(format!(
            "esquema no soportado: {}",
            url.scheme()
        )));
    }
    Ok(url.into())
}
