//! Fronteras entre el orquestador y el mundo exterior.
//!
//! Las sesiones solo hablan con voz, audio y chat a través de estos traits; las
//! implementaciones de songbird y serenity viven en
//! [`songbird_backend`](super::songbird_backend) y
//! [`bot::notifier`](crate::bot::notifier).

use async_trait::async_trait;
use futures::future::BoxFuture;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;

use super::track::Track;
use crate::error::{PlaybackError, VoiceError};

/// Se une a canales de voz.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError>;
}

/// Conexión de voz activa, propiedad de una sola sesión.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn guild_id(&self) -> GuildId;

    fn channel_id(&self) -> ChannelId;

    /// Si el transporte ya puede llevar audio. Se consulta antes de cada track.
    async fn is_ready(&self) -> bool;

    async fn set_speaking(&self, speaking: bool);

    async fn disconnect(&self) -> Result<(), VoiceError>;
}

/// Cancela una transcodificación en curso.
pub trait EncoderHandle: Send + Sync {
    fn cancel(&self);
}

/// Controla la emisión de frames de un stream en curso.
pub trait StreamHandle: Send + Sync {
    fn set_paused(&self, paused: bool);
}

/// Track que ya empezó a transmitirse.
///
/// `done` resuelve con `Ok(())` al terminar bien o al fin esperado del stream.
pub struct ActiveStream {
    pub encoder: Box<dyn EncoderHandle>,
    pub stream: Box<dyn StreamHandle>,
    pub done: BoxFuture<'static, Result<(), PlaybackError>>,
}

/// Convierte un track en frames de voz sobre una conexión.
#[async_trait]
pub trait AudioPipeline: Send + Sync {
    async fn start(
        &self,
        track: &Track,
        connection: Arc<dyn VoiceConnection>,
    ) -> Result<ActiveStream, PlaybackError>;
}

/// Color de una notificación simple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Default,
    Error,
}

/// Publica mensajes en el canal de texto desde el que se inició la sesión.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn message(&self, channel_id: ChannelId, text: String, tone: Tone);

    async fn now_playing(&self, channel_id: ChannelId, track: Track);
}

/// Todo lo que una sesión necesita del exterior.
#[derive(Clone)]
pub struct PlayerServices {
    pub transport: Arc<dyn VoiceTransport>,
    pub pipeline: Arc<dyn AudioPipeline>,
    pub notifier: Arc<dyn Notifier>,
}
