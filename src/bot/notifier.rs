use async_trait::async_trait;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::ChannelId,
};
use std::sync::Arc;
use tracing::warn;

use crate::{
    audio::{
        backend::{Notifier, Tone},
        track::Track,
    },
    ui::embeds,
};

/// Publica las notificaciones de la sesión como embeds en un canal de texto.
pub struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    async fn send(&self, channel_id: ChannelId, embed: CreateEmbed) {
        let message = CreateMessage::new().embed(embed);
        if let Err(e) = channel_id.send_message(self.http.as_ref(), message).await {
            warn!("No se pudo enviar mensaje a {}: {:?}", channel_id, e);
        }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn message(&self, channel_id: ChannelId, text: String, tone: Tone) {
        self.send(channel_id, embeds::create_message_embed(&text, tone))
            .await;
    }

    async fn now_playing(&self, channel_id: ChannelId, track: Track) {
        self.send(channel_id, embeds::create_now_playing_embed(&track))
            .await;
    }
}
