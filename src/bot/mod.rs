//! # Módulo del Bot
//!
//! Lado Discord del bot: registro de comandos slash, despacho de interacciones
//! y el notificador de canal que usan las sesiones de voz.
//!
//! El bot gira en torno a [`GuildVoiceBot`], que implementa el [`EventHandler`]
//! de serenity. No guarda estado de reproducción; cada comando se reenvía a la
//! sesión de la guild a través del registro [`AudioPlayer`].

use anyhow::Result;
use futures::FutureExt;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready},
    async_trait,
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage},
};
use std::{panic::AssertUnwindSafe, sync::Arc};
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notifier;

use crate::{audio::player::AudioPlayer, config::Config, sources::TrackResolver};

pub struct GuildVoiceBot {
    /// Configuración del bot cargada desde variables de entorno
    config: Arc<Config>,
    /// Sesiones de voz por guild
    pub player: Arc<AudioPlayer>,
    /// Convierte el input de `/play` en tracks
    pub resolver: Arc<dyn TrackResolver>,
}

impl GuildVoiceBot {
    pub fn new(config: Config, player: Arc<AudioPlayer>, resolver: Arc<dyn TrackResolver>) -> Self {
        Self {
            config: Arc::new(config),
            player,
            resolver,
        }
    }

    /// Registra comandos slash globales, o solo en `GUILD_ID` si está definido.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                // Verificar que el bot esté en la guild
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for GuildVoiceBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    /// Despacha comandos slash. Un handler que falla o entra en pánico se registra
    /// en el log y no detiene el loop de eventos.
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        if command.user.id == ctx.cache.current_user().id {
            debug!("Ignorando interacción propia");
            return;
        }

        let name = command.data.name.clone();
        let fallback = command.clone();
        let outcome = AssertUnwindSafe(handlers::handle_command(&ctx, command, self))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Error manejando comando /{}: {:?}", name, e),
            Err(_) => {
                error!("💥 El comando /{} entró en pánico", name);
                let response = CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("Something went wrong")
                        .ephemeral(true),
                );
                if let Err(e) = fallback.create_response(&ctx.http, response).await {
                    debug!("No se pudo responder tras el pánico: {:?}", e);
                }
            }
        }
    }
}
