use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info};

use super::{commands, GuildVoiceBot};
use crate::{
    audio::{backend::Tone, session::Invoker},
    error::PlayerError,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &GuildVoiceBot,
) -> Result<()> {
    if command.data.name == "ping" {
        return respond(ctx, &command, embeds::create_message_embed("Pong", Tone::Default)).await;
    }

    let Some(guild_id) = command.guild_id else {
        return respond(
            ctx,
            &command,
            embeds::create_message_embed("This command only works in a server", Tone::Error),
        )
        .await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let invoker = Invoker {
        user_id: command.user.id,
        voice_channel: get_user_voice_channel(ctx, guild_id, command.user.id),
        text_channel: command.channel_id,
    };

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id, invoker).await?,
        "queue" => {
            let listing = match bot.player.get(guild_id) {
                Some(session) => session.list(invoker).await,
                None => Err(PlayerError::NotConnected),
            };
            let embed = match listing {
                Ok(tracks) => embeds::create_queue_embed(&tracks),
                Err(e) => error_embed(&command.data.name, guild_id, &e),
            };
            respond(ctx, &command, embed).await?;
        }
        name => {
            // Una guild que nunca reprodujo no tiene nada que controlar
            let Some(session) = bot.player.get(guild_id) else {
                let embed = error_embed(name, guild_id, &PlayerError::NotConnected);
                return respond(ctx, &command, embed).await;
            };
            let result = match name {
                "skip" => session.skip(invoker).await.map(|_| "Song has been skipped"),
                "pause" => session.pause(invoker).await.map(|()| "Song has been paused"),
                "resume" => session.resume(invoker).await.map(|()| "Song has been resumed"),
                "clear" => session.clear(invoker).await.map(|_| "Queue cleared"),
                "disconnect" => session.disconnect(invoker).await.map(|()| "Disconnecting"),
                _ => Ok("Unknown command"),
            };
            let embed = match result {
                Ok(text) => embeds::create_message_embed(text, Tone::Default),
                Err(e) => error_embed(name, guild_id, &e),
            };
            respond(ctx, &command, embed).await?;
        }
    }

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildVoiceBot,
    guild_id: GuildId,
    invoker: Invoker,
) -> Result<()> {
    let input = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == commands::PLAY_INPUT_OPTION)
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Input no proporcionado"))?;

    // Sin canal de voz no hay nada que resolver
    if invoker.voice_channel.is_none() {
        let embed = error_embed("play", guild_id, &PlayerError::NotInVoiceChannel);
        return respond(ctx, command, embed).await;
    }

    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let outcome = match bot.resolver.resolve(input, invoker.user_id).await {
        Ok(track) => bot.player.session(guild_id).play(invoker, track).await,
        Err(e) => Err(PlayerError::Resolve(e)),
    };

    let embed = match outcome {
        Ok(enqueued) => {
            if enqueued.joined {
                info!("🔊 Unido al canal de voz de {} en guild {}", command.user.name, guild_id);
            }
            embeds::create_track_added_embed(&enqueued.track, enqueued.position)
        }
        Err(e) => error_embed("play", guild_id, &e),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

/// Las fallas se registran en el log; los errores del usuario solo se le informan.
fn error_embed(command: &str, guild_id: GuildId, error: &PlayerError) -> CreateEmbed {
    if !error.is_user_error() {
        error!("❌ /{} falló en guild {}: {:?}", command, guild_id, error);
    }
    embeds::create_message_embed(&error.to_string(), Tone::Error)
}

async fn respond(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
