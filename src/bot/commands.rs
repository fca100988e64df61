use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Nombre de la opción de `/play` con la URL o los términos de búsqueda
pub const PLAY_INPUT_OPTION: &str = "input";

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        ping_command(),
        play_command(),
        skip_command(),
        pause_command(),
        resume_command(),
        clear_command(),
        disconnect_command(),
        queue_command(),
    ]
}

fn ping_command() -> CreateCommand {
    CreateCommand::new("ping").description("Check that the bot is alive")
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a song or add it to the queue")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                PLAY_INPUT_OPTION,
                "YouTube URL or search terms",
            )
            .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip the current song")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause the current song")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resume the paused song")
}

// Comandos de cola

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Clear the queue and stop the current song")
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Show the queue")
}

fn disconnect_command() -> CreateCommand {
    CreateCommand::new("disconnect").description("Leave the voice channel")
}
