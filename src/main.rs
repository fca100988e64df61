use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::{
    backend::PlayerServices,
    player::AudioPlayer,
    songbird_backend::{SongbirdPipeline, SongbirdTransport},
};
use crate::bot::{notifier::ChannelNotifier, GuildVoiceBot};
use crate::config::Config;
use crate::sources::youtube::YouTubeClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_voice=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Voice v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // Servicios de voz compartidos por todas las sesiones
    let songbird = Songbird::serenity();
    let services = PlayerServices {
        transport: Arc::new(SongbirdTransport::new(songbird.clone())),
        pipeline: Arc::new(SongbirdPipeline::new(songbird.clone(), reqwest::Client::new())),
        notifier: Arc::new(ChannelNotifier::new(Arc::new(Http::new(&config.discord_token)))),
    };
    let player = Arc::new(AudioPlayer::new(config.player_settings(), services));

    // Crear handler del bot
    let handler = GuildVoiceBot::new(config.clone(), player, Arc::new(YouTubeClient::new()));

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

/// Binarios externos que necesita el bot. songbird decodifica con symphonia, así que ffmpeg no hace falta.
const REQUIRED_BINARIES: &[&str] = &["yt-dlp"];

async fn health_check() -> Result<()> {
    let missing = missing_binaries(REQUIRED_BINARIES).await;
    if missing.is_empty() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes: {}", missing.join(", "));
    }
}

/// Binarios que no se pudieron ejecutar con `--version`.
async fn missing_binaries(binaries: &[&str]) -> Vec<String> {
    let mut missing = Vec::new();
    for binary in binaries {
        let ok = async_process::Command::new(binary)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false);
        if !ok {
            missing.push(binary.to_string());
        }
    }
    missing
}
