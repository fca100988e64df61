use dashmap::DashMap;
use serenity::model::id::GuildId;
use tracing::info;

use super::{backend::PlayerServices, session::SessionHandle};
use crate::config::PlayerSettings;

/// Registro de sesiones de voz, una por guild.
///
/// Las sesiones se crean al primer uso y viven el resto del proceso; una
/// sesión desconectada vuelve a conectarse con el siguiente `play`.
pub struct AudioPlayer {
    sessions: DashMap<GuildId, SessionHandle>,
    settings: PlayerSettings,
    services: PlayerServices,
}

impl AudioPlayer {
    pub fn new(settings: PlayerSettings, services: PlayerServices) -> Self {
        Self {
            sessions: DashMap::new(),
            settings,
            services,
        }
    }

    /// Obtiene la sesión de la guild, creándola en la primera petición.
    ///
    /// El lock del shard que toma `entry` garantiza una sola creación aunque
    /// varios comandos de una guild nueva compitan entre sí.
    pub fn session(&self, guild_id: GuildId) -> SessionHandle {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                info!(%guild_id, "🆕 Creando sesión de voz");
                SessionHandle::spawn(guild_id, self.settings.clone(), self.services.clone())
            })
            .clone()
    }

    /// La sesión de la guild, si alguna vez se creó.
    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions.get(&guild_id).map(|entry| entry.clone())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        session::SessionState,
        testing::{harness, settings, settle, track, Harness},
    };
    use std::sync::Arc;

    fn player(h: &Harness) -> Arc<AudioPlayer> {
        let services = PlayerServices {
            transport: h.transport.clone(),
            pipeline: h.pipeline.clone(),
            notifier: h.notifier.clone(),
        };
        Arc::new(AudioPlayer::new(settings(5), services))
    }

    #[tokio::test]
    async fn test_session_is_created_once_per_guild() {
        let player = player(&harness(5));
        let guild = GuildId::new(42);

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let player = player.clone();
            tasks.push(tokio::spawn(async move { player.session(guild) }));
        }

        let first = player.session(guild);
        for task in tasks {
            assert!(task.await.unwrap().same_session(&first));
        }
        assert_eq!(player.len(), 1);
    }

    #[tokio::test]
    async fn test_guilds_get_independent_sessions() {
        let player = player(&harness(5));
        let a = player.session(GuildId::new(1));
        let b = player.session(GuildId::new(2));

        assert!(!a.same_session(&b));
        assert_eq!(b.guild_id(), GuildId::new(2));
        assert!(player.get(GuildId::new(3)).is_none());
        assert_eq!(player.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_playing_in_one_guild_leaves_others_alone() {
        let h = harness(5);
        let player = player(&h);
        let busy = player.session(GuildId::new(1));
        let quiet = player.session(GuildId::new(2));

        busy.play(h.invoker, track("A")).await.unwrap();
        settle().await;

        assert_eq!(busy.status().await.unwrap().state, SessionState::Playing);
        assert_eq!(quiet.status().await.unwrap().state, SessionState::Disconnected);
    }
}
