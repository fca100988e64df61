//! Tipos de error compartidos por el orquestador y sus adaptadores.
//!
//! [`PlayerError`] es lo que un comando recibe de una sesión. Su texto de
//! `Display` es el mensaje que ve el usuario, así que los handlers lo reenvían tal cual.

use thiserror::Error;

/// Falla de un comando de sesión.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("You have to join a voice channel")]
    NotInVoiceChannel,

    #[error("I'm playing in another channel")]
    OtherChannel,

    #[error("I'm not in a voice channel right now")]
    NotConnected,

    #[error("I'm not playing anything right now")]
    NotPlaying,

    #[error("Couldn't add song to queue. Check if you went over the queue limit ({capacity})")]
    QueueFull { capacity: usize },

    #[error("Couldn't join your voice channel")]
    JoinFailed(#[source] VoiceError),

    #[error("Couldn't fetch the video, check if the url is correct")]
    Resolve(#[source] ResolveError),

    /// La tarea de la sesión ya no existe. Solo ocurre durante el apagado.
    #[error("The player for this server is unavailable")]
    Unavailable,
}

impl PlayerError {
    /// Precondiciones fallidas por culpa del usuario, a diferencia de fallas que van al log.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotInVoiceChannel
                | Self::OtherChannel
                | Self::NotConnected
                | Self::NotPlaying
                | Self::QueueFull { .. }
        )
    }
}

/// Fallas del transporte de voz.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error("failed to join voice channel: {0}")]
    Join(String),

    #[error("failed to leave voice channel: {0}")]
    Leave(String),
}

/// Falla al transmitir un track. El loop la trata como "track terminado".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("could not open audio source: {0}")]
    Source(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("voice connection is gone")]
    ConnectionLost,
}

/// Fallas al resolver un track.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no results for `{0}`")]
    NotFound(String),

    #[error("metadata lookup failed: {0}")]
    Metadata(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_are_not_faults() {
        assert!(PlayerError::NotInVoiceChannel.is_user_error());
        assert!(PlayerError::QueueFull { capacity: 3 }.is_user_error());
        assert!(!PlayerError::JoinFailed(VoiceError::Join("timeout".into())).is_user_error());
        assert!(!PlayerError::Unavailable.is_user_error());
    }

    #[test]
    fn test_queue_full_mentions_capacity() {
        let message = PlayerError::QueueFull { capacity: 7 }.to_string();
        assert!(message.ends_with("(7)"), "{message}");
    }
}
