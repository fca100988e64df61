//! Sesión de voz por guild.
//!
//! Una sesión es una única tarea dueña de todo el estado mutable de reproducción
//! de una guild. Los comandos llegan por un buzón y se responden por un oneshot;
//! la misma tarea maneja el loop de reproducción y consume las expiraciones del
//! timer de inactividad, así que ningún campo se escribe desde dos lugares.
//!
//! ```text
//! Disconnected --play--> Idle --track--> Playing --end, queue empty--> Idle
//!       ^                  |                |
//!       +---- idle timer / disconnect ------+
//! ```

use futures::future::BoxFuture;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    backend::{ActiveStream, EncoderHandle, PlayerServices, StreamHandle, Tone, VoiceConnection},
    idle::IdleTimer,
    queue::{PlaybackQueue, QueueRejected},
    track::Track,
};
use crate::{
    config::PlayerSettings,
    error::{PlaybackError, PlayerError},
};

/// Quién envió un comando y dónde está.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invoker {
    pub user_id: UserId,
    /// Canal de voz en el que está el usuario, si hay uno.
    pub voice_channel: Option<ChannelId>,
    /// Canal de texto de origen del comando; ahí van las notificaciones.
    pub text_channel: ChannelId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Conectado sin nada sonando. El timer de inactividad está armado.
    Idle,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub channel_id: Option<ChannelId>,
    pub now_playing: Option<Track>,
    pub pending: usize,
    pub paused: bool,
    pub idle_armed: bool,
}

/// Resultado de encolar con éxito.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    pub track: Track,
    /// Fila (base 0) en el listado; la fila 0 es el track en reproducción.
    pub position: usize,
    /// Si esta llamada tuvo que unirse primero al canal de voz.
    pub joined: bool,
}

type Reply<T> = oneshot::Sender<Result<T, PlayerError>>;

pub(crate) enum SessionCommand {
    Play {
        invoker: Invoker,
        track: Track,
        reply: Reply<Enqueued>,
    },
    Skip {
        invoker: Invoker,
        reply: Reply<Track>,
    },
    Pause {
        invoker: Invoker,
        reply: Reply<()>,
    },
    Resume {
        invoker: Invoker,
        reply: Reply<()>,
    },
    Clear {
        invoker: Invoker,
        reply: Reply<usize>,
    },
    Disconnect {
        invoker: Invoker,
        reply: Reply<()>,
    },
    List {
        invoker: Invoker,
        reply: Reply<Vec<Track>>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    IdleExpired {
        generation: u64,
    },
}

/// Dirección clonable de una sesión en ejecución.
#[derive(Clone)]
pub struct SessionHandle {
    guild_id: GuildId,
    mailbox: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Lanza la tarea de la sesión. Debe llamarse dentro de un runtime de tokio.
    pub fn spawn(guild_id: GuildId, settings: PlayerSettings, services: PlayerServices) -> Self {
        let (mailbox, commands) = mpsc::channel(settings.command_buffer.max(1));
        let session = Session::new(guild_id, settings, services, commands, mailbox.downgrade());
        tokio::spawn(session.run());

        Self { guild_id, mailbox }
    }

    #[cfg(test)]
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Si ambos handles apuntan a la misma tarea de sesión.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        self.mailbox.same_channel(&other.mailbox)
    }

    /// Encola un track, uniéndose al canal del usuario si está desconectada.
    pub async fn play(&self, invoker: Invoker, track: Track) -> Result<Enqueued, PlayerError> {
        self.request(|reply| SessionCommand::Play {
            invoker,
            track,
            reply,
        })
        .await
    }

    /// Cancela el track actual y lo devuelve.
    pub async fn skip(&self, invoker: Invoker) -> Result<Track, PlayerError> {
        self.request(|reply| SessionCommand::Skip { invoker, reply })
            .await
    }

    pub async fn pause(&self, invoker: Invoker) -> Result<(), PlayerError> {
        self.request(|reply| SessionCommand::Pause { invoker, reply })
            .await
    }

    pub async fn resume(&self, invoker: Invoker) -> Result<(), PlayerError> {
        self.request(|reply| SessionCommand::Resume { invoker, reply })
            .await
    }

    /// Descarta los tracks pendientes y luego salta el actual. Devuelve cuántos descartó.
    pub async fn clear(&self, invoker: Invoker) -> Result<usize, PlayerError> {
        self.request(|reply| SessionCommand::Clear { invoker, reply })
            .await
    }

    pub async fn disconnect(&self, invoker: Invoker) -> Result<(), PlayerError> {
        self.request(|reply| SessionCommand::Disconnect { invoker, reply })
            .await
    }

    /// Primero el track actual, luego los pendientes.
    pub async fn list(&self, invoker: Invoker) -> Result<Vec<Track>, PlayerError> {
        self.request(|reply| SessionCommand::List { invoker, reply })
            .await
    }

    pub async fn status(&self) -> Result<SessionStatus, PlayerError> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(SessionCommand::Status { reply })
            .await
            .map_err(|_| PlayerError::Unavailable)?;
        response.await.map_err(|_| PlayerError::Unavailable)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, PlayerError> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(command(reply))
            .await
            .map_err(|_| PlayerError::Unavailable)?;
        response.await.map_err(|_| PlayerError::Unavailable)?
    }
}

type PlaybackFuture = BoxFuture<'static, PlaybackStep>;

enum PlaybackStep {
    Streaming(ActiveStream),
    Finished(TrackOutcome),
}

enum TrackOutcome {
    Completed,
    Skipped,
    Failed(PlaybackError),
}

/// El track desde que sale de la cola hasta que termina.
struct InFlight {
    cancel: CancellationToken,
    encoder: Option<Box<dyn EncoderHandle>>,
    stream: Option<Box<dyn StreamHandle>>,
    step: Option<PlaybackFuture>,
}

struct Session {
    guild_id: GuildId,
    settings: PlayerSettings,
    services: PlayerServices,
    commands: mpsc::Receiver<SessionCommand>,
    mailbox: mpsc::WeakSender<SessionCommand>,

    channel_id: Option<ChannelId>,
    text_channel: Option<ChannelId>,
    connection: Option<Arc<dyn VoiceConnection>>,
    queue: PlaybackQueue,
    is_playing: bool,
    paused: bool,
    in_flight: Option<InFlight>,
    idle: IdleTimer,
}

impl Session {
    fn new(
        guild_id: GuildId,
        settings: PlayerSettings,
        services: PlayerServices,
        commands: mpsc::Receiver<SessionCommand>,
        mailbox: mpsc::WeakSender<SessionCommand>,
    ) -> Self {
        Self {
            guild_id,
            queue: PlaybackQueue::closed(settings.max_queue_length),
            idle: IdleTimer::new(settings.idle_timeout),
            settings,
            services,
            commands,
            mailbox,
            channel_id: None,
            text_channel: None,
            connection: None,
            is_playing: false,
            paused: false,
            in_flight: None,
        }
    }

    async fn run(mut self) {
        debug!(guild_id = %self.guild_id, "🎛️ Tarea de sesión iniciada");

        loop {
            self.start_next_track();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                step = next_step(&mut self.in_flight) => self.on_step(step).await,
            }
        }

        if self.connection.is_some() {
            self.disconnect().await;
        }
        debug!(guild_id = %self.guild_id, "Tarea de sesión detenida");
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Play {
                invoker,
                track,
                reply,
            } => {
                let result = self.play(invoker, track).await;
                let _ = reply.send(result);
            }
            SessionCommand::Skip { invoker, reply } => {
                let _ = reply.send(self.skip(&invoker));
            }
            SessionCommand::Pause { invoker, reply } => {
                let _ = reply.send(self.set_paused(&invoker, true));
            }
            SessionCommand::Resume { invoker, reply } => {
                let _ = reply.send(self.set_paused(&invoker, false));
            }
            SessionCommand::Clear { invoker, reply } => {
                let _ = reply.send(self.clear(&invoker));
            }
            SessionCommand::Disconnect { invoker, reply } => {
                let result = match self.check_command(&invoker) {
                    Ok(()) => {
                        self.disconnect().await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            SessionCommand::List { invoker, reply } => {
                let _ = reply.send(self.check_command(&invoker).map(|()| self.queue.snapshot()));
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            SessionCommand::IdleExpired { generation } => self.on_idle_expired(generation).await,
        }
    }

    // Precondiciones

    /// El usuario debe estar en un canal de voz, y en el nuestro si ya tenemos uno.
    fn check_channel(&self, invoker: &Invoker) -> Result<ChannelId, PlayerError> {
        let requested = invoker
            .voice_channel
            .ok_or(PlayerError::NotInVoiceChannel)?;
        match self.channel_id {
            Some(current) if current != requested => Err(PlayerError::OtherChannel),
            _ => Ok(requested),
        }
    }

    /// Chequeos comunes a todo comando salvo `play`: primero conexión, luego canal.
    fn check_command(&self, invoker: &Invoker) -> Result<(), PlayerError> {
        if self.connection.is_none() {
            return Err(PlayerError::NotConnected);
        }
        self.check_channel(invoker).map(|_| ())
    }

    fn check_playing(&self, invoker: &Invoker) -> Result<(), PlayerError> {
        self.check_command(invoker)?;
        if !self.is_playing {
            return Err(PlayerError::NotPlaying);
        }
        Ok(())
    }

    // Comandos

    async fn play(&mut self, invoker: Invoker, track: Track) -> Result<Enqueued, PlayerError> {
        let channel_id = self.check_channel(&invoker)?;

        let joined = self.connection.is_none();
        if joined {
            self.connect(channel_id, invoker.text_channel).await?;
        }

        match self.queue.try_push(track.clone()) {
            Ok(position) => Ok(Enqueued {
                track,
                position,
                joined,
            }),
            Err(QueueRejected::Full) => Err(PlayerError::QueueFull {
                capacity: self.queue.capacity(),
            }),
            Err(QueueRejected::Closed) => {
                error!(guild_id = %self.guild_id, "Cola usada estando cerrada");
                Err(PlayerError::Unavailable)
            }
        }
    }

    fn skip(&mut self, invoker: &Invoker) -> Result<Track, PlayerError> {
        self.check_playing(invoker)?;
        let current = self.queue.current().cloned().ok_or(PlayerError::NotPlaying)?;

        info!(guild_id = %self.guild_id, track = %current, "⏭️ Saltando track");
        self.cancel_current();
        Ok(current)
    }

    fn set_paused(&mut self, invoker: &Invoker, paused: bool) -> Result<(), PlayerError> {
        self.check_playing(invoker)?;
        if self.paused == paused {
            return Ok(());
        }

        self.paused = paused;
        if let Some(stream) = self.in_flight.as_ref().and_then(|f| f.stream.as_ref()) {
            stream.set_paused(paused);
        }
        if paused {
            info!(guild_id = %self.guild_id, "⏸️ Reproducción pausada");
        } else {
            info!(guild_id = %self.guild_id, "▶️ Reproducción reanudada");
        }
        Ok(())
    }

    fn clear(&mut self, invoker: &Invoker) -> Result<usize, PlayerError> {
        self.check_command(invoker)?;
        let removed = self.queue.clear_pending();
        if self.is_playing {
            self.cancel_current();
        }
        Ok(removed)
    }

    fn status(&self) -> SessionStatus {
        let state = if self.connection.is_none() {
            SessionState::Disconnected
        } else if self.is_playing {
            SessionState::Playing
        } else {
            SessionState::Idle
        };

        SessionStatus {
            state,
            channel_id: self.channel_id,
            now_playing: self.queue.current().cloned(),
            pending: self.queue.len(),
            paused: self.paused,
            idle_armed: self.idle.is_armed(),
        }
    }

    // Ciclo de vida

    async fn connect(
        &mut self,
        channel_id: ChannelId,
        text_channel: ChannelId,
    ) -> Result<(), PlayerError> {
        info!(guild_id = %self.guild_id, %channel_id, "🔊 Uniéndose al canal de voz");

        let connection = self
            .services
            .transport
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| {
                error!(guild_id = %self.guild_id, %channel_id, error = %e, "No se pudo unir al canal de voz");
                PlayerError::JoinFailed(e)
            })?;

        self.channel_id = Some(connection.channel_id());
        self.connection = Some(connection);
        self.text_channel = Some(text_channel);
        self.queue.reopen();
        self.paused = false;
        Ok(())
    }

    /// Desarma todo. Se puede llamar en cualquier estado.
    async fn disconnect(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
            if let Some(encoder) = in_flight.encoder {
                encoder.cancel();
            }
        }
        self.queue.close();
        self.idle.cancel();
        self.is_playing = false;
        self.paused = false;

        if let Some(connection) = self.connection.take() {
            connection.set_speaking(false).await;
            if let Err(e) = connection.disconnect().await {
                warn!(guild_id = %self.guild_id, error = %e, "La desconexión de voz reportó un error");
            }
            info!(guild_id = %self.guild_id, "👋 Salió del canal de voz");
        }
        self.channel_id = None;
        self.text_channel = None;
    }

    fn cancel_current(&mut self) {
        if let Some(in_flight) = &self.in_flight {
            in_flight.cancel.cancel();
            if let Some(encoder) = &in_flight.encoder {
                encoder.cancel();
            }
            if let (true, Some(stream)) = (self.paused, &in_flight.stream) {
                stream.set_paused(false);
            }
        }
        self.paused = false;
    }

    fn arm_idle_timer(&mut self) {
        self.idle.arm(self.mailbox.clone(), |generation| {
            SessionCommand::IdleExpired { generation }
        });
    }

    async fn on_idle_expired(&mut self, generation: u64) {
        if !self.idle.fire(generation) {
            debug!(guild_id = %self.guild_id, generation, "Ignorando timer de inactividad obsoleto");
            return;
        }
        if self.is_playing || self.connection.is_none() {
            return;
        }

        info!(guild_id = %self.guild_id, "💤 Desconectando por inactividad");
        let text_channel = self.text_channel;
        self.disconnect().await;
        if let Some(channel_id) = text_channel {
            self.notify(channel_id, "Disconnected for inactivity".to_string(), Tone::Default);
        }
    }

    // Loop de reproducción

    /// Entrega el siguiente track de la cola al loop cuando no hay ninguno en curso.
    fn start_next_track(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(connection) = self.connection.clone() else {
            return;
        };
        let Some(track) = self.queue.advance() else {
            return;
        };

        self.idle.cancel();
        self.is_playing = true;
        self.paused = false;

        let cancel = CancellationToken::new();
        let prepare = prepare_track(
            track,
            connection,
            self.services.clone(),
            self.text_channel,
            self.settings.clone(),
            cancel.clone(),
        );
        self.in_flight = Some(InFlight {
            cancel,
            encoder: None,
            stream: None,
            step: Some(Box::pin(prepare)),
        });
    }

    async fn on_step(&mut self, step: PlaybackStep) {
        match step {
            PlaybackStep::Streaming(active) => self.on_stream_started(active).await,
            PlaybackStep::Finished(outcome) => self.on_track_finished(outcome).await,
        }
    }

    async fn on_stream_started(&mut self, active: ActiveStream) {
        let Some(in_flight) = self.in_flight.as_mut() else {
            active.encoder.cancel();
            return;
        };

        let cancel = in_flight.cancel.clone();
        if cancel.is_cancelled() {
            active.encoder.cancel();
        } else if self.paused {
            active.stream.set_paused(true);
        }

        let done = active.done;
        in_flight.encoder = Some(active.encoder);
        in_flight.stream = Some(active.stream);
        in_flight.step = Some(Box::pin(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => TrackOutcome::Skipped,
                result = done => match result {
                    Ok(()) => TrackOutcome::Completed,
                    Err(e) => TrackOutcome::Failed(e),
                },
            };
            PlaybackStep::Finished(outcome)
        }));

        if let Some(connection) = &self.connection {
            connection.set_speaking(true).await;
        }
    }

    async fn on_track_finished(&mut self, outcome: TrackOutcome) {
        // Al soltar la entrada en curso se liberan los handles de encoder y stream
        self.in_flight = None;
        let finished = self.queue.finish_current();
        self.is_playing = false;
        self.paused = false;

        if let Some(connection) = &self.connection {
            connection.set_speaking(false).await;
        }

        let title = finished.as_ref().map(Track::title).unwrap_or_default();
        match outcome {
            TrackOutcome::Completed => {
                info!(guild_id = %self.guild_id, track = title, "✅ Track terminado")
            }
            TrackOutcome::Skipped => {
                info!(guild_id = %self.guild_id, track = title, "⏭️ Track cancelado")
            }
            TrackOutcome::Failed(e) => {
                error!(guild_id = %self.guild_id, track = title, error = %e, "❌ Error en reproducción");
                if let Some(channel_id) = self.text_channel {
                    self.notify(channel_id, format!("Couldn't play *{title}*"), Tone::Error);
                }
            }
        }

        if self.connection.is_some() && self.queue.is_empty() {
            self.arm_idle_timer();
        }
    }

    /// Se lanza sin esperar; una API de chat lenta no frena la sesión.
    fn notify(&self, channel_id: ChannelId, text: String, tone: Tone) {
        let notifier = self.services.notifier.clone();
        tokio::spawn(async move { notifier.message(channel_id, text, tone).await });
    }
}

/// Resuelve con el siguiente paso del track en curso, o nunca si no hay ninguno.
async fn next_step(in_flight: &mut Option<InFlight>) -> PlaybackStep {
    let Some(step) = in_flight.as_mut().and_then(|f| f.step.as_mut()) else {
        return std::future::pending().await;
    };
    let next = step.await;
    if let Some(in_flight) = in_flight.as_mut() {
        in_flight.step = None;
    }
    next
}

/// Anuncia el track, espera al transporte e inicia el stream.
async fn prepare_track(
    track: Track,
    connection: Arc<dyn VoiceConnection>,
    services: PlayerServices,
    text_channel: Option<ChannelId>,
    settings: PlayerSettings,
    cancel: CancellationToken,
) -> PlaybackStep {
    let start = async {
        if let Some(channel_id) = text_channel {
            services.notifier.now_playing(channel_id, track.clone()).await;
        }

        let ready = wait_until_ready(
            connection.as_ref(),
            settings.ready_poll_attempts,
            settings.ready_poll_interval,
        )
        .await;
        if !ready {
            warn!(track = track.title(), "La conexión de voz sigue sin estar lista, se reproduce igual");
        }

        services.pipeline.start(&track, connection.clone()).await
    };

    tokio::select! {
        _ = cancel.cancelled() => PlaybackStep::Finished(TrackOutcome::Skipped),
        started = start => match started {
            Ok(active) => PlaybackStep::Streaming(active),
            Err(e) => PlaybackStep::Finished(TrackOutcome::Failed(e)),
        },
    }
}

async fn wait_until_ready(
    connection: &dyn VoiceConnection,
    attempts: u32,
    interval: Duration,
) -> bool {
    for attempt in 1..=attempts {
        if connection.is_ready().await {
            return true;
        }
        debug!(attempt, "Conexión de voz aún no lista");
        tokio::time::sleep(interval).await;
    }
    connection.is_ready().await
}
