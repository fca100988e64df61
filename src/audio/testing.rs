//! Transporte de voz, pipeline y notificador en memoria para los tests de sesión.

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::oneshot;

use super::{
    backend::{
        ActiveStream, AudioPipeline, EncoderHandle, Notifier, PlayerServices, StreamHandle, Tone,
        VoiceConnection, VoiceTransport,
    },
    session::{Invoker, SessionHandle},
    track::Track,
};
use crate::{
    config::PlayerSettings,
    error::{PlaybackError, VoiceError},
};

pub fn track(name: &str) -> Track {
    Track::new(name, name, format!("https://youtu.be/{name}"), UserId::new(7))
}

/// Deja avanzar a todas las tareas listas.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub struct FakeConnection {
    guild_id: GuildId,
    channel_id: ChannelId,
    ready: Arc<AtomicBool>,
    speaking: AtomicBool,
    disconnected: AtomicBool,
}

impl FakeConnection {
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn set_speaking(&self, speaking: bool) {
        self.speaking.store(speaking, Ordering::SeqCst);
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTransport {
    ready: Arc<AtomicBool>,
    fail: AtomicBool,
    joins: Mutex<Vec<ChannelId>>,
    connections: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeTransport {
    fn new() -> Self {
        let transport = Self::default();
        transport.set_ready(true);
        transport
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn fail_joins(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn joins(&self) -> Vec<ChannelId> {
        self.joins.lock().clone()
    }

    /// La última conexión entregada.
    pub fn connection(&self) -> Arc<FakeConnection> {
        self.connections
            .lock()
            .last()
            .cloned()
            .expect("no connection was opened")
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::Join("gateway timed out".into()));
        }
        self.joins.lock().push(channel_id);

        let connection = Arc::new(FakeConnection {
            guild_id,
            channel_id,
            ready: self.ready.clone(),
            speaking: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
        });
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}

type Log<T> = Arc<Mutex<Vec<T>>>;

/// Registra inicios, pausas y cancelaciones; los tests terminan un track con [`finish`](Self::finish).
#[derive(Default)]
pub struct FakePipeline {
    started: Log<String>,
    cancelled: Log<String>,
    pauses: Log<(String, bool)>,
    broken: Mutex<HashSet<String>>,
    running: Mutex<HashMap<String, oneshot::Sender<Result<(), PlaybackError>>>>,
}

impl FakePipeline {
    pub fn fail_start(&self, title: &str) {
        self.broken.lock().insert(title.to_string());
    }

    pub fn finish(&self, title: &str, result: Result<(), PlaybackError>) {
        if let Some(done) = self.running.lock().remove(title) {
            let _ = done.send(result);
        }
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }

    pub fn pauses(&self) -> Vec<(String, bool)> {
        self.pauses.lock().clone()
    }
}

struct FakeEncoder {
    title: String,
    cancelled: Log<String>,
}

impl EncoderHandle for FakeEncoder {
    fn cancel(&self) {
        self.cancelled.lock().push(self.title.clone());
    }
}

struct FakeStream {
    title: String,
    pauses: Log<(String, bool)>,
}

impl StreamHandle for FakeStream {
    fn set_paused(&self, paused: bool) {
        self.pauses.lock().push((self.title.clone(), paused));
    }
}

#[async_trait]
impl AudioPipeline for FakePipeline {
    async fn start(
        &self,
        track: &Track,
        _connection: Arc<dyn VoiceConnection>,
    ) -> Result<ActiveStream, PlaybackError> {
        let title = track.title().to_string();
        if self.broken.lock().contains(&title) {
            return Err(PlaybackError::Source(format!("{title} is unavailable")));
        }

        let (done_tx, done_rx) = oneshot::channel();
        self.running.lock().insert(title.clone(), done_tx);
        self.started.lock().push(title.clone());

        Ok(ActiveStream {
            encoder: Box::new(FakeEncoder {
                title: title.clone(),
                cancelled: self.cancelled.clone(),
            }),
            stream: Box::new(FakeStream {
                title,
                pauses: self.pauses.clone(),
            }),
            done: done_rx.map(|result| result.unwrap_or(Ok(()))).boxed(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    now_playing: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn now_playing(&self) -> Vec<String> {
        self.now_playing.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn message(&self, _channel_id: ChannelId, text: String, _tone: Tone) {
        self.messages.lock().push(text);
    }

    async fn now_playing(&self, _channel_id: ChannelId, track: Track) {
        self.now_playing.lock().push(track.title().to_string());
    }
}

pub fn settings(max_queue_length: usize) -> PlayerSettings {
    PlayerSettings {
        max_queue_length,
        idle_timeout: Duration::from_secs(300),
        ready_poll_attempts: 6,
        ready_poll_interval: Duration::from_secs(5),
        command_buffer: 8,
    }
}

pub struct Harness {
    pub session: SessionHandle,
    pub transport: Arc<FakeTransport>,
    pub pipeline: Arc<FakePipeline>,
    pub notifier: Arc<RecordingNotifier>,
    pub settings: PlayerSettings,
    pub voice: ChannelId,
    pub invoker: Invoker,
}

pub fn harness(max_queue_length: usize) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    build(max_queue_length, notifier.clone(), notifier)
}

/// Igual que [`harness`], pero las notificaciones van a `notifier` en vez del registro.
pub fn harness_with_notifier(max_queue_length: usize, notifier: Arc<dyn Notifier>) -> Harness {
    build(
        max_queue_length,
        Arc::new(RecordingNotifier::default()),
        notifier,
    )
}

fn build(
    max_queue_length: usize,
    recorder: Arc<RecordingNotifier>,
    notifier: Arc<dyn Notifier>,
) -> Harness {
    let transport = Arc::new(FakeTransport::new());
    let pipeline = Arc::new(FakePipeline::default());
    let services = PlayerServices {
        transport: transport.clone(),
        pipeline: pipeline.clone(),
        notifier,
    };
    let settings = settings(max_queue_length);
    let voice = ChannelId::new(100);

    Harness {
        session: SessionHandle::spawn(GuildId::new(1), settings.clone(), services),
        transport,
        pipeline,
        notifier: recorder,
        settings,
        voice,
        invoker: Invoker {
            user_id: UserId::new(7),
            voice_channel: Some(voice),
            text_channel: ChannelId::new(200),
        },
    }
}
