// Playback service - owns the engine of the one active session.
// Engine notifications and the progress sampler are merged into a single
// status stream per session; replacing a session is one swap under one lock.

use crate::audio::{
    AudioBackend, AudioEngine, AudioResource, EngineNotification, EngineNotifier, EngineSettings,
    DEFAULT_END_OF_TRACK_MARGIN,
};
use crate::playback::{AudioPlayerStatus, PlaybackInfo, PlaybackSpeed};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How often a playing session reports its position.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

pub type StatusReceiver = mpsc::UnboundedReceiver<AudioPlayerStatus>;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub sample_interval: Duration,
    pub end_of_track_margin: f64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            sample_interval: SAMPLE_INTERVAL,
            end_of_track_margin: DEFAULT_END_OF_TRACK_MARGIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

struct ActiveSession {
    id: SessionId,
    engine: Box<dyn AudioEngine>,
    status_tx: mpsc::UnboundedSender<AudioPlayerStatus>,
    /// Set while the user drags the position; the sampler stays quiet.
    scrubbing: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl ActiveSession {
    fn info(&self, end_margin: f64) -> PlaybackInfo {
        PlaybackInfo::sample(self.engine.as_ref(), end_margin)
    }

    fn emit(&self, status: AudioPlayerStatus) {
        let _ = self.status_tx.send(status);
    }
}

impl Drop for ActiveSession {
    // Dropping the session is the only way it ends: engine stopped, tasks
    // cancelled, stream closed (the sender goes with it).
    fn drop(&mut self) {
        self.engine.stop();
        for task in &self.tasks {
            task.abort();
        }
        debug!("Session {:?} closed", self.id);
    }
}

struct ServiceInner {
    backend: Arc<dyn AudioBackend>,
    settings: ServiceSettings,
    active: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
}

impl ServiceInner {
    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cheap to clone; every clone drives the same session slot.
#[derive(Clone)]
pub struct PlaybackService {
    inner: Arc<ServiceInner>,
}

impl PlaybackService {
    pub fn new(backend: Arc<dyn AudioBackend>, settings: ServiceSettings) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                backend,
                settings,
                active: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.inner.settings
    }

    /// Replace whatever is playing with `resource`, starting at
    /// `info.current_time`. Must be called from within a tokio runtime.
    pub fn start_session(
        &self,
        resource: &AudioResource,
        info: PlaybackInfo,
        speed: PlaybackSpeed,
    ) -> StatusReceiver {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let mut slot = self.inner.lock_active();

        if let Some(previous) = slot.take() {
            debug!("Replacing session {:?}", previous.id);
            drop(previous);
        }

        let settings = EngineSettings::new(resource.clone(), info.current_time, speed.multiplier())
            .with_duration_hint(info.duration);
        let (notifier, notifications) = EngineNotifier::channel();

        let mut engine = match self.inner.backend.open(&settings, notifier) {
            Ok(engine) => engine,
            Err(e) => {
                warn!("Failed to open {}: {}", resource, e);
                let _ = status_tx.send(AudioPlayerStatus::Error(Some(e.to_string())));
                return status_rx;
            }
        };
        engine.play();

        let id = SessionId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let weak = Arc::downgrade(&self.inner);
        let tasks = vec![
            tokio::spawn(run_sampler(weak.clone(), id)),
            tokio::spawn(watch_notifications(weak, id, notifications)),
        ];

        info!(
            "Session {:?} started: {} at {:.1}s, speed {}",
            id, resource, info.current_time, speed
        );
        *slot = Some(ActiveSession {
            id,
            engine,
            status_tx,
            scrubbing: false,
            tasks,
        });

        status_rx
    }

    pub fn pause(&self) {
        let end_margin = self.inner.settings.end_of_track_margin;
        let mut slot = self.inner.lock_active();
        if let Some(session) = slot.as_mut() {
            session.engine.pause();
            session.emit(AudioPlayerStatus::Paused(session.info(end_margin)));
        }
    }

    /// Jump to `progress` and hold there while the user is dragging.
    pub fn seek_and_pause(&self, progress: f64) {
        let end_margin = self.inner.settings.end_of_track_margin;
        let mut slot = self.inner.lock_active();
        let Some(session) = slot.as_mut() else {
            return;
        };

        let time = session.info(end_margin).duration * progress.clamp(0.0, 1.0);
        if session.engine.is_playing() {
            session.engine.pause();
        }
        session.engine.set_current_time(time);
        session.scrubbing = true;
        session.emit(AudioPlayerStatus::Paused(session.info(end_margin)));
    }

    /// Jump to `progress` and carry on playing.
    pub fn seek_and_resume(&self, progress: f64) {
        let end_margin = self.inner.settings.end_of_track_margin;
        let mut slot = self.inner.lock_active();
        let Some(session) = slot.as_mut() else {
            return;
        };

        let time = session.info(end_margin).duration * progress.clamp(0.0, 1.0);
        session.engine.set_current_time(time);
        if !session.engine.is_playing() {
            session.engine.play();
        }
        session.scrubbing = false;
        session.emit(AudioPlayerStatus::Playing(session.info(end_margin)));
    }

    /// Only meaningful while something is playing; otherwise ignored.
    pub fn set_rate(&self, speed: PlaybackSpeed) {
        let mut slot = self.inner.lock_active();
        match slot.as_mut() {
            Some(session) if session.engine.is_playing() => {
                session.engine.set_rate(speed.multiplier());
                debug!("Rate set to {} (engine at {:.2})", speed, session.engine.rate());
            }
            _ => debug!("Ignoring rate change to {}: nothing playing", speed),
        }
    }

    /// End the active session on request. Its stream sees `Stopped` last.
    pub fn stop(&self) {
        let session = self.inner.lock_active().take();
        if let Some(session) = session {
            session.emit(AudioPlayerStatus::Stopped);
            info!("Session {:?} stopped", session.id);
        }
    }

    pub fn has_active_session(&self) -> bool {
        self.inner.lock_active().is_some()
    }

    /// Rate the active engine is actually playing at.
    pub fn current_rate(&self) -> Option<f32> {
        self.inner.lock_active().as_ref().map(|session| session.engine.rate())
    }
}

async fn run_sampler(inner: Weak<ServiceInner>, id: SessionId) {
    let period = match inner.upgrade() {
        Some(inner) => inner.settings.sample_interval,
        None => return,
    };
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let slot = inner.lock_active();
        match slot.as_ref() {
            // a tick racing a replacement sees a different id and bows out
            Some(session) if session.id == id => {
                if session.engine.is_playing() && !session.scrubbing {
                    let info = session.info(inner.settings.end_of_track_margin);
                    session.emit(AudioPlayerStatus::Playing(info));
                }
            }
            _ => return,
        }
    }
}

async fn watch_notifications(
    inner: Weak<ServiceInner>,
    id: SessionId,
    mut notifications: mpsc::UnboundedReceiver<EngineNotification>,
) {
    let Some(notification) = notifications.recv().await else {
        return;
    };
    let Some(inner) = inner.upgrade() else {
        return;
    };

    let mut slot = inner.lock_active();
    if !matches!(slot.as_ref(), Some(session) if session.id == id) {
        return;
    }
    let Some(session) = slot.take() else {
        return;
    };
    drop(slot);

    let status = match notification {
        EngineNotification::Finished { successful } => {
            info!("Session {:?} finished (successful: {})", id, successful);
            AudioPlayerStatus::Finished { successful }
        }
        EngineNotification::DecodeError(message) => {
            warn!("Session {:?} decode error: {:?}", id, message);
            AudioPlayerStatus::Error(message)
        }
    };
    session.emit(status);
}
