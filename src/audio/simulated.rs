// Simulated engine - a virtual transport running on tokio time.
// Used by `--simulate` and by the tests (with a paused clock it is fully
// deterministic). No audio is produced.

use super::{
    AudioBackend, AudioEngine, AudioResource, EngineError, EngineNotifier, EngineSettings,
    ResourceResolver,
};
use crate::book::Book;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTrack {
    pub duration: f64,
    /// Position at which the engine reports a decode error and goes silent.
    pub decode_error_at: Option<f64>,
}

impl SimulatedTrack {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            decode_error_at: None,
        }
    }

    pub fn failing_at(mut self, seconds: f64) -> Self {
        self.decode_error_at = Some(seconds);
        self
    }
}

#[derive(Debug, Default)]
pub struct SimulatedBackend {
    tracks: HashMap<PathBuf, SimulatedTrack>,
    opened: AtomicUsize,
    live: Arc<AtomicUsize>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, path: impl Into<PathBuf>, track: SimulatedTrack) -> Self {
        self.tracks.insert(path.into(), track);
        self
    }

    /// One track per chapter, keyed by the chapter's audio reference.
    pub fn for_book(book: &Book) -> Self {
        book.chapters().iter().fold(Self::new(), |backend, chapter| {
            backend.with_track(&chapter.audio_ref, SimulatedTrack::new(chapter.duration))
        })
    }

    /// Total number of engines opened so far.
    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Engines opened and not yet dropped.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Resolves every audio reference of `book` to a resource named after the
/// reference itself, matching the keys used by [`SimulatedBackend::for_book`].
pub fn book_resolver(book: &Book) -> impl ResourceResolver {
    let known: HashSet<String> = book.chapters().iter().map(|c| c.audio_ref.clone()).collect();
    move |audio_ref: &str| known.contains(audio_ref).then(|| AudioResource::new(audio_ref))
}

impl AudioBackend for SimulatedBackend {
    fn open(
        &self,
        settings: &EngineSettings,
        notifier: EngineNotifier,
    ) -> Result<Box<dyn AudioEngine>, EngineError> {
        let track = self
            .tracks
            .get(settings.resource.path())
            .ok_or_else(|| EngineError::Open {
                resource: settings.resource.to_string(),
                reason: "no such track".to_string(),
            })?;

        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        debug!("Simulated engine opened for {}", settings.resource);

        Ok(Box::new(SimulatedEngine {
            duration: track.duration,
            decode_error_at: track.decode_error_at,
            position: settings.start_time.clamp(0.0, track.duration),
            anchor: None,
            rate: if settings.enable_rate { settings.rate } else { 1.0 },
            enable_rate: settings.enable_rate,
            notifier,
            end_timer: None,
            live: Arc::clone(&self.live),
        }))
    }
}

pub struct SimulatedEngine {
    duration: f64,
    decode_error_at: Option<f64>,
    /// Position at `anchor`, or the frozen position while not playing.
    position: f64,
    anchor: Option<Instant>,
    rate: f32,
    enable_rate: bool,
    notifier: EngineNotifier,
    end_timer: Option<JoinHandle<()>>,
    live: Arc<AtomicUsize>,
}

impl SimulatedEngine {
    /// Where the transport goes silent: a decode error or the end of the track.
    fn stop_point(&self) -> f64 {
        self.pending_failure().unwrap_or(self.duration)
    }

    /// Decode error still ahead of the anchored position, if any.
    fn pending_failure(&self) -> Option<f64> {
        self.decode_error_at
            .filter(|&at| at >= self.position && at < self.duration)
    }

    fn now_position(&self) -> f64 {
        match self.anchor {
            Some(anchor) => {
                let elapsed = anchor.elapsed().as_secs_f64() * f64::from(self.rate);
                (self.position + elapsed).min(self.stop_point())
            }
            None => self.position,
        }
    }

    fn freeze(&mut self) {
        self.position = self.now_position();
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.end_timer.take() {
            timer.abort();
        }
    }

    /// Schedule the next end-of-file or decode-error notification.
    fn arm(&mut self) {
        self.disarm();
        if self.anchor.is_none() {
            return;
        }

        let failure = self.pending_failure();
        let target = failure.unwrap_or(self.duration);
        let rate = f64::from(self.rate.max(f32::EPSILON));
        let wait = Duration::from_secs_f64(((target - self.position) / rate).max(0.0));
        let notifier = self.notifier.clone();

        self.end_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            match failure {
                Some(at) => notifier.decode_error(Some(format!("decode error at {:.1}s", at))),
                None => notifier.finished(true),
            }
        }));
    }
}

impl AudioEngine for SimulatedEngine {
    fn play(&mut self) {
        if self.is_playing() {
            return;
        }
        self.position = self.now_position();
        self.anchor = Some(Instant::now());
        self.arm();
    }

    fn pause(&mut self) {
        self.freeze();
        self.anchor = None;
        self.disarm();
    }

    fn stop(&mut self) {
        self.pause();
    }

    fn is_playing(&self) -> bool {
        self.anchor.is_some() && self.now_position() < self.stop_point()
    }

    fn current_time(&self) -> f64 {
        self.now_position()
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.position = seconds.clamp(0.0, self.duration);
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
        self.arm();
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn rate(&self) -> f32 {
        self.rate
    }

    fn set_rate(&mut self, rate: f32) {
        if !self.enable_rate {
            return;
        }
        self.freeze();
        self.rate = rate;
        self.arm();
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.disarm();
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::EngineNotification;

    fn open(
        backend: &SimulatedBackend,
        path: &str,
        start: f64,
        rate: f32,
    ) -> (
        Box<dyn AudioEngine>,
        tokio::sync::mpsc::UnboundedReceiver<EngineNotification>,
    ) {
        let (notifier, rx) = EngineNotifier::channel();
        let settings = EngineSettings::new(AudioResource::new(path), start, rate);
        (backend.open(&settings, notifier).unwrap(), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_follows_rate() {
        let backend = SimulatedBackend::new().with_track("a", SimulatedTrack::new(60.0));
        let (mut engine, _rx) = open(&backend, "a", 10.0, 2.0);

        engine.play();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!((engine.current_time() - 20.0).abs() < 1e-6);

        engine.pause();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!((engine.current_time() - 20.0).abs() < 1e-6);
        assert!(!engine.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finishes_at_end() {
        let backend = SimulatedBackend::new().with_track("a", SimulatedTrack::new(3.0));
        let (mut engine, mut rx) = open(&backend, "a", 0.0, 1.0);

        engine.play();
        assert_eq!(rx.recv().await, Some(EngineNotification::Finished { successful: true }));
        assert!(!engine.is_playing());
        assert_eq!(engine.current_time(), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_error_fires_before_end() {
        let backend =
            SimulatedBackend::new().with_track("a", SimulatedTrack::new(10.0).failing_at(4.0));
        let (mut engine, mut rx) = open(&backend, "a", 0.0, 1.0);

        engine.play();
        match rx.recv().await {
            Some(EngineNotification::DecodeError(Some(message))) => assert!(message.contains("4.0")),
            other => panic!("unexpected notification: {:?}", other),
        }
        assert!(!engine.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_count_tracks_drops() {
        let backend = SimulatedBackend::new().with_track("a", SimulatedTrack::new(3.0));
        let (engine, _rx) = open(&backend, "a", 0.0, 1.0);
        assert_eq!(backend.live_count(), 1);
        drop(engine);
        assert_eq!(backend.live_count(), 0);
        assert_eq!(backend.opened_count(), 1);
    }

    #[test]
    fn test_missing_track_fails_to_open() {
        let backend = SimulatedBackend::new();
        let (notifier, _rx) = EngineNotifier::channel();
        let settings = EngineSettings::new(AudioResource::new("nope"), 0.0, 1.0);
        assert!(matches!(backend.open(&settings, notifier), Err(EngineError::Open { .. })));
    }
}
