// Audio engine boundary - the player never decodes anything itself.
// A backend opens one engine per session; the engine reports end-of-file and
// decode errors through a notifier channel instead of callbacks.

pub mod resolver;
pub mod simulated;
#[cfg(feature = "audio")]
pub mod rodio_engine;

pub use resolver::{DirectoryResolver, ResourceResolver};
pub use simulated::{book_resolver, SimulatedBackend, SimulatedTrack};
#[cfg(feature = "audio")]
pub use rodio_engine::RodioBackend;

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Seconds shaved off every engine duration. Seeking to 100% then leaves the
/// engine a short tail to play, so it still fires its finished notification.
pub const DEFAULT_END_OF_TRACK_MARGIN: f64 = 0.1;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot open '{resource}': {reason}")]
    Open { resource: String, reason: String },

    #[error("audio output unavailable: {0}")]
    Output(String),
}

/// A playable file, as produced by a `ResourceResolver`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioResource {
    path: PathBuf,
}

impl AudioResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for AudioResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// How a session wants its engine set up.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub resource: AudioResource,
    pub start_time: f64,
    pub rate: f32,
    pub enable_rate: bool,
    /// Expected length from the book, for engines that cannot measure it.
    pub duration_hint: Option<f64>,
}

impl EngineSettings {
    pub fn new(resource: AudioResource, start_time: f64, rate: f32) -> Self {
        Self {
            resource,
            start_time,
            rate,
            enable_rate: true,
            duration_hint: None,
        }
    }

    pub fn with_duration_hint(mut self, duration: f64) -> Self {
        self.duration_hint = Some(duration);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    Finished { successful: bool },
    DecodeError(Option<String>),
}

/// Sending half handed to an engine when it is opened.
#[derive(Debug, Clone)]
pub struct EngineNotifier {
    sender: mpsc::UnboundedSender<EngineNotification>,
}

impl EngineNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn finished(&self, successful: bool) {
        let _ = self.sender.send(EngineNotification::Finished { successful });
    }

    pub fn decode_error(&self, message: Option<String>) {
        let _ = self.sender.send(EngineNotification::DecodeError(message));
    }
}

/// One open track. Transport calls are idempotent: pausing a paused engine or
/// stopping a stopped one does nothing.
pub trait AudioEngine: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);
    fn duration(&self) -> f64;
    fn rate(&self) -> f32;
    fn set_rate(&mut self, rate: f32);
}

/// Opens engines. Shared by the playback service for its whole lifetime.
pub trait AudioBackend: Send + Sync {
    fn open(
        &self,
        settings: &EngineSettings,
        notifier: EngineNotifier,
    ) -> Result<Box<dyn AudioEngine>, EngineError>;
}
