use crate::audio::AudioEngine;
use crate::book::Chapter;
use serde::{Deserialize, Serialize};

/// Position within the current chapter, in seconds.
///
/// Values are never mutated in place by the player; every transition returns
/// a fresh `PlaybackInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackInfo {
    pub current_time: f64,
    pub duration: f64,
}

impl PlaybackInfo {
    pub fn new(current_time: f64, duration: f64) -> Self {
        Self {
            current_time,
            duration,
        }
    }

    /// Raw `current_time / duration`. NaN when `duration` is zero, so anything
    /// that branches on it should use [`PlaybackInfo::completion`] instead.
    pub fn progress(&self) -> f64 {
        self.current_time / self.duration
    }

    /// Progress clamped to `[0, 1]`. A zero-length chapter counts as complete.
    pub fn completion(&self) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        self.progress().clamp(0.0, 1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.completion() >= 1.0
    }

    pub fn time_left(&self) -> f64 {
        self.duration - self.current_time
    }

    pub fn fast_forward(&self, seconds: f64) -> Self {
        Self::new((self.current_time + seconds).min(self.duration), self.duration)
    }

    pub fn rewind(&self, seconds: f64) -> Self {
        Self::new((self.current_time - seconds).max(0.0), self.duration)
    }

    /// Caller is responsible for clamping `progress` to `[0, 1]`.
    pub fn with_progress(&self, progress: f64) -> Self {
        Self::new(progress * self.duration, self.duration)
    }

    /// Chapter at offset zero.
    pub fn start_of(chapter: &Chapter) -> Self {
        Self::new(0.0, chapter.duration)
    }

    /// Chapter fully consumed.
    pub fn end_of(chapter: &Chapter) -> Self {
        Self::new(chapter.duration, chapter.duration)
    }

    /// Snapshot of a live engine. `end_margin` is subtracted from the engine
    /// duration so a seek to 100% still leaves the engine a little audio to
    /// reach its own end-of-file notification.
    pub fn sample(engine: &dyn AudioEngine, end_margin: f64) -> Self {
        let duration = (engine.duration() - end_margin).max(0.0);
        let current_time = engine.current_time().clamp(0.0, duration);
        Self::new(current_time, duration)
    }
}
