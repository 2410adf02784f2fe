// Playback values - position/duration algebra, speed steps and session events

pub mod info;
pub mod speed;
pub mod status;

pub use info::PlaybackInfo;
pub use speed::PlaybackSpeed;
pub use status::AudioPlayerStatus;

/// Fast-forward step in seconds.
pub const FAST_FORWARD_STEP: f64 = 10.0;

/// Rewind step in seconds. Shorter than the fast-forward step on purpose.
pub const REWIND_STEP: f64 = 5.0;
