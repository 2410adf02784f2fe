use super::PlaybackInfo;

/// Everything a playback session reports back to the player.
///
/// `Finished` and `Error` are terminal: nothing follows them on the same
/// session stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioPlayerStatus {
    Playing(PlaybackInfo),
    Paused(PlaybackInfo),
    Stopped,
    Finished { successful: bool },
    Error(Option<String>),
}

impl AudioPlayerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AudioPlayerStatus::Finished { .. } | AudioPlayerStatus::Error(_) | AudioPlayerStatus::Stopped
        )
    }
}
