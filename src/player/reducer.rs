use super::PlayerState;
use crate::audio::{AudioResource, ResourceResolver};
use crate::playback::{AudioPlayerStatus, PlaybackInfo, PlaybackSpeed, FAST_FORWARD_STEP, REWIND_STEP};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the listener asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Play,
    Pause,
    FastForward,
    Rewind,
    /// Position control is being dragged; progress in `[0, 1]`.
    ScrubMoving(f64),
    ScrubReleased,
    NextChapter,
    PreviousChapter,
    CycleSpeed,
    DismissAlert,
}

/// Anything the reducer folds: user intents and session reports.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Intent(Intent),
    Player(AudioPlayerStatus),
}

impl From<Intent> for Action {
    fn from(intent: Intent) -> Self {
        Action::Intent(intent)
    }
}

impl From<AudioPlayerStatus> for Action {
    fn from(status: AudioPlayerStatus) -> Self {
        Action::Player(status)
    }
}

/// Work for the playback service. The runtime guarantees one live
/// `StartSession` stream and one pending seek: newer ones cancel older ones.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartSession {
        resource: AudioResource,
        info: PlaybackInfo,
        speed: PlaybackSpeed,
    },
    Pause,
    SeekAndPause(f64),
    SeekAndResume(f64),
    SetRate(PlaybackSpeed),
    StopSession,
}

pub struct PlaybackReducer {
    resolver: Arc<dyn ResourceResolver>,
}

impl PlaybackReducer {
    pub fn new(resolver: Arc<dyn ResourceResolver>) -> Self {
        Self { resolver }
    }

    /// Fold one action into `state`, returning the commands it produced.
    pub fn reduce(&self, state: &mut PlayerState, action: impl Into<Action>) -> Vec<Command> {
        let mut commands = Vec::new();
        match action.into() {
            Action::Intent(intent) => self.apply_intent(state, intent, &mut commands),
            Action::Player(status) => self.apply_status(state, status, &mut commands),
        }
        commands
    }

    fn apply_intent(&self, state: &mut PlayerState, intent: Intent, commands: &mut Vec<Command>) {
        debug!("Intent {:?}", intent);
        match intent {
            Intent::Play => self.play(state, commands),

            Intent::Pause => {
                state.is_playing = false;
                commands.push(Command::Pause);
            }

            Intent::FastForward => {
                state.playback_info = state.playback_info.fast_forward(FAST_FORWARD_STEP);
                commands.push(Command::SeekAndResume(state.playback_info.completion()));
            }

            Intent::Rewind => {
                state.playback_info = state.playback_info.rewind(REWIND_STEP);
                commands.push(Command::SeekAndResume(state.playback_info.completion()));
            }

            Intent::ScrubMoving(progress) if !progress.is_finite() => {
                warn!("Ignoring scrub to non-finite progress {}", progress);
            }

            Intent::ScrubMoving(progress) => {
                let progress = progress.clamp(0.0, 1.0);
                state.playback_info = state.playback_info.with_progress(progress);
                state.is_scrubbing = true;
                commands.push(Command::SeekAndPause(progress));
            }

            Intent::ScrubReleased => {
                state.is_scrubbing = false;
                commands.push(Command::SeekAndResume(state.playback_info.completion()));
            }

            Intent::NextChapter => {
                state.playback_info = state.playback_info.with_progress(1.0);
                self.advance_if_complete(state, commands);
            }

            Intent::PreviousChapter => {
                debug_assert!(
                    state.current_chapter_index > 0,
                    "previous chapter requested on the first chapter"
                );
                if state.current_chapter_index == 0 {
                    return;
                }
                state.current_chapter_index -= 1;
                self.enter_chapter(state, commands);
            }

            Intent::CycleSpeed => {
                state.speed = state.speed.next();
                commands.push(Command::SetRate(state.speed));
            }

            Intent::DismissAlert => state.pending_alert = None,
        }
    }

    fn apply_status(
        &self,
        state: &mut PlayerState,
        status: AudioPlayerStatus,
        commands: &mut Vec<Command>,
    ) {
        match status {
            AudioPlayerStatus::Playing(_) if state.is_scrubbing => {
                debug!("Dropping position sample while scrubbing");
            }
            AudioPlayerStatus::Playing(info) => {
                state.playback_info = info;
                self.advance_if_complete(state, commands);
            }
            AudioPlayerStatus::Paused(info) => state.playback_info = info,
            // explicit stops come from our own StopSession; nothing to update
            AudioPlayerStatus::Stopped => {}
            AudioPlayerStatus::Finished { successful } => {
                debug!("Chapter {} finished (successful: {})", state.current_chapter_index, successful);
                if let Some(chapter) = state.current_chapter() {
                    state.playback_info = PlaybackInfo::end_of(chapter);
                }
                self.advance_if_complete(state, commands);
            }
            // the session is gone but is_playing keeps what the user last chose
            AudioPlayerStatus::Error(message) => {
                let message = message.unwrap_or_else(|| "Undefined error".to_string());
                warn!("Playback error: {}", message);
                state.pending_alert = Some(message);
            }
        }
    }

    fn play(&self, state: &mut PlayerState, commands: &mut Vec<Command>) {
        let Some(audio_ref) = state.current_chapter().map(|c| c.audio_ref.clone()) else {
            return;
        };

        match self.resolver.resolve(&audio_ref) {
            Some(resource) => {
                state.is_playing = true;
                commands.push(Command::StartSession {
                    resource,
                    info: state.playback_info,
                    speed: state.speed,
                });
            }
            // whatever the previous chapter left running must not keep feeding this one
            None => {
                commands.push(Command::StopSession);
                let message = format!("Audio file '{}' not found", audio_ref);
                self.apply_status(state, AudioPlayerStatus::Error(Some(message)), commands);
            }
        }
    }

    /// Move on once the current chapter is used up; wrapping past the last
    /// chapter ends the book and stops playback.
    fn advance_if_complete(&self, state: &mut PlayerState, commands: &mut Vec<Command>) {
        if !state.playback_info.is_complete() {
            return;
        }

        state.current_chapter_index = (state.current_chapter_index + 1) % state.book.chapter_count();
        if state.current_chapter_index == 0 {
            info!("Reached the end of the book");
            state.is_playing = false;
        }
        self.enter_chapter(state, commands);
    }

    /// Rewind the freshly selected chapter to zero and either start it or make
    /// sure the previous chapter's session cannot keep running.
    fn enter_chapter(&self, state: &mut PlayerState, commands: &mut Vec<Command>) {
        info!(
            "Chapter {} of {}",
            state.current_chapter_index + 1,
            state.book.chapter_count()
        );
        state.playback_info = state
            .current_chapter()
            .map(PlaybackInfo::start_of)
            .unwrap_or_default();

        if state.is_playing {
            self.play(state, commands);
        } else {
            commands.push(Command::StopSession);
        }
    }
}
