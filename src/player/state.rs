use crate::book::{Book, Chapter};
use crate::playback::{PlaybackInfo, PlaybackSpeed};

/// Everything the player knows about the current listening session.
/// Only the reducer changes it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub(crate) book: Book,
    pub(crate) current_chapter_index: usize,
    pub(crate) playback_info: PlaybackInfo,
    pub(crate) speed: PlaybackSpeed,
    pub(crate) is_playing: bool,
    pub(crate) is_scrubbing: bool,
    pub(crate) pending_alert: Option<String>,
}

impl PlayerState {
    pub fn new(book: Book) -> Self {
        Self::starting_at(book, 0)
    }

    /// Start at `chapter_index`, clamped to the last chapter.
    pub fn starting_at(book: Book, chapter_index: usize) -> Self {
        let current_chapter_index = chapter_index.min(book.chapter_count() - 1);
        let playback_info = book
            .chapter(current_chapter_index)
            .map(PlaybackInfo::start_of)
            .unwrap_or_default();

        Self {
            book,
            current_chapter_index,
            playback_info,
            speed: PlaybackSpeed::default(),
            is_playing: false,
            is_scrubbing: false,
            pending_alert: None,
        }
    }

    pub fn with_speed(mut self, speed: PlaybackSpeed) -> Self {
        self.speed = speed;
        self
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn current_chapter_index(&self) -> usize {
        self.current_chapter_index
    }

    pub fn current_chapter(&self) -> Option<&Chapter> {
        self.book.chapter(self.current_chapter_index)
    }

    pub fn playback_info(&self) -> PlaybackInfo {
        self.playback_info
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_scrubbing(&self) -> bool {
        self.is_scrubbing
    }

    pub fn pending_alert(&self) -> Option<&str> {
        self.pending_alert.as_deref()
    }

    pub fn is_first_chapter(&self) -> bool {
        self.current_chapter_index == 0
    }

    pub fn is_last_chapter(&self) -> bool {
        self.current_chapter_index + 1 == self.book.chapter_count()
    }
}
