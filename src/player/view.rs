use super::PlayerState;

/// Render-ready snapshot of [`PlayerState`]. Frontends never read the state
/// directly.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerViewModel {
    pub image_ref: String,
    pub title: String,
    pub subtitle: String,
    pub current_time: String,
    pub total_time: String,
    pub progress: f64,
    pub slider_step: f64,
    pub speed_label: String,
    pub is_playing: bool,
    pub is_scrubbing: bool,
    pub previous_enabled: bool,
    pub next_enabled: bool,
    pub rewind_enabled: bool,
    pub fast_forward_enabled: bool,
    pub alert: Option<String>,
}

impl From<&PlayerState> for PlayerViewModel {
    fn from(state: &PlayerState) -> Self {
        let info = state.playback_info();
        let chapter_count = state.book().chapter_count();

        Self {
            image_ref: state.book().image_ref().to_string(),
            title: format!(
                "KEY POINT {} OF {}",
                state.current_chapter_index() + 1,
                chapter_count
            ),
            subtitle: state
                .current_chapter()
                .map(|c| c.description.clone())
                .unwrap_or_default(),
            current_time: format_clock(info.current_time),
            total_time: format_clock(info.duration),
            progress: info.completion(),
            slider_step: if info.duration > 0.0 { 1.0 / info.duration } else { 0.0 },
            speed_label: format!("Speed {}", state.speed().label()),
            is_playing: state.is_playing(),
            is_scrubbing: state.is_scrubbing(),
            previous_enabled: !state.is_first_chapter(),
            next_enabled: !state.is_last_chapter(),
            rewind_enabled: true,
            fast_forward_enabled: true,
            alert: state
                .pending_alert()
                .map(|message| format!("Audio player error message: {}", message)),
        }
    }
}

/// `MM:SS`, truncated to whole seconds. Minutes keep counting past an hour.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{Book, Chapter};
    use crate::playback::{PlaybackInfo, PlaybackSpeed};

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(59.99), "00:59");
        assert_eq!(format_clock(330.0), "05:30");
        assert_eq!(format_clock(3_725.0), "62:05");
        assert_eq!(format_clock(-4.0), "00:00");
        assert_eq!(format_clock(f64::NAN), "00:00");
    }

    #[test]
    fn test_first_chapter_view() {
        let state = PlayerState::new(Book::sample()).with_speed(PlaybackSpeed::OneAndHalf);
        let view = PlayerViewModel::from(&state);

        assert_eq!(view.image_ref, "book");
        assert_eq!(view.title, "KEY POINT 1 OF 3");
        assert_eq!(view.subtitle, state.current_chapter().unwrap().description);
        assert_eq!(view.current_time, "00:00");
        assert_eq!(view.total_time, "05:30");
        assert_eq!(view.speed_label, "Speed x1.5");
        assert!(!view.previous_enabled);
        assert!(view.next_enabled);
        assert!(view.rewind_enabled && view.fast_forward_enabled);
        assert_eq!(view.alert, None);
    }

    #[test]
    fn test_last_chapter_disables_next() {
        let state = PlayerState::starting_at(Book::sample(), 2);
        let view = PlayerViewModel::from(&state);
        assert_eq!(view.title, "KEY POINT 3 OF 3");
        assert!(view.previous_enabled);
        assert!(!view.next_enabled);
    }

    #[test]
    fn test_progress_and_alert() {
        let mut state = PlayerState::new(Book::sample());
        state.playback_info = PlaybackInfo::new(82.5, 330.0);
        state.pending_alert = Some("boom".to_string());

        let view = PlayerViewModel::from(&state);
        assert_eq!(view.progress, 0.25);
        assert_eq!(view.slider_step, 1.0 / 330.0);
        assert_eq!(view.current_time, "01:22");
        assert_eq!(view.alert.as_deref(), Some("Audio player error message: boom"));
    }

    #[test]
    fn test_zero_duration_sample() {
        // the end-of-track margin can eat a very short track entirely
        let book = Book::new("cover", vec![Chapter::new("Blip", "blip", 0.05)]).unwrap();
        let mut state = PlayerState::new(book);
        state.playback_info = PlaybackInfo::new(0.0, 0.0);

        let view = PlayerViewModel::from(&state);
        assert_eq!(view.progress, 1.0);
        assert_eq!(view.slider_step, 0.0);
        assert!(!view.previous_enabled && !view.next_enabled);
    }
}
