// Player runtime - the single owner of PlayerState.
// Intents from the frontend and statuses from the active session arrive on one
// inbox; each is folded through the reducer and the resulting commands are
// executed against the playback service before the next input is read.

use super::{Command, Intent, PlaybackReducer, PlayerState, PlayerViewModel};
use crate::playback::AudioPlayerStatus;
use crate::service::{PlaybackService, StatusReceiver};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeSettings {
    /// Delay before a seek is sent to the service; a newer seek arriving in
    /// the meantime replaces it. Zero seeks immediately.
    pub seek_coalesce: Duration,
}

#[derive(Debug, Error)]
#[error("player runtime has shut down")]
pub struct PlayerClosed;

#[derive(Debug)]
enum PlayerInput {
    Intent(Intent),
    Status {
        generation: u64,
        status: AudioPlayerStatus,
    },
    Shutdown,
}

/// Frontend side of a running player.
#[derive(Clone)]
pub struct PlayerHandle {
    inbox: mpsc::UnboundedSender<PlayerInput>,
    view: watch::Receiver<PlayerViewModel>,
}

impl PlayerHandle {
    pub fn send(&self, intent: Intent) -> Result<(), PlayerClosed> {
        self.inbox
            .send(PlayerInput::Intent(intent))
            .map_err(|_| PlayerClosed)
    }

    /// Latest published view model.
    pub fn view(&self) -> PlayerViewModel {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerViewModel> {
        self.view.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.inbox.send(PlayerInput::Shutdown);
    }
}

pub struct PlayerRuntime {
    state: PlayerState,
    reducer: PlaybackReducer,
    service: PlaybackService,
    settings: RuntimeSettings,
    /// Weak so the loop ends once every `PlayerHandle` is gone.
    inbox_tx: mpsc::WeakUnboundedSender<PlayerInput>,
    inbox_rx: mpsc::UnboundedReceiver<PlayerInput>,
    view_tx: watch::Sender<PlayerViewModel>,
    /// Identifies the session stream currently being relayed.
    generation: u64,
    forwarder: Option<JoinHandle<()>>,
    pending_seek: Option<JoinHandle<()>>,
}

impl PlayerRuntime {
    pub fn new(
        state: PlayerState,
        reducer: PlaybackReducer,
        service: PlaybackService,
        settings: RuntimeSettings,
    ) -> (Self, PlayerHandle) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(PlayerViewModel::from(&state));

        let runtime_tx = inbox_tx.downgrade();
        let handle = PlayerHandle {
            inbox: inbox_tx,
            view: view_rx,
        };
        let runtime = Self {
            state,
            reducer,
            service,
            settings,
            inbox_tx: runtime_tx,
            inbox_rx,
            view_tx,
            generation: 0,
            forwarder: None,
            pending_seek: None,
        };
        (runtime, handle)
    }

    /// Process inputs until [`PlayerHandle::shutdown`] or until every handle is
    /// dropped; returns the final state.
    pub async fn run(mut self) -> PlayerState {
        info!("Player runtime started for book {}", self.state.book().id());

        while let Some(input) = self.inbox_rx.recv().await {
            let commands = match input {
                PlayerInput::Intent(intent) => self.reducer.reduce(&mut self.state, intent),
                PlayerInput::Status { generation, status } if generation != self.generation => {
                    debug!("Dropping stale status from generation {}: {:?}", generation, status);
                    continue;
                }
                PlayerInput::Status { status, .. } => self.reducer.reduce(&mut self.state, status),
                PlayerInput::Shutdown => break,
            };

            for command in commands {
                self.execute(command);
            }
            self.view_tx.send_replace(PlayerViewModel::from(&self.state));
        }

        self.cancel_session_tasks();
        self.service.stop();
        info!("Player runtime stopped");
        self.state
    }

    fn execute(&mut self, command: Command) {
        debug!("Executing {:?}", command);
        match command {
            Command::StartSession {
                resource,
                info,
                speed,
            } => {
                self.cancel_session_tasks();
                self.generation += 1;
                let stream = self.service.start_session(&resource, info, speed);
                self.forwarder = Some(tokio::spawn(forward_statuses(
                    stream,
                    self.generation,
                    self.inbox_tx.clone(),
                )));
            }
            Command::StopSession => {
                self.cancel_session_tasks();
                self.generation += 1;
                self.service.stop();
            }
            Command::Pause => self.service.pause(),
            Command::SetRate(speed) => self.service.set_rate(speed),
            Command::SeekAndPause(progress) => {
                self.schedule_seek(move |service| service.seek_and_pause(progress))
            }
            Command::SeekAndResume(progress) => {
                self.schedule_seek(move |service| service.seek_and_resume(progress))
            }
        }
    }

    /// Last seek wins: any seek still waiting out the coalescing delay is dropped.
    fn schedule_seek<F>(&mut self, seek: F)
    where
        F: FnOnce(&PlaybackService) + Send + 'static,
    {
        if let Some(pending) = self.pending_seek.take() {
            pending.abort();
        }

        let delay = self.settings.seek_coalesce;
        if delay.is_zero() {
            seek(&self.service);
            return;
        }

        let service = self.service.clone();
        self.pending_seek = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            seek(&service);
        }));
    }

    fn cancel_session_tasks(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(pending) = self.pending_seek.take() {
            pending.abort();
        }
    }
}

async fn forward_statuses(
    mut stream: StatusReceiver,
    generation: u64,
    inbox: mpsc::WeakUnboundedSender<PlayerInput>,
) {
    while let Some(status) = stream.recv().await {
        // upgrade per status so an idle forwarder never keeps the inbox open
        let Some(inbox) = inbox.upgrade() else {
            return;
        };
        if inbox.send(PlayerInput::Status { generation, status }).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{book_resolver, AudioResource, ResourceResolver, SimulatedBackend};
    use crate::book::{Book, Chapter};
    use crate::service::ServiceSettings;
    use std::sync::Arc;

    fn short_book() -> Book {
        Book::new(
            "cover",
            vec![
                Chapter::new("One", "one", 3.0),
                Chapter::new("Two", "two", 2.0),
                Chapter::new("Three", "three", 1.5),
            ],
        )
        .unwrap()
    }

    fn start(
        book: Book,
        settings: RuntimeSettings,
    ) -> (PlayerHandle, JoinHandle<PlayerState>, Arc<SimulatedBackend>) {
        let backend = Arc::new(SimulatedBackend::for_book(&book));
        let service = PlaybackService::new(backend.clone(), ServiceSettings::default());
        let reducer = PlaybackReducer::new(Arc::new(book_resolver(&book)));
        let (runtime, handle) = PlayerRuntime::new(PlayerState::new(book), reducer, service, settings);
        (handle, tokio::spawn(runtime.run()), backend)
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_whole_book_then_stops() {
        let (handle, join, backend) = start(short_book(), RuntimeSettings::default());
        let mut view = handle.subscribe();

        handle.send(Intent::Play).unwrap();
        view.wait_for(|v| v.is_playing).await.unwrap();
        view.wait_for(|v| v.title == "KEY POINT 3 OF 3").await.unwrap();
        let last = view.wait_for(|v| !v.is_playing).await.unwrap().clone();

        assert_eq!(last.title, "KEY POINT 1 OF 3");
        assert_eq!(last.current_time, "00:00");
        assert_eq!(backend.live_count(), 0);
        assert_eq!(backend.opened_count(), 3);

        handle.shutdown();
        let state = join.await.unwrap();
        assert_eq!(state.current_chapter_index(), 0);
        assert!(!state.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolvable_next_chapter_stops_previous_session() {
        let book = Book::new(
            "cover",
            vec![
                Chapter::new("One", "one", 30.0),
                Chapter::new("Two", "two", 20.0),
                Chapter::new("Three", "three", 15.0),
            ],
        )
        .unwrap();
        let backend = Arc::new(SimulatedBackend::for_book(&book));
        let service = PlaybackService::new(backend.clone(), ServiceSettings::default());
        let known = book_resolver(&book);
        let resolver = move |audio_ref: &str| {
            if audio_ref == "two" {
                None
            } else {
                known.resolve(audio_ref)
            }
        };
        let reducer = PlaybackReducer::new(Arc::new(resolver));
        let (runtime, handle) =
            PlayerRuntime::new(PlayerState::new(book), reducer, service, RuntimeSettings::default());
        let join = tokio::spawn(runtime.run());
        let mut view = handle.subscribe();

        handle.send(Intent::Play).unwrap();
        view.wait_for(|v| v.is_playing).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        handle.send(Intent::NextChapter).unwrap();
        view.wait_for(|v| v.alert.is_some()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let current = handle.view();
        assert_eq!(current.title, "KEY POINT 2 OF 3");
        assert_eq!(current.total_time, "00:20");
        assert_eq!(current.current_time, "00:00");
        assert_eq!(backend.live_count(), 0);

        // chapter one's engine would have finished by now had it kept running
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(handle.view().title, "KEY POINT 2 OF 3");
        assert_eq!(backend.opened_count(), 1);

        handle.shutdown();
        join.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_every_handle_ends_runtime() {
        let (handle, join, backend) = start(Book::sample(), RuntimeSettings::default());
        let mut view = handle.subscribe();

        handle.send(Intent::Play).unwrap();
        view.wait_for(|v| v.is_playing).await.unwrap();
        let other = handle.clone();
        drop(handle);
        drop(other);

        let state = join.await.unwrap();
        assert_eq!(state.current_chapter_index(), 0);
        assert_eq!(backend.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_dropped() {
        let (handle, join, _) = start(Book::sample(), RuntimeSettings::default());
        let mut view = handle.subscribe();

        handle.send(Intent::Play).unwrap();
        view.wait_for(|v| v.is_playing).await.unwrap();

        handle
            .inbox
            .send(PlayerInput::Status {
                generation: 0,
                status: AudioPlayerStatus::Finished { successful: true },
            })
            .unwrap();
        handle.send(Intent::CycleSpeed).unwrap();
        let current = view.wait_for(|v| v.speed_label == "Speed x1.5").await.unwrap().clone();
        assert_eq!(current.title, "KEY POINT 1 OF 3");
        assert!(current.is_playing);

        handle.shutdown();
        join.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesced_scrub_holds_last_position() {
        let settings = RuntimeSettings {
            seek_coalesce: Duration::from_millis(100),
        };
        let (handle, join, _) = start(Book::sample(), settings);
        let mut view = handle.subscribe();

        handle.send(Intent::Play).unwrap();
        view.wait_for(|v| v.is_playing).await.unwrap();

        handle.send(Intent::ScrubMoving(0.2)).unwrap();
        handle.send(Intent::ScrubMoving(0.5)).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let held = handle.view();
        assert!(held.is_scrubbing);
        assert!((held.progress - 0.5).abs() < 0.01, "progress {}", held.progress);

        handle.send(Intent::ScrubReleased).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        let resumed = handle.view();
        assert!(!resumed.is_scrubbing);
        assert!(resumed.progress > 0.5);

        handle.shutdown();
        let state = join.await.unwrap();
        assert_eq!(state.current_chapter_index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_audio_publishes_alert() {
        let book = Book::new("cover", vec![Chapter::new("Lost", "lost", 10.0)]).unwrap();
        let service = PlaybackService::new(Arc::new(SimulatedBackend::new()), ServiceSettings::default());
        let reducer = PlaybackReducer::new(Arc::new(|_: &str| -> Option<AudioResource> { None }));
        let (runtime, handle) =
            PlayerRuntime::new(PlayerState::new(book), reducer, service, RuntimeSettings::default());
        let join = tokio::spawn(runtime.run());
        let mut view = handle.subscribe();

        handle.send(Intent::Play).unwrap();
        let alerted = view.wait_for(|v| v.alert.is_some()).await.unwrap().clone();
        assert_eq!(
            alerted.alert.as_deref(),
            Some("Audio player error message: Audio file 'lost' not found")
        );
        assert!(!alerted.is_playing);

        handle.send(Intent::DismissAlert).unwrap();
        view.wait_for(|v| v.alert.is_none()).await.unwrap();

        handle.shutdown();
        join.await.unwrap();
        assert!(handle.send(Intent::Play).is_err());
    }
}
