// chapterplay library - playback core for chapter-based audio books
// The reducer decides, the service plays; the runtime is the only thing that talks to both

pub mod audio;    // engine trait, backends, resource lookup
pub mod book;     // book and chapter model, manifests
pub mod config;   // settings and preferences
pub mod playback; // position, speed, session status values
pub mod player;   // state, reducer, view model, runtime
pub mod service;  // one active playback session at a time
pub mod ui;       // console frontend

// Export the stuff other modules actually use
pub use audio::{AudioBackend, AudioEngine, AudioResource, ResourceResolver};
pub use book::{Book, Chapter};
pub use config::Config;
pub use playback::{AudioPlayerStatus, PlaybackInfo, PlaybackSpeed};
pub use player::{Intent, PlaybackReducer, PlayerHandle, PlayerRuntime, PlayerState, PlayerViewModel};
pub use service::PlaybackService;
