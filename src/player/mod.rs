// Player module - state, transitions and the runtime that drives them

pub mod reducer;
pub mod runtime;
pub mod state;
pub mod view;

pub use reducer::{Action, Command, Intent, PlaybackReducer};
pub use runtime::{PlayerClosed, PlayerHandle, PlayerRuntime, RuntimeSettings};
pub use state::PlayerState;
pub use view::{format_clock, PlayerViewModel};
