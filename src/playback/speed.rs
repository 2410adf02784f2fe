use serde::{Deserialize, Serialize};
use std::fmt;

/// The four rates the speed button cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackSpeed {
    #[serde(rename = "x0.5")]
    Half,
    #[default]
    #[serde(rename = "x1")]
    Normal,
    #[serde(rename = "x1.5")]
    OneAndHalf,
    #[serde(rename = "x2")]
    Double,
}

impl PlaybackSpeed {
    pub const ALL: [PlaybackSpeed; 4] = [
        PlaybackSpeed::Half,
        PlaybackSpeed::Normal,
        PlaybackSpeed::OneAndHalf,
        PlaybackSpeed::Double,
    ];

    pub fn multiplier(self) -> f32 {
        match self {
            PlaybackSpeed::Half => 0.5,
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::OneAndHalf => 1.5,
            PlaybackSpeed::Double => 2.0,
        }
    }

    /// Successor in the 0.5 -> 1 -> 1.5 -> 2 -> 0.5 cycle.
    pub fn next(self) -> Self {
        match self {
            PlaybackSpeed::Half => PlaybackSpeed::Normal,
            PlaybackSpeed::Normal => PlaybackSpeed::OneAndHalf,
            PlaybackSpeed::OneAndHalf => PlaybackSpeed::Double,
            PlaybackSpeed::Double => PlaybackSpeed::Half,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackSpeed::Half => "x0.5",
            PlaybackSpeed::Normal => "x1",
            PlaybackSpeed::OneAndHalf => "x1.5",
            PlaybackSpeed::Double => "x2",
        }
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
