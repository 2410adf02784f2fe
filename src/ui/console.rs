use crate::player::{Intent, PlayerHandle, PlayerViewModel};
use anyhow::Result;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

const PROGRESS_BAR_WIDTH: usize = 30;

pub const HELP: &str = "\
commands:
  play | pause        start or pause playback
  ff | rw             skip forward 10s / back 5s
  scrub <0..1>        drag the position control to a fraction of the chapter
  release             let go of the position control
  next | prev         change chapter
  speed               cycle playback speed
  dismiss             clear the current alert
  status              show the player
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Intent(Intent),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'scrub' needs a position between 0 and 1")]
    MissingProgress,
    #[error("'{0}' is not a position between 0 and 1")]
    InvalidProgress(String),
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, ParseError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(ConsoleCommand::Status);
    };

    let intent = match command.to_ascii_lowercase().as_str() {
        "play" | "p" => Intent::Play,
        "pause" => Intent::Pause,
        "ff" => Intent::FastForward,
        "rw" => Intent::Rewind,
        "scrub" => {
            let raw = words.next().ok_or(ParseError::MissingProgress)?;
            let progress: f64 = raw
                .parse()
                .map_err(|_| ParseError::InvalidProgress(raw.to_string()))?;
            if !(0.0..=1.0).contains(&progress) {
                return Err(ParseError::InvalidProgress(raw.to_string()));
            }
            Intent::ScrubMoving(progress)
        }
        "release" => Intent::ScrubReleased,
        "next" | "n" => Intent::NextChapter,
        "prev" => Intent::PreviousChapter,
        "speed" => Intent::CycleSpeed,
        "dismiss" => Intent::DismissAlert,
        "status" | "s" => return Ok(ConsoleCommand::Status),
        "help" | "?" => return Ok(ConsoleCommand::Help),
        "quit" | "q" | "exit" => return Ok(ConsoleCommand::Quit),
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(ConsoleCommand::Intent(intent))
}

/// Multi-line text rendering of the player.
pub fn render(view: &PlayerViewModel) -> String {
    let filled = (view.progress * PROGRESS_BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(PROGRESS_BAR_WIDTH);
    let bar = format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled)
    );

    let state = match (view.is_scrubbing, view.is_playing) {
        (true, _) => "scrubbing",
        (false, true) => "playing",
        (false, false) => "paused",
    };
    let mut controls = Vec::new();
    if view.previous_enabled {
        controls.push("prev");
    }
    if view.rewind_enabled {
        controls.push("rw");
    }
    controls.push(if view.is_playing { "pause" } else { "play" });
    if view.fast_forward_enabled {
        controls.push("ff");
    }
    if view.next_enabled {
        controls.push("next");
    }

    let mut out = format!(
        "{}\n{}\n{} {} {}  {}  ({})\ncontrols: {}",
        view.title,
        view.subtitle,
        view.current_time,
        bar,
        view.total_time,
        view.speed_label,
        state,
        controls.join(" ")
    );
    if let Some(alert) = &view.alert {
        out.push_str(&format!("\n! {} (type 'dismiss')", alert));
    }
    out
}

/// Stdin loop. Chapter changes, alerts and play/pause flips are announced as
/// they are published.
pub struct ConsoleApp {
    handle: PlayerHandle,
    should_quit: bool,
}

impl ConsoleApp {
    pub fn new(handle: PlayerHandle) -> Self {
        Self {
            handle,
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut updates = self.handle.subscribe();
        let mut last_seen = self.handle.view();

        println!("{}\n\n{}", render(&last_seen), HELP);

        while !self.should_quit {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line)?,
                    None => {
                        info!("stdin closed");
                        self.should_quit = true;
                    }
                },
                changed = updates.changed() => {
                    if changed.is_ok() {
                        let current = updates.borrow_and_update().clone();
                        announce_changes(&last_seen, &current);
                        last_seen = current;
                    } else {
                        self.should_quit = true;
                    }
                }
            }
        }

        self.handle.shutdown();
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Result<()> {
        match parse_command(line) {
            Ok(ConsoleCommand::Intent(intent)) => {
                debug!("Console intent {:?}", intent);
                self.handle.send(intent)?;
            }
            Ok(ConsoleCommand::Status) => println!("{}", render(&self.handle.view())),
            Ok(ConsoleCommand::Help) => println!("{}", HELP),
            Ok(ConsoleCommand::Quit) => self.should_quit = true,
            Err(e) => println!("{}", e),
        }
        Ok(())
    }
}

fn announce_changes(before: &PlayerViewModel, after: &PlayerViewModel) {
    if before.title != after.title {
        println!("{} - {}", after.title, after.subtitle);
    }
    if before.is_playing != after.is_playing {
        println!("{}", if after.is_playing { "playing" } else { "paused" });
    }
    if after.alert.is_some() && before.alert != after.alert {
        println!("{}", render(after));
    }
}
