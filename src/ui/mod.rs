// Console UI - line-based frontend for the player
// Reads commands from stdin and prints the view model; all state lives in the runtime

pub mod console;

pub use console::{parse_command, render, ConsoleApp, ConsoleCommand, ParseError};
