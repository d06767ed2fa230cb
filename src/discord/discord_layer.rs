// Discord layer - commands and screen rendering.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "memo/screens.rs"]
pub mod screens;

// Re-export command types for convenience
pub use commands::memo::{Data, Error};
