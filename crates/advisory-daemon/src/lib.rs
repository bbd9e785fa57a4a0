//! Advisory daemon: CLI surface and command handlers.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
