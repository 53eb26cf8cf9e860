//! Command-line interface for previewing and rendering templates.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
