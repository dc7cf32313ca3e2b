//! Attendance register CLI library.
//!
//! This crate provides the `rc` command-line interface over `rc-core` and
//! `rc-store`.

mod cli;
pub mod commands;
mod config;
pub mod render;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use render::PlaceholderRenderer;
