//! CLI subcommand implementations.

pub mod analyze;
pub mod fields;
pub mod import;
pub mod merge;
pub mod render;
pub mod source;
pub mod validate;
