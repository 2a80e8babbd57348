//! Command modules - one file per CLI command

pub mod attach;
pub mod completions;
pub mod eject;
