//! CLI surface and logging setup for the `counter-hook` binary.

pub mod cli;
pub mod logging;
