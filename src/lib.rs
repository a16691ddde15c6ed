//! Slurm prologue/epilogue hooks that place GPU hardware-counter daemons on a
//! small, evenly spread subset of a leadership-class job's nodes.
//!
//! Every node decides independently from the scheduler's environment; the only
//! state kept between the two phases is a per-job PID file.

pub mod app;
pub mod config;
pub mod daemon;
pub mod error;
pub mod nodelist;
pub mod phase;
pub mod role;

pub use error::HookError;
