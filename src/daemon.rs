//! Counter daemon lifecycle: launch, PID record, termination.

pub mod error;
pub mod launch;
pub mod record;
pub mod status;
pub mod terminate;

pub use error::DaemonError;
pub use launch::{launch_daemon, LaunchedDaemon};
pub use record::RecordStore;
pub use terminate::{terminate_daemon, TerminatedDaemon};
