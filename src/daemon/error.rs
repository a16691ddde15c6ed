use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("daemon binary {binary} not found")]
    DaemonBinaryNotFound {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {binary}: {reason}")]
    DaemonLaunchFailed { binary: PathBuf, reason: String },

    #[error("failed to persist PID {pid:?} to {path}: {reason}")]
    RecordPersistenceFailed {
        path: PathBuf,
        /// Daemon that was started and then stopped again, if any.
        pid: Option<u32>,
        reason: String,
    },

    #[error("PID file {path} not found")]
    RecordNotFound { path: PathBuf },

    #[error("failed to read PID file {path}")]
    RecordReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PID in {path}: '{content}'")]
    CorruptRecord { path: PathBuf, content: String },

    #[error("no process found with PID {pid}; removed {path}")]
    StaleRecord { pid: u32, path: PathBuf },

    #[error("permission denied when sending {signal} to PID {pid}")]
    PermissionDenied { pid: u32, signal: String },

    #[error("failed to send {signal} to PID {pid}")]
    SignalFailed {
        pid: u32,
        signal: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sent {signal} to PID {pid} but failed to delete {path}")]
    RecordCleanupFailed {
        pid: u32,
        signal: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DaemonError {
    /// Expected races between the daemon's own lifetime and job teardown.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. } | Self::StaleRecord { .. })
    }
}
