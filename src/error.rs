//! Hook-level error and the exit code contract.

use thiserror::Error;

use crate::config::ContextError;
use crate::daemon::DaemonError;
use crate::nodelist::NodeListError;
use crate::role::RoleError;

pub const EXIT_OK: u8 = 0;
pub const EXIT_MISSING_INPUT: u8 = 1;
pub const EXIT_MALFORMED_INPUT: u8 = 2;
pub const EXIT_NODE_NOT_IN_ALLOCATION: u8 = 3;
pub const EXIT_LAUNCH_FAILED: u8 = 4;
pub const EXIT_RECORD_WRITE_FAILED: u8 = 5;
pub const EXIT_SIGNAL_FAILED: u8 = 6;
pub const EXIT_RECORD_CLEANUP_FAILED: u8 = 7;
pub const EXIT_RECORD_READ_FAILED: u8 = 8;

#[derive(Debug, Error)]
pub enum HookError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    NodeList(#[from] NodeListError),

    #[error(transparent)]
    Role(#[from] RoleError),

    #[error(transparent)]
    Daemon(#[from] DaemonError),
}

impl HookError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Context(ContextError::Missing { .. }) => EXIT_MISSING_INPUT,
            Self::Context(ContextError::Invalid { .. }) => EXIT_MALFORMED_INPUT,
            Self::NodeList(_) => EXIT_MALFORMED_INPUT,
            Self::Role(RoleError::NodeNotInAllocation { .. }) => EXIT_NODE_NOT_IN_ALLOCATION,
            Self::Role(RoleError::DuplicateNode { .. }) => EXIT_MALFORMED_INPUT,
            Self::Daemon(e) => match e {
                DaemonError::RecordNotFound { .. } | DaemonError::StaleRecord { .. } => EXIT_OK,
                DaemonError::DaemonBinaryNotFound { .. } | DaemonError::DaemonLaunchFailed { .. } => {
                    EXIT_LAUNCH_FAILED
                }
                DaemonError::RecordPersistenceFailed { .. } => EXIT_RECORD_WRITE_FAILED,
                DaemonError::PermissionDenied { .. } | DaemonError::SignalFailed { .. } => {
                    EXIT_SIGNAL_FAILED
                }
                DaemonError::CorruptRecord { .. } => EXIT_MALFORMED_INPUT,
                DaemonError::RecordReadFailed { .. } => EXIT_RECORD_READ_FAILED,
                DaemonError::RecordCleanupFailed { .. } => EXIT_RECORD_CLEANUP_FAILED,
            },
        }
    }
}
