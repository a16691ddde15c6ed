//! Epilogue-side teardown: signal the recorded daemon and drop its record.

use std::io;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::{JobId, StopSignal};
use crate::daemon::{DaemonError, RecordStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminatedDaemon {
    pub pid: u32,
    pub record_path: PathBuf,
}

/// Send `signal` to the daemon recorded for `job_id`, then delete the record.
///
/// The record is kept when the signal could not be delivered, and removed when
/// the process is already gone (`StaleRecord`).
pub fn terminate_daemon(
    store: &RecordStore,
    job_id: &JobId,
    signal: StopSignal,
) -> Result<TerminatedDaemon, DaemonError> {
    let record_path = store.path_for(job_id);
    let pid = store.read_pid(job_id)?;
    debug!("Read PID {} from {}", pid, record_path.display());

    if let Err(e) = send_signal(pid, signal) {
        return match e.raw_os_error() {
            Some(libc::ESRCH) => {
                warn!("No process found with PID {}, removing stale record", pid);
                store
                    .remove(job_id)
                    .map_err(|source| DaemonError::RecordCleanupFailed {
                        pid,
                        signal: signal.to_string(),
                        path: record_path.clone(),
                        source,
                    })?;
                Err(DaemonError::StaleRecord {
                    pid,
                    path: record_path,
                })
            }
            Some(libc::EPERM) => Err(DaemonError::PermissionDenied {
                pid,
                signal: signal.to_string(),
            }),
            _ => Err(DaemonError::SignalFailed {
                pid,
                signal: signal.to_string(),
                source: e,
            }),
        };
    }
    info!("Sent {} to process with PID {}", signal, pid);

    store
        .remove(job_id)
        .map_err(|source| DaemonError::RecordCleanupFailed {
            pid,
            signal: signal.to_string(),
            path: record_path.clone(),
            source,
        })?;
    info!("Deleted PID file {}", record_path.display());

    Ok(TerminatedDaemon { pid, record_path })
}

fn send_signal(pid: u32, signal: StopSignal) -> io::Result<()> {
    let raw = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::from_raw_os_error(libc::ESRCH))?;
    // SAFETY: pids come from parse_pid (> 1), so kill never targets a process group or init.
    if unsafe { libc::kill(raw, signal.as_raw()) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
