//! Detached daemon launch with PID record persistence.

use std::fs;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{DaemonSettings, JobId};
use crate::daemon::{DaemonError, RecordStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedDaemon {
    pub pid: u32,
    pub slot: u32,
    pub config_path: PathBuf,
    pub record_path: PathBuf,
}

/// Start the daemon for `slot` in its own session and record its PID.
///
/// On any error after the process was spawned, the process is killed and
/// reaped before returning: a running daemon always has a record.
pub fn launch_daemon(
    settings: &DaemonSettings,
    store: &RecordStore,
    job_id: &JobId,
    slot: u32,
) -> Result<LaunchedDaemon, DaemonError> {
    let config_path = settings.config_artifact(slot);
    if !config_path.is_file() {
        return Err(DaemonError::DaemonLaunchFailed {
            binary: settings.binary.clone(),
            reason: format!("configuration {} not found", config_path.display()),
        });
    }

    let record_path = store.path_for(job_id);
    if record_path.exists() {
        return Err(DaemonError::RecordPersistenceFailed {
            path: record_path,
            pid: None,
            reason: "a record for this job already exists".to_string(),
        });
    }

    let mut cmd = Command::new(&settings.binary);
    cmd.arg(&config_path).stdin(Stdio::null());

    if let Some(log_dir) = &settings.log_dir {
        let log_path = log_dir.join(format!("{}-{}.log", settings.name, job_id));
        let log_file = open_log(log_dir, &log_path).map_err(|e| DaemonError::DaemonLaunchFailed {
            binary: settings.binary.clone(),
            reason: format!("cannot open log {}: {}", log_path.display(), e),
        })?;
        let stderr = log_file
            .try_clone()
            .map_err(|e| DaemonError::DaemonLaunchFailed {
                binary: settings.binary.clone(),
                reason: format!("cannot open log {}: {}", log_path.display(), e),
            })?;
        cmd.stdout(log_file).stderr(stderr);
        debug!("Daemon output goes to {}", log_path.display());
    }

    detach(&mut cmd);

    debug!(
        "Spawning {} {}",
        settings.binary.display(),
        config_path.display()
    );
    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DaemonError::DaemonBinaryNotFound {
            binary: settings.binary.clone(),
            source: e,
        },
        _ => DaemonError::DaemonLaunchFailed {
            binary: settings.binary.clone(),
            reason: e.to_string(),
        },
    })?;
    let pid = child.id();

    if settings.startup_grace_ms > 0 {
        std::thread::sleep(Duration::from_millis(settings.startup_grace_ms));
    }
    match child.try_wait() {
        Ok(None) => {}
        Ok(Some(status)) => {
            return Err(DaemonError::DaemonLaunchFailed {
                binary: settings.binary.clone(),
                reason: format!("daemon (PID {pid}) exited during startup: {status}"),
            });
        }
        Err(e) => {
            abort(&mut child);
            return Err(DaemonError::DaemonLaunchFailed {
                binary: settings.binary.clone(),
                reason: format!("cannot check daemon (PID {pid}) state: {e}"),
            });
        }
    }

    let record_path = match store.create(job_id, pid) {
        Ok(path) => path,
        Err(e) => {
            warn!("Failed to write PID {} to {}, stopping daemon", pid, record_path.display());
            abort(&mut child);
            return Err(DaemonError::RecordPersistenceFailed {
                path: record_path,
                pid: Some(pid),
                reason: e.to_string(),
            });
        }
    };

    info!(
        "Launched {} (slot {}) with PID {}, written to {}",
        settings.name,
        slot,
        pid,
        record_path.display()
    );

    // The daemon is on its own from here; dropping the handle neither waits nor kills.
    drop(child);

    Ok(LaunchedDaemon {
        pid,
        slot,
        config_path,
        record_path,
    })
}

fn open_log(log_dir: &std::path::Path, log_path: &std::path::Path) -> io::Result<fs::File> {
    fs::create_dir_all(log_dir)?;
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
}

/// Run the child in a new session so it survives the hook's exit and owns its process group.
fn detach(cmd: &mut Command) {
    // SAFETY: the hook only calls setsid(2), which is async-signal-safe, and touches no heap or locks.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Kill the daemon's process group and reap it.
fn abort(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: the child called setsid, so its pgid is its pid and the group holds only the daemon.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
    if let Err(e) = child.kill() {
        debug!("kill after killpg: {}", e);
    }
    if let Err(e) = child.wait() {
        warn!("Failed to reap daemon PID {}: {}", child.id(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> JobId {
        JobId::parse(id).unwrap()
    }

    #[test]
    fn missing_config_artifact_fails_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DaemonSettings {
            binary: PathBuf::from("/bin/sh"),
            config_dir: dir.path().to_path_buf(),
            record_dir: dir.path().to_path_buf(),
            ..DaemonSettings::default()
        };
        let store = RecordStore::new(&settings.record_dir, &settings.name);

        let err = launch_daemon(&settings, &store, &job("1"), 0).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonLaunchFailed { .. }));
        assert!(!store.exists(&job("1")));
    }

    #[test]
    fn missing_binary_is_reported_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config-1"), "GRBM_COUNT\n").unwrap();
        let settings = DaemonSettings {
            binary: dir.path().join("no-such-daemon"),
            config_dir: dir.path().to_path_buf(),
            record_dir: dir.path().to_path_buf(),
            ..DaemonSettings::default()
        };
        let store = RecordStore::new(&settings.record_dir, &settings.name);

        let err = launch_daemon(&settings, &store, &job("2"), 1).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonBinaryNotFound { .. }));
        assert!(!store.exists(&job("2")));
    }

    #[test]
    fn existing_record_blocks_a_second_launch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config-0"), "exec sleep 30\n").unwrap();
        let settings = DaemonSettings {
            binary: PathBuf::from("/bin/sh"),
            config_dir: dir.path().to_path_buf(),
            record_dir: dir.path().to_path_buf(),
            ..DaemonSettings::default()
        };
        let store = RecordStore::new(&settings.record_dir, &settings.name);
        store.create(&job("3"), 12345).unwrap();

        let err = launch_daemon(&settings, &store, &job("3"), 0).unwrap_err();
        assert!(matches!(
            err,
            DaemonError::RecordPersistenceFailed { pid: None, .. }
        ));
        assert_eq!(store.read_pid(&job("3")).unwrap(), 12345);
    }
}
