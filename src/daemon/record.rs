//! Per-job PID records (`<dir>/<daemon>-pid-<job>`).

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::{DaemonSettings, JobId};
use crate::daemon::DaemonError;

/// Owner read/write only.
pub const RECORD_MODE: u32 = 0o600;

#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
    daemon_name: String,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>, daemon_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            daemon_name: daemon_name.into(),
        }
    }

    /// Store rooted at the configured record directory.
    pub fn from_settings(settings: &DaemonSettings) -> Self {
        Self::new(&settings.record_dir, &settings.name)
    }

    pub fn path_for(&self, job_id: &JobId) -> PathBuf {
        self.dir
            .join(format!("{}-pid-{}", self.daemon_name, job_id.as_str()))
    }

    pub fn exists(&self, job_id: &JobId) -> bool {
        self.path_for(job_id).exists()
    }

    /// Create the record for `job_id`. Fails if one already exists.
    ///
    /// The file is created with mode 0600 and the mode is set again after the
    /// write, so the PID is never readable by other users. If anything after
    /// the open fails, the partial file is removed again.
    pub fn create(&self, job_id: &JobId, pid: u32) -> io::Result<PathBuf> {
        let path = self.path_for(job_id);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(RECORD_MODE)
            .open(&path)?;

        let written = file
            .write_all(pid.to_string().as_bytes())
            .and_then(|()| file.sync_all())
            .and_then(|()| fs::set_permissions(&path, fs::Permissions::from_mode(RECORD_MODE)));
        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = remove_path(&path) {
                warn!("Failed to remove partial PID file {}: {}", path.display(), cleanup);
            }
            return Err(e);
        }
        Ok(path)
    }

    /// Read and validate the recorded PID.
    pub fn read_pid(&self, job_id: &JobId) -> Result<u32, DaemonError> {
        let path = self.path_for(job_id);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DaemonError::RecordNotFound { path })
            }
            Err(e) => return Err(DaemonError::RecordReadFailed { path, source: e }),
        };
        parse_pid(&content).ok_or_else(|| DaemonError::CorruptRecord {
            path,
            content: content.trim().to_string(),
        })
    }

    /// Remove the record. A record that is already gone is not an error.
    pub fn remove(&self, job_id: &JobId) -> io::Result<()> {
        remove_path(&self.path_for(job_id))
    }
}

fn remove_path(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Parse a decimal PID. Zero, one and negative values are rejected: `kill`
/// would read them as process-group or broadcast targets, or hit init.
pub fn parse_pid(content: &str) -> Option<u32> {
    let trimmed = content.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let pid = trimmed.parse::<u32>().ok()?;
    if pid <= 1 || pid > i32::MAX as u32 {
        return None;
    }
    Some(pid)
}

/// Whether a process with `pid` exists (signal 0 probe).
///
/// `EPERM` means the process exists but belongs to someone else.
pub fn is_alive(pid: u32) -> bool {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 delivers nothing; parse_pid keeps raw above 1, so no group or broadcast target.
    if unsafe { libc::kill(raw, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
