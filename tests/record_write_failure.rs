//! A PID record that cannot be fully written must not be left behind.
//!
//! `RLIMIT_FSIZE` is process-wide, so this lives in its own test binary with a
//! single test and nothing else writing files while the limit is lowered.

use std::fs;
use std::path::PathBuf;

use counter_hooks::config::{DaemonSettings, JobId};
use counter_hooks::daemon::record::is_alive;
use counter_hooks::daemon::{launch_daemon, DaemonError, RecordStore};

struct FileSizeLimit {
    previous: libc::rlimit,
}

impl FileSizeLimit {
    /// Lower the soft file-size limit to zero and ignore `SIGXFSZ`, so writes fail with `EFBIG`.
    fn zero() -> Self {
        let mut previous = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        unsafe {
            assert_eq!(libc::getrlimit(libc::RLIMIT_FSIZE, &mut previous), 0);
            libc::signal(libc::SIGXFSZ, libc::SIG_IGN);
            let lowered = libc::rlimit {
                rlim_cur: 0,
                rlim_max: previous.rlim_max,
            };
            assert_eq!(libc::setrlimit(libc::RLIMIT_FSIZE, &lowered), 0);
        }
        Self { previous }
    }
}

impl Drop for FileSizeLimit {
    fn drop(&mut self) {
        unsafe {
            libc::setrlimit(libc::RLIMIT_FSIZE, &self.previous);
        }
    }
}

#[test]
fn failed_pid_write_removes_the_partial_record() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("config-0"), "exec sleep 30\n").unwrap();
    let settings = DaemonSettings {
        name: "test-counter-daemon".to_string(),
        binary: PathBuf::from("/bin/sh"),
        config_dir: dir.path().to_path_buf(),
        record_dir: dir.path().to_path_buf(),
        ..DaemonSettings::default()
    };
    let store = RecordStore::from_settings(&settings);
    let job = JobId::parse("3001").unwrap();

    let result = {
        let _limit = FileSizeLimit::zero();
        launch_daemon(&settings, &store, &job, 0)
    };

    let pid = match result {
        Err(DaemonError::RecordPersistenceFailed { pid: Some(pid), .. }) => pid,
        other => panic!("unexpected result: {other:?}"),
    };
    assert!(!is_alive(pid), "daemon {pid} still running without a record");
    assert!(!store.exists(&job), "partial record left at {}", store.path_for(&job).display());
    assert!(matches!(
        store.read_pid(&job),
        Err(DaemonError::RecordNotFound { .. })
    ));
}
