use chrono::{DateTime, Local};
use std::path::PathBuf;

use crate::config::JobId;
use crate::daemon::record::is_alive;
use crate::daemon::{DaemonError, RecordStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    Missing,
    Corrupt { content: String },
    Present { pid: u32, alive: bool },
}

#[derive(Debug, Clone)]
pub struct RecordStatus {
    pub path: PathBuf,
    pub state: RecordState,
    pub written_at: Option<DateTime<Local>>,
}

pub fn record_status(store: &RecordStore, job_id: &JobId) -> Result<RecordStatus, DaemonError> {
    let path = store.path_for(job_id);
    let state = match store.read_pid(job_id) {
        Ok(pid) => RecordState::Present {
            pid,
            alive: is_alive(pid),
        },
        Err(DaemonError::RecordNotFound { .. }) => RecordState::Missing,
        Err(DaemonError::CorruptRecord { content, .. }) => RecordState::Corrupt { content },
        Err(e) => return Err(e),
    };
    let written_at = std::fs::metadata(&path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Local>::from);

    Ok(RecordStatus {
        path,
        state,
        written_at,
    })
}

pub fn show_status(store: &RecordStore, job_id: &JobId) -> Result<(), DaemonError> {
    let status = record_status(store, job_id)?;

    println!("\x1b[32mcounter-hook v{} ({})\x1b[0m", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
    println!("================================");
    println!("Job:    {}", job_id);
    println!("Record: {}", status.path.display());

    match &status.state {
        RecordState::Missing => println!("Status: No daemon recorded for this job"),
        RecordState::Corrupt { content } => println!("Status: Corrupt record ('{}')", content),
        RecordState::Present { pid, alive: true } => println!("Status: Running (PID: {})", pid),
        RecordState::Present { pid, alive: false } => {
            println!("Status: Not running (stale PID: {})", pid)
        }
    }
    if let Some(at) = status.written_at {
        println!("Since:  {}", at.format("%Y-%m-%d %H:%M:%S"));
    }

    Ok(())
}
