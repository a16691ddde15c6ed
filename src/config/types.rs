//! Hook configuration structs and defaults.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::nodelist::PaddingTable;
use crate::role::RolePolicy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub daemon: DaemonSettings,
    pub policy: RolePolicy,
    pub padding: PaddingTable,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Daemon name; also names the PID record (`<name>-pid-<job>`).
    pub name: String,
    /// Executable to launch. A bare name is looked up on `PATH`.
    pub binary: PathBuf,
    /// Directory holding the per-slot counter configuration files.
    pub config_dir: PathBuf,
    /// File name prefix of a slot's configuration (`config-0`, `config-1`, ...).
    pub config_prefix: String,
    /// Directory for PID records.
    pub record_dir: PathBuf,
    /// Daemon stdout/stderr go to `<log_dir>/<name>-<job>.log` when set; inherited otherwise.
    pub log_dir: Option<PathBuf>,
    /// How long to wait before checking that the daemon survived its own startup.
    pub startup_grace_ms: u64,
    pub stop_signal: StopSignal,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            name: "rocm-counter-daemon".to_string(),
            binary: PathBuf::from("rocm-counter-daemon"),
            config_dir: PathBuf::from("."),
            config_prefix: "config-".to_string(),
            record_dir: PathBuf::from("/tmp"),
            log_dir: None,
            startup_grace_ms: 0,
            stop_signal: StopSignal::Usr1,
        }
    }
}

impl DaemonSettings {
    /// Counter configuration artifact for a slot.
    pub fn config_artifact(&self, slot: u32) -> PathBuf {
        self.config_dir.join(format!("{}{}", self.config_prefix, slot))
    }
}

/// Catchable signals the daemon understands as "flush and exit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopSignal {
    #[default]
    #[serde(rename = "SIGUSR1")]
    Usr1,
    #[serde(rename = "SIGUSR2")]
    Usr2,
    #[serde(rename = "SIGTERM")]
    Term,
    #[serde(rename = "SIGINT")]
    Int,
}

impl StopSignal {
    pub fn as_raw(self) -> libc::c_int {
        match self {
            Self::Usr1 => libc::SIGUSR1,
            Self::Usr2 => libc::SIGUSR2,
            Self::Term => libc::SIGTERM,
            Self::Int => libc::SIGINT,
        }
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Usr1 => "SIGUSR1",
            Self::Usr2 => "SIGUSR2",
            Self::Term => "SIGTERM",
            Self::Int => "SIGINT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployed_scripts() {
        let config = HookConfig::default();
        assert_eq!(config.daemon.name, "rocm-counter-daemon");
        assert_eq!(config.daemon.record_dir, PathBuf::from("/tmp"));
        assert_eq!(config.daemon.stop_signal, StopSignal::Usr1);
        assert_eq!(config.policy.min_job_nodes, 1882);
        assert_eq!(config.policy.stride, 16);
        assert_eq!(config.padding.width_for("frontier"), Some(5));
    }

    #[test]
    fn artifact_path_is_keyed_by_slot() {
        let settings = DaemonSettings {
            config_dir: PathBuf::from("/lustre/counters"),
            ..DaemonSettings::default()
        };
        assert_eq!(
            settings.config_artifact(2),
            PathBuf::from("/lustre/counters/config-2")
        );
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{
            "daemon": { "binary": "/opt/counters/bin/daemon", "stop_signal": "SIGTERM" },
            "policy": { "min_job_nodes": 8 },
            "padding": { "widths": { "node": 4 } }
        }"#;
        let config: HookConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.daemon.binary, PathBuf::from("/opt/counters/bin/daemon"));
        assert_eq!(config.daemon.name, "rocm-counter-daemon");
        assert_eq!(config.daemon.stop_signal, StopSignal::Term);
        assert_eq!(config.policy.min_job_nodes, 8);
        assert_eq!(config.policy.max_slot, 2);
        assert_eq!(config.padding.width_for("node"), Some(4));
        assert_eq!(config.padding.width_for("frontier"), None);
        assert_eq!(config.logging.log_level, "INFO");
    }

    #[test]
    fn unknown_signal_name_is_rejected() {
        let json = r#"{ "daemon": { "stop_signal": "SIGKILL" } }"#;
        assert!(serde_json::from_str::<HookConfig>(json).is_err());
    }
}
