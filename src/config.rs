//! Hook configuration: file-backed settings and the per-invocation job context.

pub mod context;
pub mod persistence;
pub mod types;

pub use context::{ContextError, JobContext, JobId};
pub use persistence::load_config;
pub use types::{DaemonSettings, HookConfig, LoggingSettings, StopSignal};
