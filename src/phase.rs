//! Prologue and epilogue orchestration.

use tracing::{debug, info, warn};

use crate::config::context::{feature_flag_from_lookup, node_count_from_lookup};
use crate::config::{HookConfig, JobContext, JobId};
use crate::daemon::{launch_daemon, terminate_daemon, DaemonError, LaunchedDaemon, RecordStore, TerminatedDaemon};
use crate::error::HookError;
use crate::nodelist;
use crate::role::{is_falsy, locate_node, RoleDecision, SkipReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrologueOutcome {
    Skipped(SkipReason),
    Launched(LaunchedDaemon),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpilogueOutcome {
    Terminated(TerminatedDaemon),
    /// No daemon was recorded for this job on this node.
    NoRecord,
    /// The recorded daemon had already exited; its record was removed.
    Stale { pid: u32 },
}

/// Skip checks that need only the feature flag and the node count.
///
/// An opted-out job reads no other variable and a job below the minimum reads
/// only the node count, so a partial environment on those jobs still succeeds.
pub fn early_skip<F>(config: &HookConfig, lookup: &F) -> Result<Option<SkipReason>, HookError>
where
    F: Fn(&str) -> Option<String>,
{
    let flag = feature_flag_from_lookup(lookup);
    if flag.as_deref().is_some_and(is_falsy) {
        return Ok(Some(SkipReason::OptedOut));
    }
    let node_count = node_count_from_lookup(lookup)?;
    match config.policy.gate(node_count, flag.as_deref()) {
        Some(RoleDecision::NotParticipating(reason)) => Ok(Some(reason)),
        _ => Ok(None),
    }
}

/// Prologue driven by an environment lookup: early skips first, then the full context.
pub fn prologue_from_lookup<F>(config: &HookConfig, lookup: F) -> Result<PrologueOutcome, HookError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(reason) = early_skip(config, &lookup)? {
        info!("Not a counter node: {}", reason);
        return Ok(PrologueOutcome::Skipped(reason));
    }
    let ctx = JobContext::from_lookup(&lookup)?;
    run_prologue(config, &ctx)
}

/// Work out this node's role without side effects.
pub fn resolve_role(config: &HookConfig, ctx: &JobContext) -> Result<RoleDecision, HookError> {
    let policy = &config.policy;
    let flag = ctx.feature_flag.as_deref();

    if let Some(decision) = policy.gate(ctx.node_count, flag) {
        return Ok(decision);
    }

    let nodes = nodelist::expand(&ctx.node_list, &config.padding)?;
    if nodes.len() != ctx.node_count as usize {
        warn!(
            "Node list {} expands to {} nodes but the job has {}",
            ctx.node_list,
            nodes.len(),
            ctx.node_count
        );
    }

    let index = locate_node(&nodes, &ctx.node_name)?;
    if let Some(node_id) = ctx.node_id {
        if node_id as usize != index {
            warn!(
                "{} is at position {} in the node list but the scheduler reports node id {}",
                ctx.node_name, index, node_id
            );
        }
    }
    debug!("{} is node {} of {}", ctx.node_name, index, ctx.node_count);

    Ok(policy.decide(ctx.node_count, index, flag))
}

/// Decide this node's role and, for counter nodes, launch the daemon.
pub fn run_prologue(config: &HookConfig, ctx: &JobContext) -> Result<PrologueOutcome, HookError> {
    match resolve_role(config, ctx)? {
        RoleDecision::NotParticipating(reason) => {
            info!("Not a counter node for job {}: {}", ctx.job_id, reason);
            Ok(PrologueOutcome::Skipped(reason))
        }
        RoleDecision::Participating { slot } => {
            info!("{} is a counter node for job {} (slot {})", ctx.node_name, ctx.job_id, slot);
            let store = RecordStore::from_settings(&config.daemon);
            let launched = launch_daemon(&config.daemon, &store, &ctx.job_id, slot)?;
            Ok(PrologueOutcome::Launched(launched))
        }
    }
}

/// Stop this job's daemon, if this node ran one.
pub fn run_epilogue(config: &HookConfig, job_id: &JobId) -> Result<EpilogueOutcome, HookError> {
    let store = RecordStore::from_settings(&config.daemon);
    match terminate_daemon(&store, job_id, config.daemon.stop_signal) {
        Ok(terminated) => Ok(EpilogueOutcome::Terminated(terminated)),
        Err(DaemonError::RecordNotFound { path }) => {
            info!("PID file {} not found, nothing to stop", path.display());
            Ok(EpilogueOutcome::NoRecord)
        }
        Err(DaemonError::StaleRecord { pid, .. }) => Ok(EpilogueOutcome::Stale { pid }),
        Err(e) => Err(e.into()),
    }
}
