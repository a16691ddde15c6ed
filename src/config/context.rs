//! Per-invocation job context, read from the scheduler's environment.

use std::fmt;

use thiserror::Error;

pub const ENV_FEATURE_FLAG: &str = "OLCF_HW_COUNTERS";
pub const ENV_LEGACY_OPT_OUT: &str = "NO_OLCF_HW_COUNTERS";
pub const ENV_NODE_COUNT: &str = "SLURM_NNODES";
pub const ENV_NODE_NAME: &str = "SLURMD_NODENAME";
pub const ENV_NODE_LIST: &str = "SLURM_JOB_NODELIST";
pub const ENV_NODE_LIST_LEGACY: &str = "SLURM_NODELIST";
pub const ENV_JOB_ID: &str = "SLURM_JOB_ID";
pub const ENV_JOB_ID_LEGACY: &str = "SLURM_JOBID";
pub const ENV_NODE_ID: &str = "SLURM_NODEID";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("{var} not set")]
    Missing { var: &'static str },

    #[error("{var}='{value}' is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Scheduler job identifier, safe to embed in a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn parse(value: &str) -> Result<Self, ContextError> {
        let invalid = |reason| ContextError::Invalid {
            var: ENV_JOB_ID,
            value: value.to_string(),
            reason,
        };

        if value.is_empty() {
            return Err(invalid("job id is empty"));
        }
        if value.starts_with('.') {
            return Err(invalid("job id may not start with '.'"));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'))
        {
            return Err(invalid("job id may only contain [A-Za-z0-9_.+-]"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the prologue needs to know about the job and this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub node_count: u32,
    pub node_name: String,
    /// Compressed node list as printed by the scheduler.
    pub node_list: String,
    pub job_id: JobId,
    pub feature_flag: Option<String>,
    /// Scheduler-assigned ordinal, used only to cross-check the located index.
    pub node_id: Option<u32>,
}

impl JobContext {
    pub fn from_env() -> Result<Self, ContextError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ContextError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let feature_flag = feature_flag_from_lookup(&lookup);
        let node_count = node_count_from_lookup(&lookup)?;
        let node_name = require(&lookup, ENV_NODE_NAME, None)?;
        let node_list = require(&lookup, ENV_NODE_LIST, Some(ENV_NODE_LIST_LEGACY))?;
        let job_id = job_id_from_lookup(&lookup)?;
        let node_id = lookup(ENV_NODE_ID).and_then(|v| v.trim().parse::<u32>().ok());

        Ok(Self {
            node_count,
            node_name,
            node_list,
            job_id,
            feature_flag,
            node_id,
        })
    }
}

/// The counters feature flag. Presence of the legacy opt-out variable alone
/// disables counters, whatever its value, and reads as `"0"`.
pub fn feature_flag_from_lookup<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if lookup(ENV_LEGACY_OPT_OUT).is_some() {
        Some("0".to_string())
    } else {
        lookup(ENV_FEATURE_FLAG)
    }
}

pub fn node_count_from_lookup<F>(lookup: &F) -> Result<u32, ContextError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = require(lookup, ENV_NODE_COUNT, None)?;
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(ContextError::Invalid {
            var: ENV_NODE_COUNT,
            value: raw,
            reason: "node count must be positive",
        }),
        Ok(n) => Ok(n),
        Err(_) => Err(ContextError::Invalid {
            var: ENV_NODE_COUNT,
            value: raw,
            reason: "not an integer",
        }),
    }
}

/// Job id alone, for modes that do not look at the allocation.
pub fn job_id_from_env() -> Result<JobId, ContextError> {
    job_id_from_lookup(|key| std::env::var(key).ok())
}

pub fn job_id_from_lookup<F>(lookup: F) -> Result<JobId, ContextError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = require(&lookup, ENV_JOB_ID, Some(ENV_JOB_ID_LEGACY))?;
    JobId::parse(raw.trim())
}

fn require<F>(lookup: &F, var: &'static str, fallback: Option<&'static str>) -> Result<String, ContextError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .or_else(|| fallback.and_then(|f| lookup(f)))
        .filter(|v| !v.trim().is_empty())
        .ok_or(ContextError::Missing { var })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_NODE_COUNT, "2048"),
            (ENV_NODE_NAME, "frontier00002"),
            (ENV_NODE_LIST, "frontier[00001-02048]"),
            (ENV_JOB_ID, "1234567"),
        ]
    }

    #[test]
    fn reads_complete_context() {
        let ctx = JobContext::from_lookup(env(&full_env())).unwrap();
        assert_eq!(ctx.node_count, 2048);
        assert_eq!(ctx.node_name, "frontier00002");
        assert_eq!(ctx.node_list, "frontier[00001-02048]");
        assert_eq!(ctx.job_id.as_str(), "1234567");
        assert_eq!(ctx.feature_flag, None);
        assert_eq!(ctx.node_id, None);
    }

    #[test]
    fn legacy_variable_names_are_accepted() {
        let ctx = JobContext::from_lookup(env(&[
            (ENV_NODE_COUNT, "4"),
            (ENV_NODE_NAME, "n1"),
            (ENV_NODE_LIST_LEGACY, "n[1-4]"),
            (ENV_JOB_ID_LEGACY, "99"),
            (ENV_NODE_ID, "0"),
        ]))
        .unwrap();
        assert_eq!(ctx.node_list, "n[1-4]");
        assert_eq!(ctx.job_id.as_str(), "99");
        assert_eq!(ctx.node_id, Some(0));
    }

    #[test]
    fn missing_node_count_is_reported() {
        let mut pairs = full_env();
        pairs.retain(|(k, _)| *k != ENV_NODE_COUNT);
        assert_eq!(
            JobContext::from_lookup(env(&pairs)),
            Err(ContextError::Missing { var: ENV_NODE_COUNT })
        );
    }

    #[test]
    fn zero_and_garbage_node_counts_are_invalid() {
        for bad in ["0", "-3", "many"] {
            let mut pairs = full_env();
            pairs.retain(|(k, _)| *k != ENV_NODE_COUNT);
            pairs.push((ENV_NODE_COUNT, bad));
            assert!(matches!(
                JobContext::from_lookup(env(&pairs)),
                Err(ContextError::Invalid { var: ENV_NODE_COUNT, .. })
            ));
        }
    }

    #[test]
    fn legacy_opt_out_wins_over_feature_flag() {
        let mut pairs = full_env();
        pairs.push((ENV_FEATURE_FLAG, "1"));
        pairs.push((ENV_LEGACY_OPT_OUT, "anything"));
        let ctx = JobContext::from_lookup(env(&pairs)).unwrap();
        assert_eq!(ctx.feature_flag.as_deref(), Some("0"));
    }

    #[test]
    fn feature_flag_needs_nothing_else() {
        assert_eq!(feature_flag_from_lookup(&env(&[(ENV_LEGACY_OPT_OUT, "")])).as_deref(), Some("0"));
        assert_eq!(feature_flag_from_lookup(&env(&[(ENV_FEATURE_FLAG, "no")])).as_deref(), Some("no"));
        assert_eq!(feature_flag_from_lookup(&env(&[])), None);
    }

    #[test]
    fn node_count_is_read_on_its_own() {
        assert_eq!(node_count_from_lookup(&env(&[(ENV_NODE_COUNT, " 8 ")])), Ok(8));
        assert_eq!(
            node_count_from_lookup(&env(&[])),
            Err(ContextError::Missing { var: ENV_NODE_COUNT })
        );
    }

    #[test]
    fn job_id_must_be_a_safe_file_name_component() {
        assert!(JobId::parse("1234").is_ok());
        assert!(JobId::parse("1234+0").is_ok());
        assert!(JobId::parse("1234_5.batch").is_ok());
        for bad in ["", "../etc", ".hidden", "12/34", "12 34"] {
            assert!(JobId::parse(bad).is_err(), "expected '{bad}' to be rejected");
        }
    }
}
