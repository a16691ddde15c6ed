//! Counter-node selection.
//!
//! Every node of a job evaluates [`RolePolicy::decide`] on its own, over the same
//! scheduler-provided inputs, and must reach the same answer. Integer arithmetic only.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("node '{node}' does not appear in the job's node list")]
    NodeNotInAllocation { node: String },

    #[error("node '{node}' appears more than once in the job's node list (positions {first} and {second})")]
    DuplicateNode {
        node: String,
        first: usize,
        second: usize,
    },
}

/// Why a node does not run the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The feature flag was set to a falsy value.
    OptedOut,
    /// The job is not a leadership-class allocation.
    BelowMinimum { node_count: u32, minimum: u32 },
    /// `node_count / base` rounded down to zero.
    EmptyGroup,
    SlotOutOfRange { slot: u32 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OptedOut => write!(f, "hardware counters disabled for this job"),
            Self::BelowMinimum {
                node_count,
                minimum,
            } => write!(f, "job has {node_count} nodes, fewer than {minimum}"),
            Self::EmptyGroup => write!(f, "node group size is zero"),
            Self::SlotOutOfRange { slot } => write!(f, "slot {slot} is not a counter slot"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleDecision {
    NotParticipating(SkipReason),
    Participating { slot: u32 },
}

impl RoleDecision {
    pub fn is_participating(&self) -> bool {
        matches!(self, Self::Participating { .. })
    }

    pub fn slot(&self) -> Option<u32> {
        match self {
            Self::Participating { slot } => Some(*slot),
            Self::NotParticipating(_) => None,
        }
    }
}

/// Thresholds for the counter-node policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolePolicy {
    /// Jobs smaller than this never run the daemon.
    pub min_job_nodes: u32,
    /// Below this node count every node is its own group (`base = 1`).
    pub small_job_nodes: u32,
    /// Group divisor (`base`) for jobs at or above `small_job_nodes`.
    pub stride: u32,
    /// Highest slot that still runs a daemon.
    pub max_slot: u32,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self {
            min_job_nodes: 1882,
            small_job_nodes: 1882,
            stride: 16,
            max_slot: 2,
        }
    }
}

impl RolePolicy {
    /// Decisions that do not depend on the node's position.
    ///
    /// Returns `Some` when the node can be ruled out before the node list is
    /// even looked at.
    pub fn gate(&self, node_count: u32, feature_flag: Option<&str>) -> Option<RoleDecision> {
        if feature_flag.is_some_and(is_falsy) {
            return Some(RoleDecision::NotParticipating(SkipReason::OptedOut));
        }
        if node_count < self.min_job_nodes {
            return Some(RoleDecision::NotParticipating(SkipReason::BelowMinimum {
                node_count,
                minimum: self.min_job_nodes,
            }));
        }
        None
    }

    /// Decide the role of the node at `index` in a job of `node_count` nodes.
    pub fn decide(&self, node_count: u32, index: usize, feature_flag: Option<&str>) -> RoleDecision {
        if let Some(decision) = self.gate(node_count, feature_flag) {
            return decision;
        }

        let base = if node_count < self.small_job_nodes {
            1
        } else {
            self.stride
        };
        // A zero stride behaves like an empty group rather than dividing by zero.
        let group = node_count.checked_div(base).unwrap_or(0);
        if group == 0 {
            return RoleDecision::NotParticipating(SkipReason::EmptyGroup);
        }

        let slot = (index as u64 % u64::from(group)) as u32;
        if slot > self.max_slot {
            RoleDecision::NotParticipating(SkipReason::SlotOutOfRange { slot })
        } else {
            RoleDecision::Participating { slot }
        }
    }
}

/// Falsy spellings of a boolean-ish environment value.
pub fn is_falsy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off" | "n" | "f"
    )
}

/// Position of `node` within the expanded node list.
pub fn locate_node(nodes: &[String], node: &str) -> Result<usize, RoleError> {
    let mut hits = nodes.iter().enumerate().filter(|(_, n)| *n == node).map(|(i, _)| i);

    let first = hits.next().ok_or_else(|| RoleError::NodeNotInAllocation {
        node: node.to_string(),
    })?;
    if let Some(second) = hits.next() {
        return Err(RoleError::DuplicateNode {
            node: node.to_string(),
            first,
            second,
        });
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leadership_job_picks_first_three_of_each_group() {
        let policy = RolePolicy::default();
        assert_eq!(policy.decide(2048, 0, None), RoleDecision::Participating { slot: 0 });
        assert_eq!(policy.decide(2048, 1, None), RoleDecision::Participating { slot: 1 });
        assert_eq!(policy.decide(2048, 2, None), RoleDecision::Participating { slot: 2 });
        assert_eq!(
            policy.decide(2048, 3, None),
            RoleDecision::NotParticipating(SkipReason::SlotOutOfRange { slot: 3 })
        );
        assert_eq!(
            policy.decide(2048, 127, None),
            RoleDecision::NotParticipating(SkipReason::SlotOutOfRange { slot: 127 })
        );
    }

    #[test]
    fn index_wraps_at_group_boundary() {
        // 2048 / 16 = 128, so index 128 lands on slot 0 again.
        let policy = RolePolicy::default();
        assert_eq!(policy.decide(2048, 128, None), RoleDecision::Participating { slot: 0 });
        assert_eq!(policy.decide(2048, 130, None), RoleDecision::Participating { slot: 2 });
        assert!(!policy.decide(2048, 131, None).is_participating());
    }

    #[test]
    fn small_jobs_never_participate() {
        let policy = RolePolicy::default();
        for index in [0usize, 1, 2, 100, 1880] {
            assert_eq!(
                policy.decide(1881, index, None),
                RoleDecision::NotParticipating(SkipReason::BelowMinimum {
                    node_count: 1881,
                    minimum: 1882
                })
            );
        }
    }

    #[test]
    fn falsy_flag_opts_out() {
        let policy = RolePolicy::default();
        for flag in ["0", "false", "No", "OFF", ""] {
            assert_eq!(
                policy.decide(4096, 0, Some(flag)),
                RoleDecision::NotParticipating(SkipReason::OptedOut)
            );
        }
        assert!(policy.decide(4096, 0, Some("1")).is_participating());
        assert!(policy.decide(4096, 0, Some("yes")).is_participating());
    }

    #[test]
    fn base_is_one_below_small_job_threshold() {
        let policy = RolePolicy {
            min_job_nodes: 1,
            small_job_nodes: 64,
            ..RolePolicy::default()
        };
        // group == node_count, so only the first three nodes qualify.
        assert_eq!(policy.decide(10, 2, None).slot(), Some(2));
        assert_eq!(policy.decide(10, 3, None).slot(), None);
        assert_eq!(policy.decide(1, 0, None).slot(), Some(0));
    }

    #[test]
    fn empty_group_does_not_divide_by_zero() {
        let policy = RolePolicy {
            min_job_nodes: 1,
            small_job_nodes: 1,
            ..RolePolicy::default()
        };
        assert_eq!(
            policy.decide(15, 0, None),
            RoleDecision::NotParticipating(SkipReason::EmptyGroup)
        );

        let zero_stride = RolePolicy {
            min_job_nodes: 1,
            small_job_nodes: 1,
            stride: 0,
            max_slot: 2,
        };
        assert_eq!(
            zero_stride.decide(32, 0, None),
            RoleDecision::NotParticipating(SkipReason::EmptyGroup)
        );
    }

    #[test]
    fn locate_finds_single_occurrence() {
        let nodes: Vec<String> = ["a1", "a2", "a3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(locate_node(&nodes, "a2"), Ok(1));
        assert_eq!(
            locate_node(&nodes, "a9"),
            Err(RoleError::NodeNotInAllocation { node: "a9".into() })
        );
    }

    #[test]
    fn locate_rejects_duplicates() {
        let nodes: Vec<String> = ["a1", "a2", "a1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            locate_node(&nodes, "a1"),
            Err(RoleError::DuplicateNode {
                node: "a1".into(),
                first: 0,
                second: 2
            })
        );
    }
}
