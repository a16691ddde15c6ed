//! Compressed hostlist expansion (`frontier[00008-00010,00029]` -> explicit names).
//!
//! Order matters more than names here: the role decision is driven by a node's
//! ordinal position, so groups expand in the order listed and ranges ascend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the number of names one specification may expand to.
pub const MAX_EXPANDED_NODES: usize = 1 << 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeListError {
    #[error("malformed node list '{spec}': {reason}")]
    MalformedSpecification { spec: String, reason: String },
}

/// Zero-padding width per node-name prefix.
///
/// Prefixes missing from `widths` fall back to `default_width`; when that is
/// unset too, numbers keep the width they were written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddingTable {
    pub widths: BTreeMap<String, usize>,
    pub default_width: Option<usize>,
}

impl Default for PaddingTable {
    fn default() -> Self {
        let mut widths = BTreeMap::new();
        widths.insert("frontier".to_string(), 5);
        Self {
            widths,
            default_width: None,
        }
    }
}

impl PaddingTable {
    /// Table with a single fixed width for every prefix.
    pub fn uniform(width: usize) -> Self {
        Self {
            widths: BTreeMap::new(),
            default_width: Some(width),
        }
    }

    pub fn with_prefix(mut self, prefix: &str, width: usize) -> Self {
        self.widths.insert(prefix.to_string(), width);
        self
    }

    /// Width for `prefix`, or `None` when the literal digit width should be kept.
    pub fn width_for(&self, prefix: &str) -> Option<usize> {
        self.widths.get(prefix).copied().or(self.default_width)
    }
}

/// Expand a compressed node-list specification into ordered node names.
pub fn expand(spec: &str, padding: &PaddingTable) -> Result<Vec<String>, NodeListError> {
    let malformed = |reason: String| NodeListError::MalformedSpecification {
        spec: spec.to_string(),
        reason,
    };

    let mut nodes = Vec::new();
    for group in split_groups(spec).map_err(&malformed)? {
        expand_group(group, padding, &mut nodes).map_err(&malformed)?;
    }
    Ok(nodes)
}

/// Split on commas that sit outside brackets.
fn split_groups(spec: &str) -> Result<Vec<&str>, String> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in spec.char_indices() {
        match c {
            '[' => {
                if depth > 0 {
                    return Err("nested '['".into());
                }
                depth += 1;
            }
            ']' => {
                if depth == 0 {
                    return Err("unbalanced ']'".into());
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                groups.push(&spec[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unterminated '['".into());
    }
    groups.push(&spec[start..]);
    Ok(groups)
}

fn expand_group(group: &str, padding: &PaddingTable, out: &mut Vec<String>) -> Result<(), String> {
    if group.is_empty() {
        return Err("empty node group".into());
    }

    let prefix_len = group
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(group.len());
    let (prefix, rest) = group.split_at(prefix_len);
    if prefix.is_empty() {
        return Err(format!("group '{group}' has no alphabetic prefix"));
    }

    let width = padding.width_for(prefix);

    if let Some(inner) = rest.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| format!("group '{group}' has trailing characters after ']'"))?;
        if inner.is_empty() {
            return Ok(());
        }
        for component in inner.split(',') {
            expand_component(prefix, component, width, out)?;
        }
        Ok(())
    } else if rest.is_empty() {
        Err(format!("group '{group}' has no node number"))
    } else {
        let n = parse_number(rest)?;
        push_node(out, prefix, n, width.unwrap_or(rest.len()))
    }
}

fn expand_component(
    prefix: &str,
    component: &str,
    width: Option<usize>,
    out: &mut Vec<String>,
) -> Result<(), String> {
    match component.split_once('-') {
        Some((lo, hi)) => {
            let start = parse_number(lo)?;
            let end = parse_number(hi)?;
            if start > end {
                return Err(format!("range '{component}' has start greater than end"));
            }
            let count = usize::try_from(end - start)
                .ok()
                .and_then(|d| d.checked_add(1))
                .ok_or_else(|| format!("range '{component}' is too large"))?;
            if out.len().saturating_add(count) > MAX_EXPANDED_NODES {
                return Err(format!("expands to more than {MAX_EXPANDED_NODES} nodes"));
            }
            let width = width.unwrap_or(lo.len());
            for n in start..=end {
                push_node(out, prefix, n, width)?;
            }
            Ok(())
        }
        None => {
            let n = parse_number(component)?;
            push_node(out, prefix, n, width.unwrap_or(component.len()))
        }
    }
}

fn parse_number(token: &str) -> Result<u64, String> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{token}' is not a node number"));
    }
    token
        .parse::<u64>()
        .map_err(|_| format!("node number '{token}' is out of range"))
}

fn push_node(out: &mut Vec<String>, prefix: &str, n: u64, width: usize) -> Result<(), String> {
    if out.len() >= MAX_EXPANDED_NODES {
        return Err(format!("expands to more than {MAX_EXPANDED_NODES} nodes"));
    }
    out.push(format!("{prefix}{n:0width$}"));
    Ok(())
}
