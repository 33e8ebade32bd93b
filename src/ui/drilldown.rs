// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Per-node and per-user detail views printed below the dashboard.

use std::collections::BTreeSet;
use std::fmt::Write;

use anyhow::{Context, Result};
use tracing::warn;

use crate::slurm::{JobIndex, NodeIndex, NodeUtilization};

/// Requested nodes in table order; names outside the table are warned about and dropped
pub fn selected_nodes<'a>(nodes: &'a NodeIndex, requested: &BTreeSet<String>) -> Vec<&'a NodeUtilization> {
    for name in requested {
        if nodes.get(name).is_none() {
            warn!(node = %name, "requested node is not part of the cluster");
        }
    }
    nodes.iter().filter(|n| requested.contains(&n.name)).collect()
}

pub fn format_node(node: &NodeUtilization) -> Result<String> {
    let json = serde_json::to_string_pretty(node)
        .with_context(|| format!("failed to serialize node {}", node.name))?;
    Ok(format!("{}\n{}\n", node.name, json))
}

/// Running jobs whose first user is in `users`, by job id
pub fn render_user_details(jobs: &JobIndex, users: &BTreeSet<String>) -> Result<String> {
    let mut out = String::new();
    if users.is_empty() {
        return Ok(out);
    }

    for job in jobs.iter().filter(|j| j.state.is_running()) {
        let Some(user) = job.primary_user() else {
            continue;
        };
        if !users.contains(user) {
            continue;
        }
        let json = serde_json::to_string_pretty(job)
            .with_context(|| format!("failed to serialize job {}", job.job_id))?;
        let _ = writeln!(out, "{}\n{}", job.job_id, json);
    }
    Ok(out)
}
