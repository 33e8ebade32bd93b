// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Job and node indices built from one captured status dump.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::parser::{extract_record, split_frames, tokenize};
use super::types::{Frame, JobRecord, NodeUtilization, UNKNOWN_JOB_ID, UNKNOWN_USER};
use crate::config::ClusterConfig;

/// Running and pending jobs by job id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobIndex {
    jobs: BTreeMap<u32, JobRecord>,
}

impl JobIndex {
    /// Keep the records whose state is RUNNING or PENDING
    pub fn build<'a>(records: impl IntoIterator<Item = &'a JobRecord>) -> Self {
        let mut jobs = BTreeMap::new();
        for record in records.into_iter().filter(|r| r.state.is_tracked()) {
            if let Some(previous) = jobs.insert(record.job_id, record.clone()) {
                if record.job_id == UNKNOWN_JOB_ID {
                    warn!(
                        replaced_users = ?previous.users,
                        "two frames without a JobId collided, keeping the later one"
                    );
                }
            }
        }
        Self { jobs }
    }

    pub fn get(&self, job_id: u32) -> Option<&JobRecord> {
        self.jobs.get(&job_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Per-node load for every configured node, in table order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIndex {
    nodes: Vec<NodeUtilization>,
}

impl NodeIndex {
    /// Attribute every RUNNING record's resources and `(job, user)` pair to each of its nodes
    pub fn build<'a>(records: impl IntoIterator<Item = &'a JobRecord>, cluster: &ClusterConfig) -> Self {
        let mut nodes: Vec<NodeUtilization> = cluster
            .node_names()
            .into_iter()
            .map(|name| NodeUtilization::idle(name, cluster.gpus_per_node))
            .collect();

        for record in records.into_iter().filter(|r| r.state.is_running()) {
            let user = record.primary_user().unwrap_or(UNKNOWN_USER);
            for node_name in &record.nodes {
                // Names come from the same table, so a miss means the table changed under us
                let Some(node) = nodes.iter_mut().find(|n| &n.name == node_name) else {
                    warn!(node = %node_name, job_id = record.job_id, "job references an unknown node");
                    continue;
                };
                node.cpus = node.cpus.saturating_add(record.cpus);
                node.add_gpus(record.gpus);
                node.job_users.push((record.job_id, user.to_string()));
            }
        }

        Self { nodes }
    }

    pub fn get(&self, name: &str) -> Option<&NodeUtilization> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeUtilization> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no running job touches any node
    pub fn is_idle(&self) -> bool {
        self.nodes.iter().all(|n| n.job_users.is_empty() && n.cpus == 0)
    }
}

/// Both views of one poll, computed from the same frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub jobs: JobIndex,
    pub nodes: NodeIndex,
}

impl ClusterSnapshot {
    pub fn from_dump(dump: &str, cluster: &ClusterConfig) -> Self {
        let lines = tokenize(dump);
        let frames = split_frames(&lines);
        Self::from_frames(&frames, cluster)
    }

    pub fn from_frames(frames: &[&Frame], cluster: &ClusterConfig) -> Self {
        let records: Vec<JobRecord> = frames
            .iter()
            .map(|frame| extract_record(frame, cluster))
            .collect();

        let jobs = JobIndex::build(&records);
        let nodes = NodeIndex::build(&records, cluster);
        debug!(
            frames = frames.len(),
            jobs = jobs.len(),
            nodes = nodes.len(),
            active_gpus = nodes.iter().map(NodeUtilization::active_gpus).sum::<usize>(),
            idle = nodes.is_idle(),
            "built cluster snapshot"
        );

        Self { jobs, nodes }
    }
}
