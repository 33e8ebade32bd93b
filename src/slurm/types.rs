// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Typed records reconstructed from the status dump.
//!
//! Everything here is rebuilt from scratch on every poll; nothing outlives one render.

use serde::Serialize;

use super::slurm::JobState;

/// Whitespace-delimited tokens of one dump line
pub type RawLine = Vec<String>;

/// Contiguous lines belonging to one job record
pub type Frame = [RawLine];

/// Job id used when a frame has no parseable `JobId=`
pub const UNKNOWN_JOB_ID: u32 = 0;

/// User name used for node attribution when a job lists no `UserId=`
pub const UNKNOWN_USER: &str = "unknown";

/// One job as extracted from a frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub job_id: u32,
    pub state: JobState,
    /// Sum of `cpu / node` over every TRES token in the frame
    pub cpus: u32,
    pub gpus: u32,
    /// One entry per `UserId=` token, duplicates kept
    pub users: Vec<String>,
    /// Resolved node names, in `NodeList` order
    pub nodes: Vec<String>,
    pub submit_time: String,
    pub start_time: String,
    pub time_limit: String,
}

impl JobRecord {
    /// The first listed user, which owns the job for display purposes
    pub fn primary_user(&self) -> Option<&str> {
        self.users.first().map(String::as_str)
    }
}

/// Aggregated load of one configured node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeUtilization {
    pub name: String,
    pub cpus: u32,
    /// Raw accumulated GPU count, may exceed the node's capacity
    pub gpus: u32,
    /// One slot per GPU; the first `gpus` slots are occupied
    pub gpu_occupancy: Vec<bool>,
    /// `(job id, primary user)` for every running job touching this node
    pub job_users: Vec<(u32, String)>,
}

impl NodeUtilization {
    pub fn idle(name: String, gpu_slots: usize) -> Self {
        Self {
            name,
            cpus: 0,
            gpus: 0,
            gpu_occupancy: vec![false; gpu_slots],
            job_users: Vec::new(),
        }
    }

    /// Number of occupied GPU slots (capped at the node's capacity)
    pub fn active_gpus(&self) -> usize {
        self.gpu_occupancy.iter().filter(|&&used| used).count()
    }

    pub(crate) fn add_gpus(&mut self, gpus: u32) {
        self.gpus = self.gpus.saturating_add(gpus);
        let active = self.gpus as usize;
        for (slot, used) in self.gpu_occupancy.iter_mut().enumerate() {
            *used = slot < active;
        }
    }
}
