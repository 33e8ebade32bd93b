// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Parser for the multi-line `scontrol show job` dump.
//!
//! The dump has no explicit record separator: a record starts at the line that
//! carries its `JobId=` token. Values are matched on key names found inside
//! tokens, so the same rules apply whatever order Slurm prints fields in.

use tracing::{debug, warn};

use super::slurm::JobState;
use super::types::{Frame, JobRecord, RawLine, UNKNOWN_JOB_ID};
use crate::config::ClusterConfig;

/// Split the dump into lines, then each line into whitespace-separated tokens
pub fn tokenize(dump: &str) -> Vec<RawLine> {
    dump.lines()
        .map(|line| line.split_whitespace().map(String::from).collect())
        .collect()
}

/// Partition the lines into per-job frames.
///
/// Each line holding a token that contains `JobId` starts a new frame, the last
/// frame runs to the end of input. Lines before the first marker belong to no
/// frame. No marker at all means no jobs.
pub fn split_frames(lines: &[RawLine]) -> Vec<&Frame> {
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.iter().any(|token| token.contains("JobId")))
        .map(|(i, _)| i)
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(lines.len());
            &lines[start..end]
        })
        .collect()
}

/// Value of `key=` inside `token`, where `key` must be the whole key (not a suffix).
fn field<'a>(token: &'a str, key: &str) -> Option<&'a str> {
    token
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix('='))
}

/// CPU and GPU counts contributed by one line.
///
/// Every token containing `TRES=` is a comma-separated list of sub-fields.
/// `gres/gpu=` adds to the GPU total; `cpu=` and `node=` set the CPU count and
/// node count of that token, and `cpu / node` (integer division, both default
/// to 1) is added to the CPU total. Several TRES tokens on one line, or on
/// several lines of a frame, are all summed.
pub fn extract_resource_contribution(line: &[String]) -> (u32, u32) {
    let mut cpus = 0u32;
    let mut gpus = 0u32;

    for token in line.iter().filter(|t| t.contains("TRES=")) {
        let mut numcpus = 1u32;
        let mut numnodes = 1u32;

        for sub in token.split(',') {
            // `AllocTRES=cpu=8` carries the value after the last '='
            let value = sub.rsplit('=').next().unwrap_or_default();
            if sub.contains("gres/gpu=") {
                match value.parse::<u32>() {
                    Ok(n) => gpus = gpus.saturating_add(n),
                    Err(_) => debug!(%sub, "skipping malformed gpu sub-field"),
                }
            }
            if sub.contains("cpu=") {
                match value.parse::<u32>() {
                    Ok(n) => numcpus = n,
                    Err(_) => debug!(%sub, "skipping malformed cpu sub-field"),
                }
            }
            if sub.contains("node=") {
                match value.parse::<u32>() {
                    Ok(0) => debug!(%sub, "ignoring zero node count"),
                    Ok(n) => numnodes = n,
                    Err(_) => debug!(%sub, "skipping malformed node sub-field"),
                }
            }
        }

        cpus = cpus.saturating_add(numcpus / numnodes);
    }

    (cpus, gpus)
}

/// Expand the compact node-list notation into 1-based node numbers.
///
/// Accepts `7`, `[3-5]` and `[1,3-5,9]` after the prefix. Malformed entries are
/// skipped with a warning. Ranges are clipped to `1..=limit` before expansion.
pub fn parse_node_numbers(compact: &str, limit: usize) -> Vec<usize> {
    let inner = match compact.strip_prefix('[') {
        Some(rest) => rest.strip_suffix(']').unwrap_or(rest),
        None => compact,
    };

    let mut numbers = Vec::new();
    for part in inner.split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => match (start.parse::<usize>(), end.parse::<usize>()) {
                (Ok(start), Ok(end)) if start <= end => {
                    let (lo, hi) = (start.max(1), end.min(limit));
                    if lo != start || hi != end {
                        warn!(%part, limit, "node range reaches outside the configured table, clipping");
                    }
                    if lo <= hi {
                        numbers.extend(lo..=hi);
                    }
                }
                _ => warn!(%part, "skipping malformed node range"),
            },
            None => match part.parse::<usize>() {
                Ok(n) => numbers.push(n),
                Err(_) => warn!(%part, "skipping malformed node index"),
            },
        }
    }
    numbers
}

/// Split `a[1-2],b3` on commas that are not inside brackets
fn split_groups(list: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                groups.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    groups.push(&list[start..]);
    groups
}

/// Resolve a `NodeList=` value against the configured node table.
///
/// Groups with a foreign prefix (or `(null)`) contribute nothing; numbers outside
/// the table are skipped with a warning.
pub fn resolve_node_list(value: &str, cluster: &ClusterConfig) -> Vec<String> {
    let mut nodes = Vec::new();
    for group in split_groups(value) {
        let Some(compact) = group.strip_prefix(cluster.node_prefix.as_str()) else {
            continue;
        };
        for number in parse_node_numbers(compact, cluster.node_count) {
            match cluster.resolve_node(number) {
                Some(name) => nodes.push(name),
                None => warn!(number, list = %value, "node index outside the configured table"),
            }
        }
    }
    nodes
}

/// Parse one frame into a job record.
///
/// The first parseable `JobId=` is the record's key. A frame without one gets
/// [`UNKNOWN_JOB_ID`] and is still built from whatever fields it has.
pub fn extract_record(frame: &Frame, cluster: &ClusterConfig) -> JobRecord {
    let mut record = JobRecord::default();
    let mut job_id = None;

    for line in frame {
        let (cpus, gpus) = extract_resource_contribution(line);
        record.cpus = record.cpus.saturating_add(cpus);
        record.gpus = record.gpus.saturating_add(gpus);

        for token in line {
            if job_id.is_none() {
                if let Some(value) = field(token, "JobId") {
                    job_id = value.parse::<u32>().ok();
                }
            }
            if let Some(value) = field(token, "UserId") {
                let user = value.split('(').next().unwrap_or(value);
                record.users.push(user.to_string());
            } else if let Some(value) = field(token, "JobState") {
                record.state = JobState::from(value);
            } else if let Some(value) = field(token, "SubmitTime") {
                record.submit_time = value.to_string();
            } else if let Some(value) = field(token, "StartTime") {
                record.start_time = value.to_string();
            } else if let Some(value) = field(token, "TimeLimit") {
                record.time_limit = value.to_string();
            } else if let Some(value) = field(token, "NodeList") {
                if value.starts_with(cluster.node_prefix.as_str()) {
                    record.nodes = resolve_node_list(value, cluster);
                }
            }
        }
    }

    record.job_id = job_id.unwrap_or_else(|| {
        warn!(
            first_line = %frame.first().map(|l| l.join(" ")).unwrap_or_default(),
            "frame has no parseable JobId, keying it as {}", UNKNOWN_JOB_ID
        );
        UNKNOWN_JOB_ID
    });
    record
}
