// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Slurm CLI integration: fetch the raw job status dump and run per-node diagnostics.

use std::fmt;
use std::process::{Command, Stdio};

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

/// Job state as reported by Slurm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Suspended,
    Completing,
    Completed,
    Cancelled,
    Failed,
    Timeout,
    NodeFail,
    /// Unrecognized value, or empty when the frame carried no `JobState=`
    Unknown(String),
}

impl Default for JobState {
    fn default() -> Self {
        JobState::Unknown(String::new())
    }
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PENDING" | "PD" => JobState::Pending,
            "RUNNING" | "R" => JobState::Running,
            "SUSPENDED" | "S" => JobState::Suspended,
            "COMPLETING" | "CG" => JobState::Completing,
            "COMPLETED" | "CD" => JobState::Completed,
            "CANCELLED" | "CA" => JobState::Cancelled,
            "FAILED" | "F" => JobState::Failed,
            "TIMEOUT" | "TO" => JobState::Timeout,
            "NODE_FAIL" | "NF" => JobState::NodeFail,
            other => JobState::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Suspended => "SUSPENDED",
            JobState::Completing => "COMPLETING",
            JobState::Completed => "COMPLETED",
            JobState::Cancelled => "CANCELLED",
            JobState::Failed => "FAILED",
            JobState::Timeout => "TIMEOUT",
            JobState::NodeFail => "NODE_FAIL",
            JobState::Unknown(other) if other.is_empty() => "UNKNOWN",
            JobState::Unknown(other) => other.as_str(),
        };
        f.write_str(s)
    }
}

impl Serialize for JobState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl JobState {
    /// Only running jobs are attributed to nodes
    pub fn is_running(&self) -> bool {
        matches!(self, JobState::Running)
    }

    /// Running and pending jobs are the ones kept in the job index
    pub fn is_tracked(&self) -> bool {
        matches!(self, JobState::Running | JobState::Pending)
    }
}

/// Failure to obtain the status dump from the resource manager
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("status command is empty")]
    EmptyCommand,

    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Status {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Producer of the raw status text. The resource manager is an opaque collaborator.
pub trait StatusSource {
    fn fetch(&mut self) -> Result<String, SourceError>;
}

/// Runs a configured command (e.g. `scontrol show job`) and returns its stdout.
pub struct CommandSource {
    argv: Vec<String>,
}

impl CommandSource {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl StatusSource for CommandSource {
    fn fetch(&mut self) -> Result<String, SourceError> {
        let (program, args) = self.argv.split_first().ok_or(SourceError::EmptyCommand)?;
        debug!(%program, ?args, "fetching status dump");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| SourceError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SourceError::Status {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Per-node diagnostic run by the node drill-down view (e.g. `ssh <node> nvidia-smi`)
pub trait NodeDiagnostics {
    fn run(&mut self, node: &str) -> anyhow::Result<()>;
}

/// Runs the configured diagnostic command with `{node}` substituted, output inherited.
pub struct CommandDiagnostics {
    template: Vec<String>,
}

impl CommandDiagnostics {
    pub fn new(template: Vec<String>) -> Self {
        Self { template }
    }

    fn argv_for(&self, node: &str) -> Vec<String> {
        self.template.iter().map(|arg| arg.replace("{node}", node)).collect()
    }
}

impl NodeDiagnostics for CommandDiagnostics {
    fn run(&mut self, node: &str) -> anyhow::Result<()> {
        let argv = self.argv_for(node);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("diagnostic command is empty"))?;

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| anyhow::anyhow!("failed to execute {}: {}", program, e))?;

        if !status.success() {
            warn!(%node, %status, "node diagnostic exited unsuccessfully");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_from_str() {
        assert_eq!(JobState::from("RUNNING"), JobState::Running);
        assert_eq!(JobState::from("R"), JobState::Running);
        assert_eq!(JobState::from("PENDING"), JobState::Pending);
        assert_eq!(JobState::from("COMPLETED"), JobState::Completed);
        assert!(matches!(JobState::from("WEIRD"), JobState::Unknown(_)));
    }

    #[test]
    fn test_job_state_tracking() {
        assert!(JobState::Running.is_running());
        assert!(!JobState::Completing.is_running());
        assert!(!JobState::Pending.is_running());
        assert!(JobState::Pending.is_tracked());
        assert!(JobState::Running.is_tracked());
        assert!(!JobState::Completed.is_tracked());
        assert!(!JobState::default().is_tracked());
    }

    #[test]
    fn test_job_state_display() {
        assert_eq!(JobState::Running.to_string(), "RUNNING");
        assert_eq!(JobState::NodeFail.to_string(), "NODE_FAIL");
        assert_eq!(JobState::default().to_string(), "UNKNOWN");
        assert_eq!(JobState::from("PREEMPTED").to_string(), "PREEMPTED");
    }

    #[test]
    fn test_job_state_serializes_as_string() {
        let json = serde_json::to_string(&JobState::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
    }

    #[test]
    fn test_command_source_empty_command() {
        let mut source = CommandSource::new(Vec::new());
        assert!(matches!(source.fetch(), Err(SourceError::EmptyCommand)));
    }

    #[test]
    fn test_command_source_missing_binary() {
        let mut source = CommandSource::new(vec!["/nonexistent/jobmap-status".to_string()]);
        assert!(matches!(source.fetch(), Err(SourceError::Spawn { .. })));
    }

    #[test]
    fn test_command_source_nonzero_exit() {
        let mut source = CommandSource::new(vec!["false".to_string()]);
        assert!(matches!(source.fetch(), Err(SourceError::Status { .. })));
    }

    #[test]
    fn test_command_source_captures_stdout() {
        let mut source = CommandSource::new(vec!["echo".to_string(), "JobId=1".to_string()]);
        assert_eq!(source.fetch().unwrap(), "JobId=1\n");
    }

    #[test]
    fn test_diagnostic_argv_substitution() {
        let diag = CommandDiagnostics::new(vec![
            "ssh".to_string(),
            "{node}".to_string(),
            "nvidia-smi".to_string(),
        ]);
        assert_eq!(diag.argv_for("hal03"), vec!["ssh", "hal03", "nvidia-smi"]);
    }
}
