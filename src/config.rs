// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Cluster topology (from an optional TOML file) and per-run monitor options.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable consulted when `--config` is not given
pub const CONFIG_ENV_VAR: &str = "JOBMAP_CONFIG";

/// Shortest allowed polling interval in seconds
pub const MIN_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("timestep needs to be >= {}s, got {}s", MIN_INTERVAL_SECS, .0)]
    IntervalTooShort(u64),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid cluster config: {0}")]
    Invalid(&'static str),
}

/// Static description of the monitored cluster
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    /// Node name prefix, also the prefix expected in `NodeList=`
    pub node_prefix: String,
    /// Number of compute nodes; names are numbered from 1
    pub node_count: usize,
    /// Zero-padding width of the node number
    pub node_digits: usize,
    /// Hardware threads per node
    pub max_cpus: u32,
    pub gpus_per_node: usize,
    /// Hardware threads per displayed load unit
    pub load_divisor: u32,
    /// Width of the separator between the CPU bar and the GPU cells
    pub gap_width: usize,
    /// Command producing the job status dump
    pub status_command: Vec<String>,
    /// Per-node diagnostic for the node drill-down; `{node}` is substituted
    pub diagnostic_command: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_prefix: "hal".to_string(),
            node_count: 16,
            node_digits: 2,
            max_cpus: 160,
            gpus_per_node: 4,
            load_divisor: 2,
            gap_width: 4,
            status_command: vec!["scontrol".into(), "show".into(), "job".into()],
            diagnostic_command: vec!["ssh".into(), "{node}".into(), "nvidia-smi".into()],
        }
    }
}

impl ClusterConfig {
    /// Load from an explicit path, else from `$JOBMAP_CONFIG`, else built-in defaults.
    pub fn load(path_override: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path_override {
            Some(path) => Some(path.to_path_buf()),
            None => env::var_os(CONFIG_ENV_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        };

        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_prefix.is_empty() {
            return Err(ConfigError::Invalid("node_prefix must not be empty"));
        }
        if self.node_count == 0 {
            return Err(ConfigError::Invalid("node_count must be > 0"));
        }
        // Tier unit is (max_cpus / 2) / 3, so anything below 6 collapses every tier
        if self.max_cpus < 6 {
            return Err(ConfigError::Invalid("max_cpus must be >= 6"));
        }
        if self.load_divisor == 0 {
            return Err(ConfigError::Invalid("load_divisor must be > 0"));
        }
        if self.status_command.is_empty() {
            return Err(ConfigError::Invalid("status_command must not be empty"));
        }
        if self.diagnostic_command.is_empty() {
            return Err(ConfigError::Invalid("diagnostic_command must not be empty"));
        }
        Ok(())
    }

    /// Configured node names in table order (index 0 is node number 1)
    pub fn node_names(&self) -> Vec<String> {
        (1..=self.node_count).map(|i| self.node_name(i)).collect()
    }

    fn node_name(&self, number: usize) -> String {
        format!("{}{:0width$}", self.node_prefix, number, width = self.node_digits)
    }

    /// Resolve a 1-based node number to its configured name
    pub fn resolve_node(&self, number: usize) -> Option<String> {
        (1..=self.node_count)
            .contains(&number)
            .then(|| self.node_name(number))
    }
}

/// What a run of the poll loop does; validated before the first poll.
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    pub interval: Duration,
    pub monitor_forever: bool,
    pub show_dashboard: bool,
    /// Bar shows only the load fill, no job/user text
    pub hide_names: bool,
    /// Allow-list for the dashboard messages; empty means show everyone
    pub highlight_users: BTreeSet<String>,
    pub full_detail_users: BTreeSet<String>,
    pub drill_down_nodes: BTreeSet<String>,
}

impl MonitorOptions {
    pub fn with_interval_secs(secs: u64) -> Result<Self, ConfigError> {
        let options = Self {
            interval: Duration::from_secs(secs),
            ..Self::default()
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let secs = self.interval.as_secs();
        if secs < MIN_INTERVAL_SECS {
            return Err(ConfigError::IntervalTooShort(secs));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_node_table() {
        let config = ClusterConfig::default();
        let names = config.node_names();
        assert_eq!(names.len(), 16);
        assert_eq!(names[0], "hal01");
        assert_eq!(names[9], "hal10");
        assert_eq!(names[15], "hal16");
    }

    #[test]
    fn test_resolve_node_bounds() {
        let config = ClusterConfig::default();
        assert_eq!(config.resolve_node(1).as_deref(), Some("hal01"));
        assert_eq!(config.resolve_node(16).as_deref(), Some("hal16"));
        assert_eq!(config.resolve_node(0), None);
        assert_eq!(config.resolve_node(17), None);
    }

    #[test]
    fn test_interval_validation() {
        assert!(matches!(
            MonitorOptions::with_interval_secs(59),
            Err(ConfigError::IntervalTooShort(59))
        ));
        assert!(MonitorOptions::with_interval_secs(60).is_ok());
        assert!(MonitorOptions::with_interval_secs(3600).is_ok());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "node_prefix = \"gpu\"\nnode_count = 4\nnode_digits = 3\ngpus_per_node = 8"
        )
        .unwrap();

        let config = ClusterConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.node_names(), vec!["gpu001", "gpu002", "gpu003", "gpu004"]);
        assert_eq!(config.gpus_per_node, 8);
        // Untouched fields keep their defaults
        assert_eq!(config.max_cpus, 160);
        assert_eq!(config.status_command, vec!["scontrol", "show", "job"]);
    }

    #[test]
    fn test_config_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "node_prefx = \"gpu\"").unwrap();
        assert!(matches!(
            ClusterConfig::load(Some(file.path())),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_config_file_missing() {
        let err = ClusterConfig::load(Some(Path::new("/nonexistent/jobmap.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_config_validation() {
        let config = ClusterConfig {
            node_count: 0,
            ..ClusterConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ClusterConfig {
            status_command: Vec::new(),
            ..ClusterConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
