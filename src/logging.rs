// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Diagnostics go to stderr or a log file; stdout belongs to the dashboard.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Overrides the level chosen by `--verbose`, e.g. `JOBMAP_LOG=jobmap::slurm=trace`
pub const LOG_ENV_VAR: &str = "JOBMAP_LOG";

fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

fn build_filter(verbose: bool) -> Result<EnvFilter> {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(default_level(verbose)))
        .context("invalid log filter")
}

pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = build_filter(verbose)?;

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(true), "debug");
        assert_eq!(default_level(false), "warn");
    }
}
