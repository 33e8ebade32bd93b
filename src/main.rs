// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, warn};

mod app;
mod config;
mod logging;
mod slurm;
mod ui;

use app::Monitor;
use config::{ClusterConfig, ConfigError, MonitorOptions};
use slurm::{CommandDiagnostics, CommandSource};
use ui::Palette;

#[derive(Parser, Debug)]
#[command(name = "jobmap")]
#[command(about = "Slurm cluster dashboard - per-node CPU load, GPU occupancy and running jobs")]
#[command(version)]
struct Args {
    /// Show the node dashboard
    #[arg(short, long)]
    show: bool,

    /// Seconds between polls in monitor mode (at least 60)
    #[arg(short, long, default_value = "60")]
    timestep: u64,

    /// Keep polling until interrupted
    #[arg(short, long)]
    monitor: bool,

    /// Only list these users in the dashboard, with their CPU/GPU usage
    #[arg(short, long, num_args = 1..)]
    users: Vec<String>,

    /// Print the full record of every running job of these users
    #[arg(long, num_args = 1..)]
    fpuser: Vec<String>,

    /// Print utilization and run the node diagnostic for these nodes
    #[arg(short = 'n', long, num_args = 1..)]
    nodev: Vec<String>,

    /// Cluster description (TOML); falls back to $JOBMAP_CONFIG, then built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable colors (also honored: NO_COLOR)
    #[arg(long)]
    no_color: bool,

    /// Show only the load bars, without users and job ids
    #[arg(long)]
    hide_names: bool,

    /// Debug logging (overridden by $JOBMAP_LOG)
    #[arg(short, long)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Fails when the timestep is below the minimum interval
    fn monitor_options(&self) -> Result<MonitorOptions, ConfigError> {
        Ok(MonitorOptions {
            monitor_forever: self.monitor,
            show_dashboard: self.show,
            hide_names: self.hide_names,
            highlight_users: self.users.iter().cloned().collect(),
            full_detail_users: self.fpuser.iter().cloned().collect(),
            drill_down_nodes: self.nodev.iter().cloned().collect(),
            ..MonitorOptions::with_interval_secs(self.timestep)?
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose, args.log_file.as_deref())?;

    // Reject a bad interval before touching the config or the cluster
    let options = args.monitor_options()?;

    let cluster = ClusterConfig::load(args.config.as_deref())?;
    debug!(?cluster, ?options, "starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let stdout = io::stdout();
    let clear_screen = args.show && stdout.is_terminal();
    let source = CommandSource::new(cluster.status_command.clone());
    let diagnostics = CommandDiagnostics::new(cluster.diagnostic_command.clone());

    let mut monitor = Monitor::new(cluster, options, Palette::detect(args.no_color), source, diagnostics)?
        .with_screen_clearing(clear_screen)
        .with_shutdown_flag(shutdown);

    monitor.run(&mut stdout.lock())
}
